use clap::{CommandFactory, FromArgMatches};

use rsvquery::client::output::{Output, create_output};
use rsvquery::common::cli::{ReservationInfoOpts, RootOptions, SubCommand};
use rsvquery::common::config::ClusterConfig;
use rsvquery::common::setup::setup_logging;
use rsvquery::query::{QueryContext, ReservationQuery, build_query};

fn load_query(cluster: Option<std::path::PathBuf>) -> anyhow::Result<Box<dyn ReservationQuery>> {
    let path = cluster.ok_or_else(|| {
        anyhow::anyhow!("No cluster configuration was given, use --cluster or RSVQ_CLUSTER")
    })?;
    let config = ClusterConfig::load(&path)?;
    let name = config.name().to_string();
    let query = build_query(&QueryContext::new(config))
        .ok_or_else(|| anyhow::anyhow!("Cluster {name} is not supported by any query backend"))?;
    log::debug!("Using {} backend for cluster {name}", query.name());
    Ok(query)
}

async fn command_list(query: &dyn ReservationQuery, output: &dyn Output) -> anyhow::Result<()> {
    let mut reservations = query.reservations().await?;
    reservations.sort();
    output.print_reservation_list(reservations);
    Ok(())
}

async fn command_info(
    query: &dyn ReservationQuery,
    output: &dyn Output,
    opts: ReservationInfoOpts,
) -> anyhow::Result<()> {
    let reservation = query.reservation(&opts.id).await?;
    output.print_reservation_detail(reservation);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let matches = RootOptions::command().get_matches();
    let top_opts = match RootOptions::from_arg_matches(&matches) {
        Ok(opts) => opts,
        Err(error) => error.exit(),
    };

    setup_logging(top_opts.common.debug);

    let output = create_output(
        top_opts.common.output_mode,
        top_opts.common.colors.color_choice(),
    );

    let result = match load_query(top_opts.common.cluster) {
        Ok(query) => match top_opts.subcmd {
            SubCommand::List => command_list(query.as_ref(), output.as_ref()).await,
            SubCommand::Info(opts) => command_info(query.as_ref(), output.as_ref(), opts).await,
        },
        Err(error) => Err(error),
    };

    if let Err(e) = result {
        output.print_error(e);
        std::process::exit(1);
    }

    Ok(())
}
