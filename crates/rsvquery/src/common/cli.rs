use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use cli_table::ColorChoice;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ColorPolicy {
    /// Use colors if the stdout is detected to be a terminal.
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

impl ColorPolicy {
    pub fn color_choice(self) -> ColorChoice {
        match self {
            ColorPolicy::Always => ColorChoice::AlwaysAnsi,
            ColorPolicy::Auto => {
                if std::io::stdout().is_terminal() {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                }
            }
            ColorPolicy::Never => ColorChoice::Never,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum OutputMode {
    Cli,
    Json,
}

// Common CLI options
#[derive(Parser)]
pub struct CommonOpts {
    /// Path to the cluster configuration (TOML)
    #[arg(
        long,
        value_hint = clap::ValueHint::FilePath,
        global = true,
        env = "RSVQ_CLUSTER",
        help_heading("GLOBAL OPTIONS")
    )]
    pub cluster: Option<PathBuf>,

    /// Sets console color policy
    #[arg(
        long,
        default_value_t = ColorPolicy::Auto,
        value_enum,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub colors: ColorPolicy,

    /// Sets output formatting
    #[arg(
        long,
        env = "RSVQ_OUTPUT_MODE",
        default_value_t = OutputMode::Cli,
        value_enum,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub output_mode: OutputMode,

    /// Turn on a more detailed log output
    #[arg(long, global = true, help_heading("GLOBAL OPTIONS"))]
    pub debug: bool,
}

/// rsvq: reservations of batch-scheduled clusters
#[derive(Parser)]
#[command(author, version, about)]
pub struct RootOptions {
    #[clap(flatten)]
    pub common: CommonOpts,

    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Parser)]
pub enum SubCommand {
    /// List all reservations of the cluster
    List,
    /// Display detailed information about a reservation
    Info(ReservationInfoOpts),
}

#[derive(Parser)]
pub struct ReservationInfoOpts {
    /// Id of the reservation
    pub id: String,
}
