use std::rc::Rc;

use crate::Error;
use crate::assemble::{RawReservationDescriptor, ReservationAssembler};
use crate::common::command::{CommandRunner, ExternalCommand};
use crate::common::config::{ClusterConfig, ServerConfig};
use crate::query::moab::{is_valid_subtype, parse_reservations};
use crate::query::torque::TorqueNodes;
use crate::query::{QueryContext, QueryFuture, ReservationQuery};
use crate::reservation::Reservation;
use crate::reservation::identity::IdentityResolver;

/// Reservations of clusters using Torque as the resource manager and Moab as the
/// scheduler. Moab knows the reservations, Torque knows what runs on their nodes.
pub struct TorqueMoabQuery {
    torque: ServerConfig,
    moab: ServerConfig,
    runner: Rc<dyn CommandRunner>,
    identities: Rc<dyn IdentityResolver>,
}

impl TorqueMoabQuery {
    pub fn new(
        torque: ServerConfig,
        moab: ServerConfig,
        runner: Rc<dyn CommandRunner>,
        identities: Rc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            torque,
            moab,
            runner,
            identities,
        }
    }

    pub fn matches(cluster: &ClusterConfig) -> bool {
        cluster.resource_manager_of("torque").is_some() && cluster.scheduler_of("moab").is_some()
    }

    pub fn create(ctx: &QueryContext) -> Option<Box<dyn ReservationQuery>> {
        let torque = ctx.cluster.resource_manager_of("torque")?.clone();
        let moab = ctx.cluster.scheduler_of("moab")?.clone();
        Some(Box::new(Self::new(
            torque,
            moab,
            ctx.runner.clone(),
            ctx.identities.clone(),
        )))
    }

    fn mrsvctl_query(&self, target: &str) -> ExternalCommand {
        let mut command = ExternalCommand::for_server(&self.moab, "mrsvctl")
            .arg("-q")
            .arg(target)
            .arg("--xml");
        if let Some(host) = &self.moab.host {
            command = command.arg(format!("--host={host}"));
        }
        command
    }

    /// Asks Moab for reservations and keeps only records of the allowed subtypes.
    async fn query_moab(&self, target: &str) -> crate::Result<Vec<RawReservationDescriptor>> {
        let output = self
            .runner
            .run(self.mrsvctl_query(target))
            .await
            .map_err(Error::query)?;
        let records = parse_reservations(&output).map_err(Error::query)?;
        Ok(records
            .into_iter()
            .filter(|record| {
                let valid = is_valid_subtype(&record.subtype);
                if !valid {
                    log::debug!(
                        "Skipping Moab record {} with subtype {}",
                        record.id,
                        record.subtype
                    );
                }
                valid
            })
            .collect())
    }

    fn torque_nodes(&self) -> TorqueNodes {
        TorqueNodes::new(self.torque.clone(), self.runner.clone())
    }
}

impl ReservationQuery for TorqueMoabQuery {
    fn name(&self) -> &'static str {
        "torque-moab"
    }

    fn reservation<'a>(&'a self, id: &'a str) -> QueryFuture<'a, Reservation> {
        Box::pin(async move {
            let record = self
                .query_moab(id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::Query(format!("Reservation {id} was not found")))?;

            let nodes = self.torque_nodes();
            ReservationAssembler::new(self.identities.as_ref())
                .build(record, &nodes)
                .await
        })
    }

    fn reservations(&self) -> QueryFuture<'_, Vec<Reservation>> {
        Box::pin(async move {
            let records = self.query_moab("ALL").await?;
            log::debug!("Moab reported {} reservation(s)", records.len());

            // nodes shared by several reservations are fetched only once
            let nodes = self.torque_nodes();
            let assembler = ReservationAssembler::new(self.identities.as_ref());
            let mut reservations = Vec::with_capacity(records.len());
            for record in records {
                reservations.push(assembler.build(record, &nodes).await?);
            }
            Ok(reservations)
        })
    }
}
