//! Querying reservations from a cluster.
//!
//! Each supported pair of scheduler and resource manager is implemented as a
//! [`ReservationQuery`] backend. The [`QuerySelector`] picks the backend whose capability
//! predicate is satisfied by the cluster configuration.
pub mod moab;
mod selector;
pub mod torque;
mod torque_moab;

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::common::command::{CommandRunner, ProcessRunner};
use crate::common::config::ClusterConfig;
use crate::reservation::Reservation;
use crate::reservation::identity::{IdentityResolver, SystemIdentityResolver};

pub use selector::{CapabilityPredicate, QueryFactory, QuerySelector};
pub use torque_moab::TorqueMoabQuery;

pub type QueryFuture<'a, T> = Pin<Box<dyn Future<Output = crate::Result<T>> + 'a>>;

/// Reservation queries against one kind of batch system.
pub trait ReservationQuery {
    /// Name of the backend, used in log messages.
    fn name(&self) -> &'static str;

    /// Fetches a single reservation.
    /// Fails with a query error if the reservation does not exist.
    fn reservation<'a>(&'a self, id: &'a str) -> QueryFuture<'a, Reservation>;

    /// Fetches all reservations visible on the cluster.
    fn reservations(&self) -> QueryFuture<'_, Vec<Reservation>>;
}

/// Everything a backend needs to talk to a cluster.
#[derive(Clone)]
pub struct QueryContext {
    pub cluster: ClusterConfig,
    pub runner: Rc<dyn CommandRunner>,
    pub identities: Rc<dyn IdentityResolver>,
}

impl QueryContext {
    /// Context running the batch system commands locally and resolving ACL entries
    /// against the system account database.
    pub fn new(cluster: ClusterConfig) -> Self {
        Self {
            cluster,
            runner: Rc::new(ProcessRunner),
            identities: Rc::new(SystemIdentityResolver),
        }
    }

    pub fn with_runner(mut self, runner: Rc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_identities(mut self, identities: Rc<dyn IdentityResolver>) -> Self {
        self.identities = identities;
        self
    }
}

/// Creates the query backend for the cluster using the built-in backends.
/// Returns `None` if the cluster configuration is not supported.
pub fn build_query(ctx: &QueryContext) -> Option<Box<dyn ReservationQuery>> {
    QuerySelector::default().select(ctx)
}
