use crate::common::config::ClusterConfig;
use crate::query::{QueryContext, ReservationQuery, TorqueMoabQuery};

/// Decides whether a backend can serve a cluster.
pub type CapabilityPredicate = fn(&ClusterConfig) -> bool;

/// Creates a backend for a cluster accepted by its predicate.
pub type QueryFactory = fn(&QueryContext) -> Option<Box<dyn ReservationQuery>>;

struct QueryBackend {
    name: &'static str,
    predicate: CapabilityPredicate,
    factory: QueryFactory,
}

/// Registry of query backends, evaluated in registration order.
pub struct QuerySelector {
    backends: Vec<QueryBackend>,
}

impl QuerySelector {
    /// Selector without any backend.
    pub fn empty() -> Self {
        Self { backends: vec![] }
    }

    pub fn register(
        &mut self,
        name: &'static str,
        predicate: CapabilityPredicate,
        factory: QueryFactory,
    ) -> &mut Self {
        self.backends.push(QueryBackend {
            name,
            predicate,
            factory,
        });
        self
    }

    pub fn backend_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.backends.iter().map(|backend| backend.name)
    }

    /// Returns the first backend matching the cluster, `None` for unsupported clusters.
    pub fn select(&self, ctx: &QueryContext) -> Option<Box<dyn ReservationQuery>> {
        let query = self
            .backends
            .iter()
            .filter(|backend| (backend.predicate)(&ctx.cluster))
            .find_map(|backend| {
                log::debug!(
                    "Cluster {} matches query backend {}",
                    ctx.cluster.name(),
                    backend.name
                );
                (backend.factory)(ctx)
            });
        if query.is_none() {
            log::debug!(
                "No query backend supports cluster {}",
                ctx.cluster.name()
            );
        }
        query
    }
}

impl Default for QuerySelector {
    fn default() -> Self {
        let mut selector = Self::empty();
        selector.register(
            "torque-moab",
            TorqueMoabQuery::matches,
            TorqueMoabQuery::create,
        );
        selector
    }
}
