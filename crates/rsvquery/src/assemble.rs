//! Assembly of reservations out of a scheduler record and resource manager node reports.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::allocation::{RawNodeFields, decode_node};
use crate::common::parser::parse_leading_u64;
use crate::reservation::identity::{GroupRef, IdentityResolver, UserRef};
use crate::reservation::{Node, Reservation};

/// Maximum number of node lookups of a single reservation running at the same time.
pub const NODE_LOOKUP_CONCURRENCY: usize = 16;

/// Reservation record as reported by a scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReservationDescriptor {
    pub id: String,
    /// Epoch seconds.
    pub start_time: String,
    /// Epoch seconds.
    pub end_time: String,
    pub acl_users: Vec<String>,
    pub acl_groups: Vec<String>,
    /// Comma-joined names of the allocated nodes.
    pub allocated_node_names: String,
    /// Scheduler specific classification of the record.
    pub subtype: String,
}

impl RawReservationDescriptor {
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.allocated_node_names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

pub type NodeLookupFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<Option<RawNodeFields>>> + 'a>>;

/// Source of the raw node reports.
pub trait NodeLookup {
    /// Fetches the report of a single node.
    /// Returns `None` if the resource manager does not know the node.
    fn lookup_node<'a>(&'a self, node_id: &'a str) -> NodeLookupFuture<'a>;
}

pub struct ReservationAssembler<'a> {
    identities: &'a dyn IdentityResolver,
}

impl<'a> ReservationAssembler<'a> {
    pub fn new(identities: &'a dyn IdentityResolver) -> Self {
        Self { identities }
    }

    /// Builds a reservation, looking up its nodes concurrently.
    ///
    /// At most [`NODE_LOOKUP_CONCURRENCY`] lookups are in flight and a node listed several
    /// times is looked up once. Node lookup failures are returned as query errors. ACL
    /// entries that do not resolve to an existing account are left out of the reservation.
    pub async fn build(
        &self,
        raw: RawReservationDescriptor,
        lookup: &dyn NodeLookup,
    ) -> crate::Result<Reservation> {
        let node_ids: Vec<&str> = raw.node_names().collect();
        let mut seen = HashSet::new();
        let unique_ids: Vec<&str> = node_ids
            .iter()
            .copied()
            .filter(|node_id| seen.insert(*node_id))
            .collect();
        log::debug!(
            "Assembling reservation {} with {} node(s)",
            raw.id,
            node_ids.len()
        );

        let reports = stream::iter(unique_ids.iter().copied())
            .map(|node_id| lookup.lookup_node(node_id))
            .buffered(NODE_LOOKUP_CONCURRENCY)
            .try_collect::<Vec<_>>()
            .await
            .map_err(Error::query)?;
        let reports: HashMap<&str, Option<RawNodeFields>> =
            unique_ids.iter().copied().zip(reports).collect();

        let nodes: Vec<Node> = node_ids
            .iter()
            .map(|node_id| {
                let report = reports.get(node_id).cloned().flatten();
                if report.is_none() {
                    log::debug!("Node {node_id} of reservation {} is unknown", raw.id);
                }
                Node::new(node_id.to_string(), decode_node(&report.unwrap_or_default()))
            })
            .collect();

        let users = self.resolve_users(&raw);
        let groups = self.resolve_groups(&raw);

        Ok(Reservation::new(
            raw.id,
            parse_epoch(&raw.start_time),
            parse_epoch(&raw.end_time),
            users,
            groups,
            nodes,
        ))
    }

    fn resolve_users(&self, raw: &RawReservationDescriptor) -> BTreeSet<UserRef> {
        raw.acl_users
            .iter()
            .filter_map(|name| {
                let user = self.identities.resolve_user(name);
                if user.is_none() {
                    log::debug!("Dropping unknown user {name} from reservation {}", raw.id);
                }
                user
            })
            .collect()
    }

    fn resolve_groups(&self, raw: &RawReservationDescriptor) -> BTreeSet<GroupRef> {
        raw.acl_groups
            .iter()
            .filter_map(|name| {
                let group = self.identities.resolve_group(name);
                if group.is_none() {
                    log::debug!("Dropping unknown group {name} from reservation {}", raw.id);
                }
                group
            })
            .collect()
    }
}

/// Converts epoch seconds to a timestamp. Values without leading digits map to the epoch.
pub fn parse_epoch(value: &str) -> DateTime<Utc> {
    i64::try_from(parse_leading_u64(value))
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_default()
}
