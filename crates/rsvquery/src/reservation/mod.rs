//! Reservation snapshots.
//!
//! Both [`Reservation`] and [`Node`] are identified by their id alone: equality, hashing
//! and ordering only look at the id. Two snapshots of the same reservation taken at
//! different times therefore compare equal even when their nodes differ.
pub mod identity;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::allocation::NodeUtilization;
pub use identity::{GroupRef, UserRef};

/// A node reserved by a reservation.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    id: String,
    ppn: u32,
    ppn_used: u32,
    props: BTreeSet<String>,
    jobs: Vec<String>,
}

impl Node {
    pub fn new(id: String, utilization: NodeUtilization) -> Self {
        let (ppn, ppn_used, props, jobs) = utilization.into_parts();
        Self {
            id,
            ppn,
            ppn_used,
            props,
            jobs: jobs.into_iter().map(|job| job.job_id).collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of cores of the node.
    pub fn ppn(&self) -> u32 {
        self.ppn
    }

    /// Number of cores occupied by running jobs.
    pub fn ppn_used(&self) -> u32 {
        self.ppn_used
    }

    pub fn props(&self) -> &BTreeSet<String> {
        &self.props
    }

    /// Jobs running on the node.
    pub fn jobs(&self) -> &[String] {
        &self.jobs
    }

    pub fn is_free(&self) -> bool {
        self.ppn_used == 0
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// A block of nodes reserved for a set of users and groups over a time window.
#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    id: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    users: BTreeSet<UserRef>,
    groups: BTreeSet<GroupRef>,
    nodes: Vec<Node>,
}

impl Reservation {
    /// The time window is kept as reported, even if it ends before it starts.
    pub fn new(
        id: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        users: BTreeSet<UserRef>,
        groups: BTreeSet<GroupRef>,
        nodes: Vec<Node>,
    ) -> Self {
        Self {
            id,
            start_time,
            end_time,
            users,
            groups,
            nodes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Users with access to the reservation.
    pub fn users(&self) -> &BTreeSet<UserRef> {
        &self.users
    }

    /// Groups with access to the reservation.
    pub fn groups(&self) -> &BTreeSet<GroupRef> {
        &self.groups
    }

    /// Reserved nodes in the order reported by the scheduler.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn has_started(&self) -> bool {
        self.has_started_at(Utc::now())
    }

    pub fn has_started_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    pub fn has_ended(&self) -> bool {
        self.has_ended_at(Utc::now())
    }

    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    /// Reserved nodes with no running job.
    pub fn free_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_free())
    }
}

impl PartialEq for Reservation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Reservation {}

impl Hash for Reservation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Reservation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reservation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for Reservation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}
