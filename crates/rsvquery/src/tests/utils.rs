use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use crate::allocation::RawNodeFields;
use crate::assemble::{NodeLookup, NodeLookupFuture};
use crate::common::command::{CommandFuture, CommandRunner, ExternalCommand};
use crate::reservation::identity::{GroupRef, IdentityResolver, UserRef};

/// Identity resolver that knows a fixed list of accounts.
pub struct FakeIdentities {
    users: Vec<String>,
    groups: Vec<String>,
}

impl FakeIdentities {
    pub fn new(users: &[&str], groups: &[&str]) -> Self {
        Self {
            users: users.iter().map(|u| u.to_string()).collect(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }
}

impl IdentityResolver for FakeIdentities {
    fn resolve_user(&self, name: &str) -> Option<UserRef> {
        self.users
            .iter()
            .position(|user| user == name)
            .map(|index| UserRef {
                name: name.to_string(),
                uid: 1000 + index as u32,
            })
    }

    fn resolve_group(&self, name: &str) -> Option<GroupRef> {
        self.groups
            .iter()
            .position(|group| group == name)
            .map(|index| GroupRef {
                name: name.to_string(),
                gid: 5000 + index as u32,
            })
    }
}

enum NodeEntry {
    Report { fields: RawNodeFields, delay_ms: u64 },
    Failure(String),
}

/// Node lookup answering from an in-memory table.
#[derive(Default)]
pub struct NodeTable {
    nodes: HashMap<String, NodeEntry>,
    completed: RefCell<Vec<String>>,
    in_flight: Cell<usize>,
    peak_in_flight: Cell<usize>,
}

impl NodeTable {
    pub fn with_node(self, name: &str, fields: RawNodeFields) -> Self {
        self.with_delayed_node(name, fields, 0)
    }

    /// The lookup of this node finishes only after `delay_ms` milliseconds.
    pub fn with_delayed_node(mut self, name: &str, fields: RawNodeFields, delay_ms: u64) -> Self {
        self.nodes
            .insert(name.to_string(), NodeEntry::Report { fields, delay_ms });
        self
    }

    pub fn with_failing_node(mut self, name: &str, message: &str) -> Self {
        self.nodes
            .insert(name.to_string(), NodeEntry::Failure(message.to_string()));
        self
    }

    /// Names of the nodes whose lookup finished, in completion order.
    pub fn completed(&self) -> Vec<String> {
        self.completed.borrow().clone()
    }

    /// Highest number of lookups that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.get()
    }
}

impl NodeLookup for NodeTable {
    fn lookup_node<'a>(&'a self, node_id: &'a str) -> NodeLookupFuture<'a> {
        Box::pin(async move {
            match self.nodes.get(node_id) {
                None => Ok(None),
                Some(NodeEntry::Failure(message)) => Err(anyhow::anyhow!("{message}")),
                Some(NodeEntry::Report { fields, delay_ms }) => {
                    self.in_flight.set(self.in_flight.get() + 1);
                    self.peak_in_flight
                        .set(self.peak_in_flight.get().max(self.in_flight.get()));
                    if *delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                    }
                    self.in_flight.set(self.in_flight.get() - 1);
                    self.completed.borrow_mut().push(node_id.to_string());
                    Ok(Some(fields.clone()))
                }
            }
        })
    }
}

/// Command runner replaying prepared outputs.
///
/// A response is chosen by the longest registered prefix of the rendered command line.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Vec<(String, Result<String, String>)>,
    executed: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn with_output(mut self, command: &str, output: &str) -> Self {
        self.responses
            .push((command.to_string(), Ok(output.to_string())));
        self
    }

    pub fn with_failure(mut self, command: &str, message: &str) -> Self {
        self.responses
            .push((command.to_string(), Err(message.to_string())));
        self
    }

    /// Rendered command lines of all executed commands.
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: ExternalCommand) -> CommandFuture {
        let line = command.to_string();
        self.executed.borrow_mut().push(line.clone());

        let response = self
            .responses
            .iter()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, response)| response.clone());
        Box::pin(async move {
            match response {
                Some(Ok(output)) => Ok(output),
                Some(Err(message)) => Err(anyhow::anyhow!("{message}")),
                None => Err(anyhow::anyhow!("Unexpected command `{line}`")),
            }
        })
    }
}
