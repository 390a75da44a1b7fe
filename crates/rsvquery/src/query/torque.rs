//! Node reports of the Torque resource manager (`pbsnodes`).
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;

use crate::allocation::RawNodeFields;
use crate::assemble::{NodeLookup, NodeLookupFuture};
use crate::common::command::{CommandRunner, ExternalCommand};
use crate::common::config::ServerConfig;

const NODE_CACHE_SIZE: usize = 1024;

/// Parses the text output of `pbsnodes`.
///
/// Each node starts with an unindented line holding its name, followed by indented
/// `key = value` attribute lines.
pub fn parse_pbsnodes(output: &str) -> HashMap<String, RawNodeFields> {
    let mut nodes = HashMap::new();
    let mut current: Option<(String, RawNodeFields)> = None;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            if let Some((name, fields)) = current.take() {
                nodes.insert(name, fields);
            }
            current = Some((line.trim().to_string(), RawNodeFields::default()));
            continue;
        }
        let Some((_, fields)) = current.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "np" => fields.ppn = value,
            "jobs" => fields.jobs = value,
            "properties" => fields.properties = value,
            _ => {}
        }
    }
    if let Some((name, fields)) = current {
        nodes.insert(name, fields);
    }
    nodes
}

fn is_unknown_node(error: &anyhow::Error) -> bool {
    format!("{error:#}").contains("Unknown node")
}

/// Looks up nodes through `pbsnodes`, remembering the reports it has already fetched.
pub struct TorqueNodes {
    server: ServerConfig,
    runner: Rc<dyn CommandRunner>,
    cache: RefCell<LruCache<String, Option<RawNodeFields>>>,
}

impl TorqueNodes {
    pub fn new(server: ServerConfig, runner: Rc<dyn CommandRunner>) -> Self {
        let capacity = NonZeroUsize::new(NODE_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            server,
            runner,
            cache: RefCell::new(LruCache::new(capacity)),
        }
    }

    fn node_command(&self, node_id: &str) -> ExternalCommand {
        let mut command = ExternalCommand::for_server(&self.server, "pbsnodes");
        if let Some(host) = &self.server.host {
            command = command.arg("-s").arg(host);
        }
        command.arg(node_id)
    }
}

impl NodeLookup for TorqueNodes {
    fn lookup_node<'a>(&'a self, node_id: &'a str) -> NodeLookupFuture<'a> {
        Box::pin(async move {
            if let Some(fields) = self.cache.borrow_mut().get(node_id) {
                return Ok(fields.clone());
            }

            let fields = match self.runner.run(self.node_command(node_id)).await {
                Ok(output) => parse_pbsnodes(&output).remove(node_id),
                Err(error) if is_unknown_node(&error) => None,
                Err(error) => {
                    return Err(error.context(format!("Cannot fetch node {node_id} from Torque")));
                }
            };
            if fields.is_none() {
                log::debug!("Torque does not know node {node_id}");
            }

            self.cache
                .borrow_mut()
                .put(node_id.to_string(), fields.clone());
            Ok(fields)
        })
    }
}
