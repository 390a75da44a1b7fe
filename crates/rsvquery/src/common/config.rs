//! Description of the batch servers a cluster exposes.
//!
//! The configuration doubles as the capability descriptor used to pick a query adapter:
//! an adapter matches a cluster by asking for a resource manager and/or a scheduler of a
//! given kind.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Kind of the server, e.g. `torque` or `moab`.
    pub kind: String,
    /// Host the client commands should talk to. The command default is used when missing.
    #[serde(default)]
    pub host: Option<String>,
    /// Directory with the client binaries. `PATH` is searched when missing.
    #[serde(default)]
    pub bin: Option<PathBuf>,
    /// Extra environment passed to every client command.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ServerConfig {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }

    /// Full path of a client program of this server.
    pub fn program(&self, name: &str) -> String {
        match &self.bin {
            Some(bin) => bin.join(name).display().to_string(),
            None => name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub resource_manager: Option<ServerConfig>,
    #[serde(default)]
    pub scheduler: Option<ServerConfig>,
}

impl ClusterConfig {
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "Cannot read cluster configuration {}: {error}",
                path.display()
            ))
        })?;
        let config = Self::parse(&content)?;
        log::debug!(
            "Loaded cluster configuration {} from {}",
            config.name(),
            path.display()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn name(&self) -> &str {
        self.id.as_deref().unwrap_or("<unnamed>")
    }

    /// Returns the resource manager if the cluster has one of the given kind.
    pub fn resource_manager_of(&self, kind: &str) -> Option<&ServerConfig> {
        self.resource_manager
            .as_ref()
            .filter(|server| server.is_kind(kind))
    }

    /// Returns the scheduler if the cluster has one of the given kind.
    pub fn scheduler_of(&self, kind: &str) -> Option<&ServerConfig> {
        self.scheduler.as_ref().filter(|server| server.is_kind(kind))
    }
}

#[cfg(test)]
mod test {
    use super::ClusterConfig;
    use std::io::Write;

    const OAKLEY: &str = r#"
id = "oakley"

[resource_manager]
kind = "torque"
host = "oak-batch.osc.edu"
bin = "/opt/torque/bin"

[scheduler]
kind = "Moab"
host = "oak-batch.osc.edu"

[scheduler.env]
MOABHOMEDIR = "/var/spool/moab"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = ClusterConfig::parse(OAKLEY).unwrap();
        assert_eq!(config.name(), "oakley");

        let torque = config.resource_manager_of("torque").unwrap();
        assert_eq!(torque.host.as_deref(), Some("oak-batch.osc.edu"));
        assert_eq!(torque.program("pbsnodes"), "/opt/torque/bin/pbsnodes");

        let moab = config.scheduler_of("moab").unwrap();
        assert_eq!(moab.program("mrsvctl"), "mrsvctl");
        assert_eq!(moab.env["MOABHOMEDIR"], "/var/spool/moab");
    }

    #[test]
    fn test_capability_of_other_kind() {
        let config = ClusterConfig::parse(OAKLEY).unwrap();
        assert!(config.resource_manager_of("slurm").is_none());
        assert!(config.scheduler_of("torque").is_none());
    }

    #[test]
    fn test_empty_config() {
        let config = ClusterConfig::parse("").unwrap();
        assert_eq!(config.name(), "<unnamed>");
        assert!(config.resource_manager.is_none());
        assert!(config.scheduler.is_none());
    }

    #[test]
    fn test_invalid_config() {
        assert!(ClusterConfig::parse("[scheduler]\nhost = 'x'").is_err());
        assert!(ClusterConfig::parse("[scheduler]\nkind = 'moab'\nport = 1").is_err());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(OAKLEY.as_bytes()).unwrap();
        let config = ClusterConfig::load(file.path()).unwrap();
        assert!(config.scheduler_of("moab").is_some());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let error = ClusterConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(error.to_string().starts_with("Configuration error: Cannot read"));
    }
}
