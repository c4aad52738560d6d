//! CLI configuration file
//!
//! One JSON object: the directory settings (flattened) plus where the
//! layout lives and who holds which role.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::directory::{Collaborators, DirectoryConfig, InitParams};
use crate::env::SystemEnvironment;
use crate::governance::{Role, StaticAccessControl};
use crate::observability::{EventSink, FileEventSink, LogEventSink};
use crate::types::Identity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Data directory (required)
    pub data_dir: String,

    #[serde(flatten)]
    pub directory: DirectoryConfig,

    pub owner: Identity,
    pub emergency: Identity,
    pub upgrader: Identity,

    /// Timelock applied by `init`
    #[serde(default)]
    pub min_delay_secs: u64,

    #[serde(default)]
    pub directory_admins: Vec<Identity>,
    #[serde(default)]
    pub key_registrars: Vec<Identity>,
    #[serde(default)]
    pub system_admins: Vec<Identity>,

    /// Append committed events as JSON lines here instead of logging them
    #[serde(default)]
    pub event_log: Option<String>,
}

impl CliConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: CliConfig = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }
        self.directory.validate()?;
        for (identity, field) in [
            (&self.owner, "owner"),
            (&self.emergency, "emergency"),
            (&self.upgrader, "upgrader"),
        ] {
            if identity.is_zero() {
                return Err(CliError::config_error(format!("{} must not be null", field)));
            }
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn init_params(&self) -> InitParams {
        InitParams {
            owner: self.owner,
            emergency: self.emergency,
            upgrader: self.upgrader,
            min_delay: self.min_delay_secs,
        }
    }

    pub fn access_control(&self) -> StaticAccessControl {
        StaticAccessControl::new()
            .grant_all(Role::DirectoryAdmin, self.directory_admins.iter().copied())
            .grant_all(Role::KeyRegistrar, self.key_registrars.iter().copied())
            .grant_all(Role::SystemAdmin, self.system_admins.iter().copied())
    }

    pub fn collaborators(&self) -> CliResult<Collaborators> {
        let events: Arc<dyn EventSink> = match &self.event_log {
            Some(path) => Arc::new(FileEventSink::open(PathBuf::from(path))?),
            None => Arc::new(LogEventSink),
        };
        Ok(Collaborators::new(
            Arc::new(SystemEnvironment::new(self.directory.network_id)),
            Arc::new(self.access_control()),
        )
        .with_events(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::AccessControl;

    const OWNER: &str = "0x0000000000000000000000000000000000000001";
    const EMERGENCY: &str = "0x0000000000000000000000000000000000000002";
    const UPGRADER: &str = "0x0000000000000000000000000000000000000003";

    fn json(extra: &str) -> String {
        format!(
            r#"{{"data_dir": "/tmp/x", "owner": "{}", "emergency": "{}", "upgrader": "{}"{}}}"#,
            OWNER, EMERGENCY, UPGRADER, extra
        )
    }

    #[test]
    fn test_defaults_flow_through() {
        let config = CliConfig::from_json(&json("")).unwrap();
        assert_eq!(config.directory, DirectoryConfig::default());
        assert_eq!(config.min_delay_secs, 0);
        assert!(config.event_log.is_none());
    }

    #[test]
    fn test_flattened_directory_fields() {
        let config = CliConfig::from_json(&json(r#", "max_batch_size": 5, "min_delay_secs": 3600"#))
            .unwrap();
        assert_eq!(config.directory.max_batch_size, 5);
        assert_eq!(config.init_params().min_delay, 3600);
    }

    #[test]
    fn test_role_grants() {
        let config = CliConfig::from_json(&json(&format!(r#", "key_registrars": ["{}"]"#, OWNER)))
            .unwrap();
        let acl = config.access_control();
        assert!(acl.has_role(Role::KeyRegistrar, &config.owner));
        assert!(!acl.has_role(Role::SystemAdmin, &config.owner));
    }

    #[test]
    fn test_null_owner_rejected() {
        let content = format!(
            r#"{{"data_dir": "/tmp/x", "owner": "0x0000000000000000000000000000000000000000", "emergency": "{}", "upgrader": "{}"}}"#,
            EMERGENCY, UPGRADER
        );
        let err = CliConfig::from_json(&content).unwrap_err();
        assert_eq!(err.code_str(), "MODDIR_CLI_CONFIG_ERROR");
    }
}
