// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces for working with the provisioner's server config file

use camino::{Utf8Path, Utf8PathBuf};
use dropshot::{ConfigDropshot, ConfigLogging};
use serde::Deserialize;
use thiserror::Error;

/// Configuration for the provisioner server
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// dropshot server parameters
    pub dropshot: ConfigDropshot,
    /// server-wide logging configuration
    pub log: ConfigLogging,
    /// orchestration parameters
    pub provisioner: ProvisionerConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProvisionerConfig {
    /// cloud project that all managed resources live in
    pub project_id: String,
    /// maximum number of jobs converging at the same time
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// how often to poll an instance's serial output for the startup
    /// script result during a migration
    #[serde(default = "default_boot_poll_interval_ms")]
    pub boot_poll_interval_ms: u64,
    /// how long to poll before declaring a migrated instance dead
    #[serde(default = "default_boot_poll_timeout_ms")]
    pub boot_poll_timeout_ms: u64,
    /// how long to wait for an instance group to report itself stable
    #[serde(default = "default_stabilize_timeout_ms")]
    pub stabilize_timeout_ms: u64,
}

fn default_max_concurrent_jobs() -> usize {
    8
}

fn default_boot_poll_interval_ms() -> u64 {
    // the serial console is rate-limited; polling faster buys nothing
    60_000
}

fn default_boot_poll_timeout_ms() -> u64 {
    // 30 minutes: installing and rebalancing a database node is slow
    1_800_000
}

fn default_stabilize_timeout_ms() -> u64 {
    300_000
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading \"{path}\"")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{path}\"")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}

impl Config {
    /// Load a `Config` from the given TOML file.
    pub fn from_file(path: &Utf8Path) -> Result<Config, LoadError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| LoadError::Io { path: path.into(), err })?;
        let config = toml::from_str(&contents)
            .map_err(|err| LoadError::Parse { path: path.into(), err })?;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::Config;
    use camino::Utf8PathBuf;

    #[test]
    fn test_config_nonexistent() {
        let path = Utf8PathBuf::from("/nonexistent/nimbusd.toml");
        let error = Config::from_file(&path).unwrap_err();
        assert!(error.to_string().contains("error reading"));
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str(
            r#"
            [dropshot]
            bind_address = "127.0.0.1:12220"

            [log]
            mode = "stderr-terminal"
            level = "info"

            [provisioner]
            project_id = "acme-prod"
            "#,
        )
        .unwrap();
        assert_eq!(config.provisioner.project_id, "acme-prod");
        assert_eq!(config.provisioner.max_concurrent_jobs, 8);
        assert_eq!(config.provisioner.boot_poll_interval_ms, 60_000);
        assert_eq!(config.provisioner.boot_poll_timeout_ms, 1_800_000);
        assert_eq!(config.provisioner.stabilize_timeout_ms, 300_000);
    }

    #[test]
    fn test_config_explicit_tuning() {
        let config: Config = toml::from_str(
            r#"
            [dropshot]
            bind_address = "127.0.0.1:12220"

            [log]
            mode = "stderr-terminal"
            level = "debug"

            [provisioner]
            project_id = "acme-prod"
            max_concurrent_jobs = 2
            boot_poll_interval_ms = 100
            boot_poll_timeout_ms = 5000
            stabilize_timeout_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.provisioner.max_concurrent_jobs, 2);
        assert_eq!(config.provisioner.boot_poll_interval_ms, 100);
    }

    #[test]
    fn test_config_bad_toml() {
        let error =
            toml::from_str::<Config>("this is not toml").unwrap_err();
        assert!(!error.to_string().is_empty());
    }
}
