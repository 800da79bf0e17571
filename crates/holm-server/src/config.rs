use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use holm_db::{DbOptions, SyncMode};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Server configuration, loadable from a TOML file.
///
/// Every field has a default, so a config file only needs the fields it
/// changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds.
    pub bind_addr: SocketAddr,
    /// Database directory (created on first start).
    pub data_dir: PathBuf,
    /// Per-request database timeout, in milliseconds.
    pub op_timeout_ms: u64,
    /// `fsync` every chain append instead of trusting the page cache.
    pub durable_appends: bool,
    /// Sign log entries with the replica key.
    pub sign_entries: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".parse().unwrap(),
            data_dir: PathBuf::from("./holm-data"),
            op_timeout_ms: 5_000,
            durable_appends: false,
            sign_entries: true,
        }
    }
}

impl ServerConfig {
    /// Load a config from a TOML file.
    pub fn from_path(path: &Path) -> ServerResult<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// The database options this config implies.
    pub fn db_options(&self) -> DbOptions {
        DbOptions {
            op_timeout: Duration::from_millis(self.op_timeout_ms),
            sync_mode: if self.durable_appends {
                SyncMode::EveryWrite
            } else {
                SyncMode::OsDefault
            },
            sign_entries: self.sign_entries,
            ..DbOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.op_timeout_ms, 5_000);
        assert!(!c.durable_appends);
        assert!(c.sign_entries);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holm.toml");
        fs::write(
            &path,
            "bind_addr = \"0.0.0.0:8080\"\ndurable_appends = true\n",
        )
        .unwrap();

        let c = ServerConfig::from_path(&path).unwrap();
        assert_eq!(c.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert!(c.durable_appends);
        assert_eq!(c.data_dir, PathBuf::from("./holm-data"));
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holm.toml");
        fs::write(&path, "bind_addr = 12").unwrap();

        let err = ServerConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn durable_appends_map_to_sync_mode() {
        let mut c = ServerConfig::default();
        assert_eq!(c.db_options().sync_mode, SyncMode::OsDefault);
        c.durable_appends = true;
        assert_eq!(c.db_options().sync_mode, SyncMode::EveryWrite);
    }
}
