//! Connection descriptors and the project configuration file.
//!
//! The file is JSON with a `connections` map keyed by alias:
//!
//! ```json
//! {
//!   "connections": {
//!     "local": {
//!       "driver": "mysql",
//!       "host": "127.0.0.1",
//!       "username": "root",
//!       "password": "secret",
//!       "database": "app"
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
///
/// Always recoverable: the workspace attach proceeds without configuration
/// and later commands fail server-side with a connection error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Unreadable { path: PathBuf, source: io::Error },

    #[error("Malformed configuration file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to publish configuration: {0}")]
    Publish(#[from] crate::bridge::LspError),
}

/// One database connection, as pushed to the server.
///
/// Held only long enough to transmit; the server owns the durable
/// connection state afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    pub alias: String,

    pub driver: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl ConnectionDescriptor {
    /// Creates a descriptor with only alias and driver set.
    #[must_use]
    pub fn new(alias: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            driver: driver.into(),
            host: None,
            data_source_name: None,
            username: None,
            password: None,
            database: None,
        }
    }

    /// Sets the host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the driver-specific data source name.
    #[must_use]
    pub fn with_data_source_name(mut self, dsn: impl Into<String>) -> Self {
        self.data_source_name = Some(dsn.into());
        self
    }

    /// Sets the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the default database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// File entry: a descriptor without its alias (the map key carries it).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConnection {
    driver: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    data_source_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    database: Option<String>,
}

/// Top-level configuration file shape.
#[derive(Debug, Deserialize)]
struct ConnectionsFile {
    // BTreeMap keeps publish order deterministic across reloads
    connections: BTreeMap<String, RawConnection>,
}

/// Parses configuration file contents into a connection list.
pub fn parse_connections(path: &Path, text: &str) -> Result<Vec<ConnectionDescriptor>, ConfigError> {
    let file: ConnectionsFile =
        serde_json::from_str(text).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(file
        .connections
        .into_iter()
        .map(|(alias, raw)| ConnectionDescriptor {
            alias,
            driver: raw.driver,
            host: raw.host,
            data_source_name: raw.data_source_name,
            username: raw.username,
            password: raw.password,
            database: raw.database,
        })
        .collect())
}
