//! Workspace configuration bootstrap.
//!
//! At workspace-attach time the resolver decides where connection
//! credentials come from (client settings or a project file) and pushes
//! them to the server as workspace configuration. At most one publish per
//! attach; republishing the same list is idempotent because the server
//! replaces its configuration wholesale.

use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, info};

use super::connections::{ConfigError, ConnectionDescriptor, parse_connections};
use crate::bridge::ServerTransport;

/// Settings key the server reads its connection list from.
pub const DEFAULT_SERVER_KEY: &str = "sqlLs";

/// Which fixed project-relative location holds the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathMode {
    /// `.sql-ls/config.json` under the workspace root (the hidden project
    /// directory the server itself reads).
    Workspace,

    /// `sql-ls.config.json` directly in the workspace root.
    Root,
}

impl ConfigPathMode {
    /// Resolves the configuration file path for a workspace root.
    #[must_use]
    pub fn resolve(self, workspace_root: &Path) -> PathBuf {
        match self {
            Self::Workspace => workspace_root.join(".sql-ls").join("config.json"),
            Self::Root => workspace_root.join("sql-ls.config.json"),
        }
    }
}

/// Resolves connection credentials and publishes them to the server.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    server_key: String,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Creates a resolver with the default server settings key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            server_key: DEFAULT_SERVER_KEY.to_string(),
        }
    }

    /// Overrides the server settings key.
    #[must_use]
    pub fn with_server_key(mut self, key: impl Into<String>) -> Self {
        self.server_key = key.into();
        self
    }

    /// Resolves connections and publishes them as workspace configuration.
    ///
    /// Explicit connections win and skip all file I/O. A missing file means
    /// nothing is published and the server keeps its defaults; only a
    /// present-but-broken file is an error. Returns whether a publish
    /// happened.
    pub async fn resolve_and_publish<T: ServerTransport>(
        &self,
        transport: &T,
        workspace_root: &Path,
        explicit_connections: &[ConnectionDescriptor],
        mode: ConfigPathMode,
    ) -> Result<bool, ConfigError> {
        if !explicit_connections.is_empty() {
            debug!(
                "Publishing {} connection(s) from client settings",
                explicit_connections.len()
            );
            self.publish(transport, explicit_connections).await?;
            return Ok(true);
        }

        let path = mode.resolve(workspace_root);
        if !path.exists() {
            debug!("No configuration file at {}, skipping publish", path.display());
            return Ok(false);
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let connections = parse_connections(&path, &text)?;

        info!(
            "Publishing {} connection(s) from {}",
            connections.len(),
            path.display()
        );
        self.publish(transport, &connections).await?;
        Ok(true)
    }

    /// Sends the one configuration notification.
    async fn publish<T: ServerTransport>(
        &self,
        transport: &T,
        connections: &[ConnectionDescriptor],
    ) -> Result<(), ConfigError> {
        transport
            .notify(
                "workspace/didChangeConfiguration",
                json!({
                    "settings": {
                        self.server_key.as_str(): {
                            "connections": connections
                        }
                    }
                }),
            )
            .await?;
        Ok(())
    }
}
