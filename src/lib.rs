//! SQL LS Bridge
//!
//! Editor-side integration glue for an external SQL language server.
//! The server exposes a catalogue of custom commands (query execution,
//! explanation, metadata listings, connection switching) on top of
//! `workspace/executeCommand`; this crate speaks that protocol.
//!
//! # Architecture
//!
//! - **Bridge Module**: transport client, command catalogue and dispatch,
//!   range resolution, the request/response gateway, and the interactive
//!   chooser workflow used by the switch commands
//! - **Config Module**: connection descriptors and the workspace
//!   configuration bootstrap that seeds the server with credentials
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use sql_ls_bridge::bridge::{LspClient, ServerConfig};
//!
//! # async fn run() -> Result<(), sql_ls_bridge::bridge::LspError> {
//! let config = ServerConfig::new("sql-ls").with_args(["--stdio"]);
//! let client = LspClient::spawn(&config, Path::new(".")).await?;
//! # Ok(())
//! # }
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod bridge;
pub mod config;
pub mod logging;

// Re-export main types
pub use bridge::{
    BridgeError, ChoicePrompt, CommandArgs, CommandInvocation, CommandKind, Dispatcher,
    DocumentText, EditorContext, Gateway, LspClient, LspError, RequestError, ResultSink,
    ServerConfig, ServerTransport,
};
pub use config::{ConfigError, ConfigPathMode, ConfigResolver, ConnectionDescriptor};
