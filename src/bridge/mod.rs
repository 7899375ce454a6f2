//! Custom command protocol bridge to the SQL language server.
//!
//! The server publishes a fixed catalogue of commands on top of
//! `workspace/executeCommand`; this module owns the client half of that
//! contract:
//!
//! - [`client`] — the stdio JSON-RPC transport to the server process
//! - [`commands`] — the command catalogue, typed arguments, and dispatch
//! - [`range`] — source-range resolution for the range-taking commands
//! - [`gateway`] — one-shot request/response with the in-payload timeout
//! - [`chooser`] — the two-step list/select workflow behind the switch
//!   commands, plus the result-presenter seam

pub mod chooser;
pub mod client;
pub mod commands;
pub mod gateway;
pub mod range;

pub use chooser::{ChoicePrompt, ResultSink, parse_choices, switch_flow};
pub use client::{LspClient, LspError, ServerConfig, ServerTransport};
pub use commands::{BridgeError, CommandArgs, CommandKind, Dispatcher, EditorContext};
pub use gateway::{CommandInvocation, Gateway, RequestError};
pub use range::{DocumentText, resolve};
