//! Request/response gateway for custom server commands.
//!
//! One `workspace/executeCommand` request per invocation. The payload
//! carries its own `timeout` field (seconds) for the server; the gateway
//! additionally enforces the same timeout client-side around the await.
//! The two are independent knobs on top of the transport's own request
//! timeout.

use std::time::Duration;

use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use tracing::debug;

use super::client::{LspError, ServerTransport};
use super::commands::CommandKind;
use lsp_types::Range;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// A command request did not complete.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport failure: {0}")]
    Transport(#[from] LspError),
}

/// One fully-assembled command request.
///
/// Built once per user action, sent, then discarded.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    /// Catalogue entry being invoked.
    pub command: CommandKind,

    /// Wire arguments, already in positional order.
    pub arguments: Vec<JsonValue>,

    /// Source range; present only for range-based commands.
    pub range: Option<Range>,

    /// Per-command timeout, sent in the payload and enforced client-side.
    pub timeout: Duration,
}

impl CommandInvocation {
    /// Creates an invocation with no arguments, no range, and the default
    /// timeout.
    #[must_use]
    pub fn new(command: CommandKind) -> Self {
        Self {
            command,
            arguments: Vec::new(),
            range: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the positional arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<JsonValue>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Sets the source range.
    #[must_use]
    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the `workspace/executeCommand` params payload.
    #[must_use]
    pub fn to_params(&self) -> JsonValue {
        let mut params = json!({
            "command": self.command.wire_name(),
            "arguments": self.arguments,
            "timeout": self.timeout.as_secs_f64(),
        });
        if let Some(range) = &self.range {
            params["range"] = json!(range);
        }
        params
    }
}

/// Sends command invocations to the server and returns the raw text result.
pub struct Gateway<'a, T: ServerTransport> {
    transport: &'a T,
}

impl<'a, T: ServerTransport> Gateway<'a, T> {
    /// Creates a gateway over the given transport.
    #[must_use]
    pub const fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Issues one command request and awaits the result.
    ///
    /// The response is opaque display text; no parsing or validation
    /// happens here. Timeouts and transport failures are reported, never
    /// retried.
    pub async fn invoke(&self, invocation: &CommandInvocation) -> Result<String, RequestError> {
        debug!(
            "Invoking {} (range: {})",
            invocation.command.wire_name(),
            invocation.range.is_some()
        );

        let request = self
            .transport
            .request("workspace/executeCommand", invocation.to_params());

        match tokio::time::timeout(invocation.timeout, request).await {
            Ok(Ok(result)) => Ok(render_result(result)),
            Ok(Err(LspError::Timeout)) => Err(RequestError::Timeout(invocation.timeout)),
            Ok(Err(e)) => Err(RequestError::Transport(e)),
            Err(_) => Err(RequestError::Timeout(invocation.timeout)),
        }
    }
}

/// Renders the server's result value as display text.
///
/// The protocol promises a string; anything else is passed through in its
/// JSON form rather than rejected.
fn render_result(result: JsonValue) -> String {
    match result {
        JsonValue::String(text) => text,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
