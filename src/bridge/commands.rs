//! Command catalogue and dispatch.
//!
//! The server's command names are on-the-wire constants and must match its
//! catalogue exactly. `executeParagraph` is the one client-only entry: it
//! never reaches the wire and is resolved locally into `executeQuery` with
//! a paragraph-derived range.

use std::time::Duration;

use lsp_types::{Position, Range};
use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use tracing::debug;

use super::chooser::{ChoicePrompt, ResultSink, switch_flow};
use super::client::ServerTransport;
use super::gateway::{CommandInvocation, DEFAULT_COMMAND_TIMEOUT, Gateway, RequestError};
use super::range::{DocumentText, resolve};

pub const CMD_EXECUTE_QUERY: &str = "executeQuery";
pub const CMD_EXPLAIN_QUERY: &str = "explainQuery";
pub const CMD_EXECUTE_PARAGRAPH: &str = "executeParagraph";
pub const CMD_SHOW_DATABASES: &str = "showDatabases";
pub const CMD_SHOW_SCHEMAS: &str = "showSchemas";
pub const CMD_SHOW_CONNECTIONS: &str = "showConnections";
pub const CMD_SHOW_CONNECTION_ALIASES: &str = "showConnectionAliases";
pub const CMD_SWITCH_DATABASE: &str = "switchDatabase";
pub const CMD_SWITCH_CONNECTIONS: &str = "switchConnections";

/// Bridge-level command errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// One entry in the command catalogue.
///
/// Identity is the name; the catalogue is closed and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    ExecuteQuery,
    ExplainQuery,
    ExecuteParagraph,
    ShowDatabases,
    ShowSchemas,
    ShowConnections,
    ShowConnectionAliases,
    SwitchDatabase,
    SwitchConnections,
}

impl CommandKind {
    /// The full catalogue.
    pub const ALL: [Self; 9] = [
        Self::ExecuteQuery,
        Self::ExplainQuery,
        Self::ExecuteParagraph,
        Self::ShowDatabases,
        Self::ShowSchemas,
        Self::ShowConnections,
        Self::ShowConnectionAliases,
        Self::SwitchDatabase,
        Self::SwitchConnections,
    ];

    /// Resolves a command name to its catalogue entry.
    pub fn from_name(name: &str) -> Result<Self, BridgeError> {
        match name {
            CMD_EXECUTE_QUERY => Ok(Self::ExecuteQuery),
            CMD_EXPLAIN_QUERY => Ok(Self::ExplainQuery),
            CMD_EXECUTE_PARAGRAPH => Ok(Self::ExecuteParagraph),
            CMD_SHOW_DATABASES => Ok(Self::ShowDatabases),
            CMD_SHOW_SCHEMAS => Ok(Self::ShowSchemas),
            CMD_SHOW_CONNECTIONS => Ok(Self::ShowConnections),
            CMD_SHOW_CONNECTION_ALIASES => Ok(Self::ShowConnectionAliases),
            CMD_SWITCH_DATABASE => Ok(Self::SwitchDatabase),
            CMD_SWITCH_CONNECTIONS => Ok(Self::SwitchConnections),
            other => Err(BridgeError::UnknownCommand(other.to_string())),
        }
    }

    /// Catalogue name of this command.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ExecuteQuery => CMD_EXECUTE_QUERY,
            Self::ExplainQuery => CMD_EXPLAIN_QUERY,
            Self::ExecuteParagraph => CMD_EXECUTE_PARAGRAPH,
            Self::ShowDatabases => CMD_SHOW_DATABASES,
            Self::ShowSchemas => CMD_SHOW_SCHEMAS,
            Self::ShowConnections => CMD_SHOW_CONNECTIONS,
            Self::ShowConnectionAliases => CMD_SHOW_CONNECTION_ALIASES,
            Self::SwitchDatabase => CMD_SWITCH_DATABASE,
            Self::SwitchConnections => CMD_SWITCH_CONNECTIONS,
        }
    }

    /// Name sent to the server. Differs from [`Self::name`] only for the
    /// client-only paragraph pseudo-command.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::ExecuteParagraph => CMD_EXECUTE_QUERY,
            other => other.name(),
        }
    }

    /// Whether the invocation must carry a source range.
    #[must_use]
    pub const fn requires_range(self) -> bool {
        matches!(
            self,
            Self::ExecuteQuery | Self::ExplainQuery | Self::ExecuteParagraph
        )
    }

    /// Whether the range is computed with the paragraph strategy.
    #[must_use]
    pub const fn uses_paragraph_range(self) -> bool {
        matches!(self, Self::ExecuteParagraph)
    }

    /// Whether the command takes an operator-chosen argument (and thus
    /// runs through the chooser workflow).
    #[must_use]
    pub const fn requires_arguments(self) -> bool {
        matches!(self, Self::SwitchDatabase | Self::SwitchConnections)
    }

    /// Listing command whose output feeds the chooser prompt, for the two
    /// switch commands.
    #[must_use]
    pub const fn listing_command(self) -> Option<Self> {
        match self {
            Self::SwitchDatabase => Some(Self::ShowDatabases),
            Self::SwitchConnections => Some(Self::ShowConnectionAliases),
            _ => None,
        }
    }
}

/// Typed arguments, one record per command.
///
/// Replaces the server protocol's order-sensitive positional lists with a
/// closed variant type; [`CommandArgs::to_wire`] is the only place the
/// positional encoding exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandArgs {
    ExecuteQuery { uri: String },
    ExplainQuery { uri: String },
    ShowDatabases,
    ShowSchemas,
    ShowConnections,
    ShowConnectionAliases,
    SwitchDatabase { database: String },
    SwitchConnections { alias: String },
}

impl CommandArgs {
    /// Default arguments for a command invoked directly on a document.
    ///
    /// `None` for the switch commands: their argument comes from the
    /// chooser prompt, not from the editor context.
    #[must_use]
    pub fn for_direct_action(kind: CommandKind, document_uri: &str) -> Option<Self> {
        match kind {
            CommandKind::ExecuteQuery | CommandKind::ExecuteParagraph => {
                Some(Self::ExecuteQuery {
                    uri: document_uri.to_string(),
                })
            }
            CommandKind::ExplainQuery => Some(Self::ExplainQuery {
                uri: document_uri.to_string(),
            }),
            CommandKind::ShowDatabases => Some(Self::ShowDatabases),
            CommandKind::ShowSchemas => Some(Self::ShowSchemas),
            CommandKind::ShowConnections => Some(Self::ShowConnections),
            CommandKind::ShowConnectionAliases => Some(Self::ShowConnectionAliases),
            CommandKind::SwitchDatabase | CommandKind::SwitchConnections => None,
        }
    }

    /// Catalogue entry these arguments belong to.
    #[must_use]
    pub const fn command(&self) -> CommandKind {
        match self {
            Self::ExecuteQuery { .. } => CommandKind::ExecuteQuery,
            Self::ExplainQuery { .. } => CommandKind::ExplainQuery,
            Self::ShowDatabases => CommandKind::ShowDatabases,
            Self::ShowSchemas => CommandKind::ShowSchemas,
            Self::ShowConnections => CommandKind::ShowConnections,
            Self::ShowConnectionAliases => CommandKind::ShowConnectionAliases,
            Self::SwitchDatabase { .. } => CommandKind::SwitchDatabase,
            Self::SwitchConnections { .. } => CommandKind::SwitchConnections,
        }
    }

    /// Encodes the arguments in the positional order the server expects.
    #[must_use]
    pub fn to_wire(&self) -> Vec<JsonValue> {
        match self {
            Self::ExecuteQuery { uri } | Self::ExplainQuery { uri } => vec![json!(uri)],
            Self::ShowDatabases
            | Self::ShowSchemas
            | Self::ShowConnections
            | Self::ShowConnectionAliases => Vec::new(),
            Self::SwitchDatabase { database } => vec![json!(database)],
            Self::SwitchConnections { alias } => vec![json!(alias)],
        }
    }
}

/// Editor-side inputs for one command invocation.
#[derive(Debug, Clone)]
pub struct EditorContext<'a> {
    /// URI of the active document.
    pub document_uri: &'a str,

    /// Buffer text, line-indexed.
    pub document: &'a DocumentText,

    /// Current cursor position.
    pub cursor: Position,

    /// Active selection bounds, if any.
    pub selection: Option<Range>,

    /// Explicit start bound (used only when both bounds are given).
    pub explicit_start: Option<Position>,

    /// Explicit end bound.
    pub explicit_end: Option<Position>,
}

impl<'a> EditorContext<'a> {
    /// Creates a context with only the cursor set; no selection, no
    /// explicit bounds.
    #[must_use]
    pub fn new(document_uri: &'a str, document: &'a DocumentText, cursor: Position) -> Self {
        Self {
            document_uri,
            document,
            cursor,
            selection: None,
            explicit_start: None,
            explicit_end: None,
        }
    }

    /// Sets the active selection.
    #[must_use]
    pub const fn with_selection(mut self, selection: Range) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Sets both explicit bounds.
    #[must_use]
    pub const fn with_explicit_bounds(mut self, start: Position, end: Position) -> Self {
        self.explicit_start = Some(start);
        self.explicit_end = Some(end);
        self
    }
}

/// Routes editor actions to the gateway or the chooser workflow.
///
/// One dispatch call per user action; the call does not return until the
/// server has replied, the timeout has elapsed, or the operator cancelled
/// a chooser prompt.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with the default per-command timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Overrides the per-command timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Dispatches a command by name.
    ///
    /// `presupplied` carries an argument list verbatim when the action was
    /// re-invoked from a server-pushed code action; otherwise arguments
    /// are built from the editor context.
    pub async fn dispatch<T, P, S>(
        &self,
        transport: &T,
        name: &str,
        presupplied: Option<Vec<JsonValue>>,
        ctx: &EditorContext<'_>,
        prompt: &mut P,
        sink: &mut S,
    ) -> Result<(), BridgeError>
    where
        T: ServerTransport,
        P: ChoicePrompt,
        S: ResultSink,
    {
        let kind = CommandKind::from_name(name)?;
        debug!("Dispatching {}", kind.name());

        if kind.requires_arguments() {
            if let Some(args) = presupplied.as_ref() {
                debug!(
                    "Ignoring {} pre-supplied argument(s) for {}; the chooser prompts instead",
                    args.len(),
                    kind.name()
                );
            }
            let _ = switch_flow(transport, kind, self.timeout, prompt, sink).await?;
            return Ok(());
        }

        let arguments = presupplied.unwrap_or_else(|| {
            CommandArgs::for_direct_action(kind, ctx.document_uri)
                .map_or_else(Vec::new, |args| args.to_wire())
        });

        let mut invocation = CommandInvocation::new(kind)
            .with_arguments(arguments)
            .with_timeout(self.timeout);

        if kind.requires_range() {
            invocation = invocation.with_range(resolve(
                ctx.explicit_start,
                ctx.explicit_end,
                ctx.selection,
                kind.uses_paragraph_range(),
                ctx.cursor,
                ctx.document,
            ));
        }

        let text = Gateway::new(transport).invoke(&invocation).await?;
        sink.display(&text);
        Ok(())
    }
}
