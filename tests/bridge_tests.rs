//! Integration tests for the command protocol bridge.
//!
//! These tests verify that:
//! - Dispatch assembles the exact `workspace/executeCommand` payloads the
//!   server expects, including range and in-payload timeout
//! - The chooser workflow round-trips a listing into a switch invocation
//!   and that cancellation sends nothing
//! - Timeouts surface as errors without ever reaching the result sink
//! - The configuration bootstrap publishes exactly when it should
//!
//! All tests run against an in-memory transport; no server process is
//! spawned.

use std::cell::RefCell;
use std::time::Duration;

use lsp_types::{Position, Range};
use pretty_assertions::assert_eq;
use serde_json::{Value as JsonValue, json};

use sql_ls_bridge::{
    BridgeError, ChoicePrompt, ConfigPathMode, ConfigResolver, ConnectionDescriptor, Dispatcher,
    DocumentText, EditorContext, LspError, RequestError, ResultSink, ServerTransport,
};

// ============================================================================
// Test doubles
// ============================================================================

/// In-memory transport replaying a scripted response queue.
#[derive(Default)]
struct MockTransport {
    requests: RefCell<Vec<(String, JsonValue)>>,
    notifications: RefCell<Vec<(String, JsonValue)>>,
    responses: RefCell<Vec<JsonValue>>,
    hang: bool,
}

impl MockTransport {
    fn replying(responses: Vec<JsonValue>) -> Self {
        Self {
            responses: RefCell::new(responses),
            ..Self::default()
        }
    }

    fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    fn request_params(&self, index: usize) -> JsonValue {
        self.requests.borrow()[index].1.clone()
    }

    fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl ServerTransport for MockTransport {
    async fn request(&self, method: &str, params: JsonValue) -> Result<JsonValue, LspError> {
        self.requests
            .borrow_mut()
            .push((method.to_string(), params));
        if self.hang {
            std::future::pending::<()>().await;
        }
        let mut responses = self.responses.borrow_mut();
        if responses.is_empty() {
            Ok(JsonValue::Null)
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn notify(&self, method: &str, params: JsonValue) -> Result<(), LspError> {
        self.notifications
            .borrow_mut()
            .push((method.to_string(), params));
        Ok(())
    }
}

struct ScriptedPrompt {
    answer: Option<String>,
    seen_choices: RefCell<Vec<Vec<String>>>,
}

impl ScriptedPrompt {
    fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            seen_choices: RefCell::new(Vec::new()),
        }
    }

    fn cancelling() -> Self {
        Self {
            answer: None,
            seen_choices: RefCell::new(Vec::new()),
        }
    }
}

impl ChoicePrompt for ScriptedPrompt {
    fn choose(&mut self, _title: &str, choices: &[String]) -> Option<String> {
        self.seen_choices.borrow_mut().push(choices.to_vec());
        self.answer.clone()
    }
}

#[derive(Default)]
struct DisplayBuffer {
    shown: Vec<String>,
}

impl ResultSink for DisplayBuffer {
    fn display(&mut self, text: &str) {
        self.shown.push(text.to_string());
    }
}

fn ten_line_doc() -> DocumentText {
    // Last line is "select 9;" (9 characters)
    let text = (0..10)
        .map(|i| format!("select {i};"))
        .collect::<Vec<_>>()
        .join("\n");
    DocumentText::new(&text)
}

// ============================================================================
// Dispatch and gateway payloads
// ============================================================================

#[tokio::test]
async fn test_whole_buffer_execute_payload() {
    let transport = MockTransport::replying(vec![json!("id\n--\n1")]);
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let dispatcher = Dispatcher::new().with_timeout(Duration::from_millis(500));
    let mut prompt = ScriptedPrompt::cancelling();
    let mut sink = DisplayBuffer::default();

    dispatcher
        .dispatch(&transport, "executeQuery", None, &ctx, &mut prompt, &mut sink)
        .await
        .unwrap();

    let params = transport.request_params(0);
    assert_eq!(params["command"], "executeQuery");
    assert_eq!(params["arguments"], json!(["file:///queries.sql"]));
    assert_eq!(params["timeout"], json!(0.5));
    assert_eq!(
        params["range"],
        json!({
            "start": {"line": 0, "character": 0},
            "end": {"line": 9, "character": 9}
        })
    );

    // Raw text reaches the sink unmodified
    assert_eq!(sink.shown, vec!["id\n--\n1"]);
}

#[tokio::test]
async fn test_selection_beats_whole_buffer() {
    let transport = MockTransport::replying(vec![json!("ok")]);
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(5, 0))
        .with_selection(Range::new(Position::new(2, 0), Position::new(3, 9)));
    let dispatcher = Dispatcher::new();
    let mut prompt = ScriptedPrompt::cancelling();
    let mut sink = DisplayBuffer::default();

    dispatcher
        .dispatch(&transport, "explainQuery", None, &ctx, &mut prompt, &mut sink)
        .await
        .unwrap();

    let params = transport.request_params(0);
    assert_eq!(params["command"], "explainQuery");
    assert_eq!(params["range"]["start"]["line"], 2);
    assert_eq!(params["range"]["end"]["line"], 3);
}

#[tokio::test]
async fn test_execute_paragraph_sends_execute_query_with_paragraph_range() {
    let transport = MockTransport::replying(vec![json!("ok")]);
    let text = "select 1;\n\nselect 2\nfrom t;\n\nselect 3;";
    let doc = DocumentText::new(text);
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(3, 1));
    let dispatcher = Dispatcher::new();
    let mut prompt = ScriptedPrompt::cancelling();
    let mut sink = DisplayBuffer::default();

    dispatcher
        .dispatch(
            &transport,
            "executeParagraph",
            None,
            &ctx,
            &mut prompt,
            &mut sink,
        )
        .await
        .unwrap();

    let params = transport.request_params(0);
    // The pseudo-command is resolved locally; the wire only sees executeQuery
    assert_eq!(params["command"], "executeQuery");
    assert_eq!(params["range"]["start"]["line"], 2);
    assert_eq!(params["range"]["end"]["line"], 3);
    assert_eq!(params["range"]["end"]["character"], 7);
}

#[tokio::test]
async fn test_listing_command_has_no_range() {
    let transport = MockTransport::replying(vec![json!("a\nb")]);
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let dispatcher = Dispatcher::new();
    let mut prompt = ScriptedPrompt::cancelling();
    let mut sink = DisplayBuffer::default();

    dispatcher
        .dispatch(&transport, "showSchemas", None, &ctx, &mut prompt, &mut sink)
        .await
        .unwrap();

    let params = transport.request_params(0);
    assert_eq!(params["command"], "showSchemas");
    assert_eq!(params["arguments"], json!([]));
    assert!(params.get("range").is_none());
    assert_eq!(sink.shown, vec!["a\nb"]);
}

#[tokio::test]
async fn test_presupplied_arguments_pass_verbatim() {
    let transport = MockTransport::replying(vec![json!("ok")]);
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let dispatcher = Dispatcher::new();
    let mut prompt = ScriptedPrompt::cancelling();
    let mut sink = DisplayBuffer::default();

    // Re-invocation from a server-pushed code action carries its own args
    let presupplied = vec![json!({"uri": "file:///other.sql"}), json!({"range": null})];
    dispatcher
        .dispatch(
            &transport,
            "executeQuery",
            Some(presupplied.clone()),
            &ctx,
            &mut prompt,
            &mut sink,
        )
        .await
        .unwrap();

    let params = transport.request_params(0);
    assert_eq!(params["arguments"], json!(presupplied));
}

#[tokio::test]
async fn test_unknown_command_fails_without_traffic() {
    let transport = MockTransport::default();
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let dispatcher = Dispatcher::new();
    let mut prompt = ScriptedPrompt::cancelling();
    let mut sink = DisplayBuffer::default();

    let err = dispatcher
        .dispatch(&transport, "dropAllTables", None, &ctx, &mut prompt, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::UnknownCommand(ref name) if name == "dropAllTables"));
    assert_eq!(transport.request_count(), 0);
    assert!(sink.shown.is_empty());
}

// ============================================================================
// Timeout propagation
// ============================================================================

#[tokio::test]
async fn test_timeout_never_reaches_sink() {
    let transport = MockTransport::hanging();
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let dispatcher = Dispatcher::new().with_timeout(Duration::from_millis(50));
    let mut prompt = ScriptedPrompt::cancelling();
    let mut sink = DisplayBuffer::default();

    let err = dispatcher
        .dispatch(&transport, "executeQuery", None, &ctx, &mut prompt, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BridgeError::Request(RequestError::Timeout(_))
    ));
    assert!(sink.shown.is_empty());
}

// ============================================================================
// Chooser workflows
// ============================================================================

#[tokio::test]
async fn test_switch_database_round_trip() {
    let transport = MockTransport::replying(vec![
        json!("db_a\ndb_b\ndb_c"),
        json!("Changed database to db_b"),
    ]);
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let dispatcher = Dispatcher::new();
    let mut prompt = ScriptedPrompt::answering("db_b");
    let mut sink = DisplayBuffer::default();

    dispatcher
        .dispatch(
            &transport,
            "switchDatabase",
            None,
            &ctx,
            &mut prompt,
            &mut sink,
        )
        .await
        .unwrap();

    // Listing first, then the switch carrying the choice as sole argument
    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.request_params(0)["command"], "showDatabases");
    let switch = transport.request_params(1);
    assert_eq!(switch["command"], "switchDatabase");
    assert_eq!(switch["arguments"], json!(["db_b"]));

    // The prompt saw exactly the listed values
    assert_eq!(
        prompt.seen_choices.borrow()[0],
        vec!["db_a", "db_b", "db_c"]
    );
    assert_eq!(sink.shown, vec!["Changed database to db_b"]);
}

#[tokio::test]
async fn test_switch_connections_uses_alias_listing() {
    let transport =
        MockTransport::replying(vec![json!("local\nstaging"), json!("Changed DB Connection")]);
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let dispatcher = Dispatcher::new();
    let mut prompt = ScriptedPrompt::answering("staging");
    let mut sink = DisplayBuffer::default();

    dispatcher
        .dispatch(
            &transport,
            "switchConnections",
            None,
            &ctx,
            &mut prompt,
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(
        transport.request_params(0)["command"],
        "showConnectionAliases"
    );
    let switch = transport.request_params(1);
    assert_eq!(switch["command"], "switchConnections");
    assert_eq!(switch["arguments"], json!(["staging"]));
}

#[tokio::test]
async fn test_switch_ignores_presupplied_args_and_prompts() {
    let transport = MockTransport::replying(vec![json!("db_a\ndb_b"), json!("switched")]);
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let dispatcher = Dispatcher::new();
    let mut prompt = ScriptedPrompt::answering("db_a");
    let mut sink = DisplayBuffer::default();

    // A code-action payload for a switch command still goes through the
    // chooser; the prompt's choice wins over the carried arguments
    dispatcher
        .dispatch(
            &transport,
            "switchDatabase",
            Some(vec![json!("db_from_code_action")]),
            &ctx,
            &mut prompt,
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.request_params(0)["command"], "showDatabases");
    assert_eq!(transport.request_params(1)["arguments"], json!(["db_a"]));
}

#[tokio::test]
async fn test_switch_connections_cancel_sends_nothing() {
    let transport = MockTransport::replying(vec![json!("local\nstaging")]);
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let dispatcher = Dispatcher::new();
    let mut prompt = ScriptedPrompt::cancelling();
    let mut sink = DisplayBuffer::default();

    // Cancellation is a normal exit, not an error
    dispatcher
        .dispatch(
            &transport,
            "switchConnections",
            None,
            &ctx,
            &mut prompt,
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(transport.request_count(), 1);
    assert!(sink.shown.is_empty());
}

// ============================================================================
// Configuration bootstrap
// ============================================================================

#[tokio::test]
async fn test_config_fallback_absent_file_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::default();
    let resolver = ConfigResolver::new();

    // `.sql-ls/config.json` absent: no publish, and absence is not an error
    let published = resolver
        .resolve_and_publish(&transport, dir.path(), &[], ConfigPathMode::Workspace)
        .await
        .unwrap();

    assert!(!published);
    assert!(transport.notifications.borrow().is_empty());
}

#[tokio::test]
async fn test_attach_then_execute_shares_one_transport() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join(".sql-ls");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.json"),
        r#"{"connections": {"local": {"driver": "mysql", "host": "localhost", "username": "root"}}}"#,
    )
    .unwrap();

    let transport = MockTransport::replying(vec![json!("1 row")]);
    let resolver = ConfigResolver::new();

    let published = resolver
        .resolve_and_publish(&transport, dir.path(), &[], ConfigPathMode::Workspace)
        .await
        .unwrap();
    assert!(published);

    // Commands become usable on the same connection after the bootstrap
    let doc = ten_line_doc();
    let ctx = EditorContext::new("file:///queries.sql", &doc, Position::new(0, 0));
    let mut prompt = ScriptedPrompt::cancelling();
    let mut sink = DisplayBuffer::default();
    Dispatcher::new()
        .dispatch(&transport, "executeQuery", None, &ctx, &mut prompt, &mut sink)
        .await
        .unwrap();

    let notifications = transport.notifications.borrow();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].0, "workspace/didChangeConfiguration");
    assert_eq!(
        notifications[0].1["settings"]["sqlLs"]["connections"][0]["username"],
        "root"
    );
    assert_eq!(sink.shown, vec!["1 row"]);
}

#[tokio::test]
async fn test_explicit_connections_override_file() {
    let dir = tempfile::tempdir().unwrap();
    // A file exists, but explicit client settings must win without file I/O
    std::fs::write(dir.path().join("sql-ls.config.json"), "{broken json").unwrap();

    let transport = MockTransport::default();
    let resolver = ConfigResolver::new();
    let explicit = vec![
        ConnectionDescriptor::new("memory", "sqlite").with_data_source_name(":memory:"),
    ];

    let published = resolver
        .resolve_and_publish(&transport, dir.path(), &explicit, ConfigPathMode::Root)
        .await
        .unwrap();

    assert!(published);
    let notifications = transport.notifications.borrow();
    assert_eq!(
        notifications[0].1["settings"]["sqlLs"]["connections"][0]["alias"],
        "memory"
    );
}
