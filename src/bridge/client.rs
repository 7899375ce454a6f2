//! LSP client for JSON-RPC communication with the SQL language server.
//!
//! Handles process lifecycle, Content-Length framing over stdio, and
//! request/response correlation. Everything above this layer (the command
//! gateway, the configuration resolver) talks through [`ServerTransport`].

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::debug;

/// Default transport-level request timeout in milliseconds.
///
/// Independent of the per-command timeout the gateway carries inside the
/// `workspace/executeCommand` payload.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2000;

/// Maximum pending requests.
const MAX_PENDING_REQUESTS: usize = 50;

/// LSP client error types.
#[derive(Debug, Error)]
pub enum LspError {
    #[error("Failed to spawn server: {0}")]
    SpawnError(#[from] std::io::Error),

    #[error("Server process not running")]
    NotRunning,

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Server error: {code} - {message}")]
    ServerError { code: i64, message: String },

    #[error("Channel closed")]
    ChannelClosed,

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Seam between the protocol bridge and the transport.
///
/// Implemented by [`LspClient`] for real use and by in-memory fakes in
/// tests; the gateway, the chooser workflow, and the configuration
/// resolver only ever see this trait.
#[allow(async_fn_in_trait)]
pub trait ServerTransport {
    /// Sends a request and awaits the correlated response.
    async fn request(&self, method: &str, params: JsonValue) -> Result<JsonValue, LspError>;

    /// Sends a fire-and-forget notification.
    async fn notify(&self, method: &str, params: JsonValue) -> Result<(), LspError>;
}

/// Launch configuration for the SQL language server process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server executable command.
    pub command: String,

    /// Command-line arguments.
    pub args: Vec<String>,

    /// Language identifier sent with document sync (usually "sql").
    pub language_id: String,

    /// Transport-level request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    /// Creates a new server configuration.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            language_id: "sql".to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    /// Adds command-line arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the language identifier.
    #[must_use]
    pub fn with_language_id(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = language_id.into();
        self
    }

    /// Overrides the transport-level request timeout.
    #[must_use]
    pub const fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Returns the command with platform-specific adjustments.
    #[must_use]
    pub fn platform_command(&self) -> String {
        #[cfg(windows)]
        {
            if !self.command.ends_with(".exe") && !self.command.contains('.') {
                format!("{}.exe", self.command)
            } else {
                self.command.clone()
            }
        }
        #[cfg(not(windows))]
        {
            self.command.clone()
        }
    }
}

/// LSP request message.
#[derive(Debug, Serialize)]
struct LspRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: JsonValue,
}

/// LSP response message.
#[derive(Debug, Deserialize)]
struct LspResponse {
    id: Option<u64>,
    result: Option<JsonValue>,
    error: Option<LspResponseError>,
}

/// LSP error response.
#[derive(Debug, Deserialize)]
struct LspResponseError {
    code: i64,
    message: String,
}

/// LSP notification message.
#[derive(Debug, Serialize)]
struct LspNotification {
    jsonrpc: &'static str,
    method: String,
    params: JsonValue,
}

/// Pending request with response channel.
struct PendingRequest {
    response_tx: oneshot::Sender<Result<JsonValue, LspError>>,
}

/// Extracts the value of a `Content-Length` header line, if it is one.
fn parse_content_length(line: &str) -> Option<usize> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}

/// Client connection to one SQL language server process.
///
/// One client per workspace; configuration state and in-flight commands
/// are never shared across workspaces.
pub struct LspClient {
    /// Language ID for document sync.
    language_id: String,

    /// Server process.
    process: Option<Child>,

    /// Next request ID.
    next_id: AtomicU64,

    /// Pending requests awaiting response.
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,

    /// Channel to send messages to the server.
    writer_tx: Option<mpsc::Sender<String>>,

    /// Transport-level request timeout in milliseconds.
    request_timeout_ms: u64,

    /// Document versions.
    doc_versions: HashMap<PathBuf, i32>,

    /// Workspace root path.
    root_path: PathBuf,

    /// Whether the server is initialized.
    initialized: bool,
}

impl LspClient {
    /// Spawns the server process and performs the initialize handshake.
    pub async fn spawn(config: &ServerConfig, root_path: &Path) -> Result<Self, LspError> {
        let command = config.platform_command();

        debug!("Spawning SQL language server: {} {:?}", command, config.args);

        let mut child = Command::new(&command)
            .args(&config.args)
            .current_dir(root_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LspError::SpawnError(std::io::Error::other("Failed to get stdin")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LspError::SpawnError(std::io::Error::other("Failed to get stdout")))?;

        let pending = Arc::new(Mutex::new(HashMap::new()));
        let pending_clone = Arc::clone(&pending);

        // Channel for writing to stdin
        let (writer_tx, mut writer_rx) = mpsc::channel::<String>(64);

        // Spawn writer task
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = writer_rx.recv().await {
                let header = format!("Content-Length: {}\r\n\r\n", msg.len());
                if stdin.write_all(header.as_bytes()).is_err() {
                    break;
                }
                if stdin.write_all(msg.as_bytes()).is_err() {
                    break;
                }
                if stdin.flush().is_err() {
                    break;
                }
            }
        });

        // Spawn reader task
        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            Self::read_loop(reader, pending_clone).await;
        });

        let mut client = Self {
            language_id: config.language_id.clone(),
            process: Some(child),
            next_id: AtomicU64::new(1),
            pending,
            writer_tx: Some(writer_tx),
            request_timeout_ms: config.request_timeout_ms,
            doc_versions: HashMap::new(),
            root_path: root_path.to_path_buf(),
            initialized: false,
        };

        // Initialize the server
        client.initialize().await?;

        Ok(client)
    }

    /// Reads messages from the server.
    async fn read_loop(
        mut reader: BufReader<std::process::ChildStdout>,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    ) {
        loop {
            let mut content_length: usize = 0;

            // Read headers
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => return, // EOF
                    Ok(_) => {
                        if line == "\r\n" || line == "\n" {
                            break;
                        }
                        if let Some(len) = parse_content_length(&line) {
                            content_length = len;
                        }
                    }
                    Err(_) => return,
                }
            }

            if content_length == 0 {
                continue;
            }

            // Read content
            let mut content = vec![0u8; content_length];
            if reader.read_exact(&mut content).is_err() {
                return;
            }

            // Parse response
            let content_str = match String::from_utf8(content) {
                Ok(s) => s,
                Err(_) => continue,
            };

            let response: LspResponse = match serde_json::from_str(&content_str) {
                Ok(r) => r,
                Err(_) => continue,
            };

            // Handle response; server-initiated notifications carry no id
            // and are ignored here.
            if let Some(id) = response.id {
                let mut pending_guard = pending.lock().await;
                if let Some(request) = pending_guard.remove(&id) {
                    let result = if let Some(error) = response.error {
                        Err(LspError::ServerError {
                            code: error.code,
                            message: error.message,
                        })
                    } else {
                        Ok(response.result.unwrap_or(JsonValue::Null))
                    };
                    let _ = request.response_tx.send(result);
                }
            }
        }
    }

    /// Initializes the LSP connection.
    ///
    /// The capability set is minimal: command execution, configuration
    /// push, and document synchronization are all the bridge needs.
    async fn initialize(&mut self) -> Result<(), LspError> {
        let params = json!({
            "processId": std::process::id(),
            "rootUri": format!("file://{}", self.root_path.display()),
            "capabilities": {
                "workspace": {
                    "executeCommand": {
                        "dynamicRegistration": false
                    },
                    "didChangeConfiguration": {
                        "dynamicRegistration": false
                    },
                    "workspaceFolders": true
                },
                "textDocument": {
                    "synchronization": {
                        "didSave": true,
                        "willSave": false,
                        "willSaveWaitUntil": false
                    }
                }
            },
            "workspaceFolders": [{
                "uri": format!("file://{}", self.root_path.display()),
                "name": self.root_path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("workspace")
            }]
        });

        self.send_request("initialize", params).await?;

        // Send initialized notification
        self.send_notification("initialized", json!({})).await?;
        self.initialized = true;

        debug!("SQL language server initialized");
        Ok(())
    }

    /// Sends a request to the server.
    async fn send_request(&self, method: &str, params: JsonValue) -> Result<JsonValue, LspError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = LspRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        let msg = serde_json::to_string(&request)?;

        // Create response channel
        let (response_tx, response_rx) = oneshot::channel();

        // Register pending request
        {
            let mut pending = self.pending.lock().await;
            if pending.len() >= MAX_PENDING_REQUESTS {
                return Err(LspError::InvalidResponse(
                    "Too many pending requests".into(),
                ));
            }
            pending.insert(id, PendingRequest { response_tx });
        }

        // Send request
        let writer = self.writer_tx.as_ref().ok_or(LspError::NotRunning)?;
        writer
            .send(msg)
            .await
            .map_err(|_| LspError::ChannelClosed)?;

        // Wait for response with timeout
        match tokio::time::timeout(
            std::time::Duration::from_millis(self.request_timeout_ms),
            response_rx,
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LspError::ChannelClosed),
            Err(_) => {
                // Remove from pending
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                Err(LspError::Timeout)
            }
        }
    }

    /// Sends a notification to the server.
    async fn send_notification(&self, method: &str, params: JsonValue) -> Result<(), LspError> {
        let notification = LspNotification {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
        };

        let msg = serde_json::to_string(&notification)?;
        let writer = self.writer_tx.as_ref().ok_or(LspError::NotRunning)?;
        writer
            .send(msg)
            .await
            .map_err(|_| LspError::ChannelClosed)?;
        Ok(())
    }

    /// Notifies the server of a document open.
    ///
    /// The server resolves the document URI that `executeQuery` sends from
    /// its own workspace copy, so the buffer must be synced before any
    /// range-based command runs.
    pub async fn did_open(&mut self, path: &Path, content: &str) -> Result<(), LspError> {
        if !self.initialized {
            return Ok(());
        }

        let uri = format!("file://{}", path.display());
        self.doc_versions.insert(path.to_path_buf(), 1);

        self.send_notification(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": self.language_id,
                    "version": 1,
                    "text": content
                }
            }),
        )
        .await
    }

    /// Notifies the server of a document change.
    pub async fn did_change(&mut self, path: &Path, content: &str) -> Result<(), LspError> {
        if !self.initialized {
            return Ok(());
        }

        let uri = format!("file://{}", path.display());
        let version = {
            let version_ref = self.doc_versions.entry(path.to_path_buf()).or_insert(0);
            *version_ref += 1;
            *version_ref
        };

        self.send_notification(
            "textDocument/didChange",
            json!({
                "textDocument": {
                    "uri": uri,
                    "version": version
                },
                "contentChanges": [{
                    "text": content
                }]
            }),
        )
        .await
    }

    /// Notifies the server of a document close.
    pub async fn did_close(&mut self, path: &Path) -> Result<(), LspError> {
        if !self.initialized {
            return Ok(());
        }

        let uri = format!("file://{}", path.display());
        self.doc_versions.remove(path);

        self.send_notification(
            "textDocument/didClose",
            json!({
                "textDocument": {
                    "uri": uri
                }
            }),
        )
        .await
    }

    /// Shuts down the language server.
    pub async fn shutdown(&mut self) -> Result<(), LspError> {
        if !self.initialized {
            return Ok(());
        }

        // Send shutdown request
        let _ = self.send_request("shutdown", JsonValue::Null).await;

        // Send exit notification
        let _ = self.send_notification("exit", JsonValue::Null).await;

        // Close writer channel
        self.writer_tx.take();

        // Kill process if still running
        if let Some(ref mut process) = self.process {
            let _ = process.kill();
            let _ = process.wait();
        }

        self.initialized = false;
        debug!("SQL language server shut down");
        Ok(())
    }

    /// Returns whether the server is initialized.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl ServerTransport for LspClient {
    async fn request(&self, method: &str, params: JsonValue) -> Result<JsonValue, LspError> {
        self.send_request(method, params).await
    }

    async fn notify(&self, method: &str, params: JsonValue) -> Result<(), LspError> {
        self.send_notification(method, params).await
    }
}

impl Drop for LspClient {
    fn drop(&mut self) {
        // Attempt graceful shutdown
        if let Some(ref mut process) = self.process {
            let _ = process.kill();
        }
    }
}
