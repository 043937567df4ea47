//! Newline-delimited JSON over stdio.
//!
//! One JSON-RPC message per line, UTF-8, no embedded newlines. stdin
//! carries client messages, stdout carries server messages, and stderr is
//! left to logging.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse};

/// A stdio-based MCP transport.
pub struct StdioTransport {
    reader: BufReader<tokio::io::Stdin>,
    writer: tokio::io::Stdout,
}

impl StdioTransport {
    /// Creates a transport over the process's stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }

    /// Reads the next line, without its line terminator.
    ///
    /// Returns `None` once stdin is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from stdin fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    /// Writes a success response.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        self.write_message(response).await
    }

    /// Writes an error response.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_error(&mut self, error: &JsonRpcError) -> io::Result<()> {
        self.write_message(error).await
    }

    async fn write_message<T: Serialize + Sync>(&mut self, message: &T) -> io::Result<()> {
        let json = encode_line(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialises `message` as one newline-terminated line.
fn encode_line<T: Serialize>(message: &T) -> io::Result<String> {
    let mut json = serde_json::to_string(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    debug_assert!(!json.contains('\n'), "message must fit on one line");
    json.push('\n');
    Ok(json)
}
