//! LSP Transport Layer
//!
//! Handles LSP message framing with Content-Length headers.
//! Works over any async byte stream: child process pipes in production,
//! in-memory duplex streams in tests.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::protocol::Message;

/// LSP Transport for reading messages
pub struct Transport<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> Transport<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message from the peer
    ///
    /// LSP messages are framed with headers:
    /// ```text
    /// Content-Length: 123\r\n
    /// \r\n
    /// {"jsonrpc":"2.0",...}
    /// ```
    pub async fn read_message(&mut self) -> io::Result<Message> {
        let json = self.read_raw().await?;
        Message::parse(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Read the next framed body without interpreting it
    pub async fn read_raw(&mut self) -> io::Result<String> {
        let content_length = self.read_headers().await?;

        let mut body = vec![0u8; content_length];
        self.reader.read_exact(&mut body).await?;

        let json =
            String::from_utf8(body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        tracing::trace!("LSP <- {}", json);
        Ok(json)
    }

    /// Read headers and return Content-Length
    async fn read_headers(&mut self) -> io::Result<usize> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Server closed connection",
                ));
            }

            let line = line.trim();

            // Empty line marks end of headers
            if line.is_empty() {
                break;
            }

            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
                );
            }
            // Ignore other headers (Content-Type, etc.)
        }

        content_length
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Missing Content-Length"))
    }
}

/// Serialize any JSON-RPC message body
pub fn encode<T: Serialize>(message: &T) -> io::Result<String> {
    serde_json::to_string(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write a raw JSON message with LSP framing
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> io::Result<()> {
    tracing::trace!("LSP -> {}", json);

    let message = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
    writer.write_all(message.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::lsp::protocol::{Notification, Request};

    #[test]
    fn test_message_framing() {
        let json = r#"{"jsonrpc":"2.0","id":1,"method":"test"}"#;
        let framed = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
        assert!(framed.starts_with("Content-Length: 40"));
        assert!(framed.contains("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_write_then_read_over_duplex() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut transport = Transport::new(server);

        let request = Request::new(1, "$/lean/plainGoal", Some(serde_json::json!({})));
        write_message(&mut client, &encode(&request).unwrap())
            .await
            .unwrap();
        let notification = Notification::new("exit", None);
        write_message(&mut client, &encode(&notification).unwrap())
            .await
            .unwrap();

        match transport.read_message().await.unwrap() {
            Message::Request(req) => assert_eq!(req.method, "$/lean/plainGoal"),
            other => panic!("expected request, got {:?}", other),
        }
        match transport.read_message().await.unwrap() {
            Message::Notification(n) => assert_eq!(n.method, "exit"),
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extra_headers_are_ignored() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut transport = Transport::new(server);

        let json = r#"{"jsonrpc":"2.0","method":"initialized"}"#;
        let framed = format!(
            "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=utf-8\r\n\r\n{}",
            json.len(),
            json
        );
        client.write_all(framed.as_bytes()).await.unwrap();

        assert_eq!(transport.read_raw().await.unwrap(), json);
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut transport = Transport::new(server);

        client.write_all(b"X-Other: 1\r\n\r\n{}").await.unwrap();

        let err = transport.read_raw().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_eof_is_reported() {
        let (client, server) = tokio::io::duplex(64);
        let mut transport = Transport::new(server);
        drop(client);

        let err = transport.read_raw().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
