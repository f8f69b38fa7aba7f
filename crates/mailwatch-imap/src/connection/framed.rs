//! Framed I/O for the IMAP protocol.
//!
//! IMAP responses are CRLF-terminated lines. The watcher's command subset
//! (CAPABILITY, LOGIN, EXAMINE, IDLE, NOOP, LOGOUT) never solicits literal
//! syntax in responses, so a literal marker at the end of a line is treated
//! as a protocol error rather than parsed.

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Framed connection for the IMAP protocol.
///
/// Handles CRLF-terminated line reading and buffered command writing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads a single CRLF-terminated response line.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let line = self.read_line().await?;

        if ends_with_literal(&line) {
            return Err(Error::Protocol(
                "unexpected literal in response".to_string(),
            ));
        }

        Ok(line)
    }

    /// Reads one line including the trailing CRLF.
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let mut chunk = Vec::new();
            let n = (&mut self.reader).take(8192).read_until(b'\n', &mut chunk).await?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }

            line.extend_from_slice(&chunk);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol(format!(
                    "response line too long: {} bytes (max {MAX_LINE_LENGTH})",
                    line.len()
                )));
            }

            if line.ends_with(b"\n") {
                return Ok(line);
            }
        }
    }

    /// Writes a serialized command and flushes it.
    pub async fn write_command(&mut self, command: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(command);
        self.reader
            .get_mut()
            .write_all(&self.write_buffer)
            .await?;
        self.reader.get_mut().flush().await?;
        Ok(())
    }

    /// Consumes the framing and returns the underlying stream.
    ///
    /// Used for the STARTTLS upgrade, which must happen between complete
    /// response lines (the read buffer is expected to be empty).
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Returns true if a line announces a literal: `... {123}\r\n` or `{123+}\r\n`.
fn ends_with_literal(line: &[u8]) -> bool {
    let trimmed = match line {
        [rest @ .., b'\r', b'\n'] | [rest @ .., b'\n'] => rest,
        other => other,
    };
    let Some(&b'}') = trimmed.last() else {
        return false;
    };
    let Some(open) = trimmed.iter().rposition(|&b| b == b'{') else {
        return false;
    };
    trimmed[open + 1..trimmed.len() - 1]
        .iter()
        .all(|&b| b.is_ascii_digit() || b == b'+')
        && trimmed.len() - open > 2
}
