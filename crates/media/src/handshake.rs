//! One-line publish/play handshake spoken by the relay server.
//!
//! The client sends `PUBLISH <key>\n` or `PLAY <key>\n`; the server answers
//! `OK\n` or `ERR <reason>\n`. FLV bytes follow an `OK`.

use crate::error::{MediaError, MediaResult};
use std::fmt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Longest request or reply line accepted.
pub const MAX_LINE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Publish(String),
    Play(String),
}

impl Request {
    pub fn key(&self) -> &str {
        match self {
            Request::Publish(key) | Request::Play(key) => key,
        }
    }

    pub fn parse(line: &str) -> MediaResult<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, key) = line
            .split_once(' ')
            .ok_or_else(|| MediaError::Format(format!("malformed request '{}'", line)))?;

        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(MediaError::Format(format!("invalid stream key '{}'", key)));
        }

        match verb {
            "PUBLISH" => Ok(Request::Publish(key.to_string())),
            "PLAY" => Ok(Request::Play(key.to_string())),
            other => Err(MediaError::Format(format!("unknown request '{}'", other))),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Publish(key) => write!(f, "PUBLISH {}", key),
            Request::Play(key) => write!(f, "PLAY {}", key),
        }
    }
}

/// Read one newline-terminated line, bounded by [`MAX_LINE`].
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> MediaResult<String> {
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE as u64)
        .read_until(b'\n', &mut buf)
        .await?;
    if n == 0 {
        return Err(MediaError::Format("connection closed during handshake".to_string()));
    }
    if buf.last() != Some(&b'\n') {
        return Err(MediaError::Format("handshake line too long".to_string()));
    }
    String::from_utf8(buf)
        .map(|s| s.trim_end_matches(['\r', '\n']).to_string())
        .map_err(|_| MediaError::Format("handshake line is not UTF-8".to_string()))
}

/// Client side: send `request` and wait for the server's verdict.
pub async fn client_handshake<S>(stream: &mut S, address: &str, request: &Request) -> MediaResult<()>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    stream.write_all(format!("{}\n", request).as_bytes()).await?;
    stream.flush().await?;

    let reply = read_line(stream).await?;
    match reply.as_str() {
        "OK" => Ok(()),
        other => Err(MediaError::Handshake {
            address: address.to_string(),
            reason: other.strip_prefix("ERR ").unwrap_or(other).to_string(),
        }),
    }
}

/// Server side: acknowledge a request.
pub async fn accept<W: AsyncWrite + Unpin>(writer: &mut W) -> MediaResult<()> {
    writer.write_all(b"OK\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Server side: refuse a request with `reason`.
pub async fn reject<W: AsyncWrite + Unpin>(writer: &mut W, reason: &str) -> MediaResult<()> {
    writer.write_all(format!("ERR {}\n", reason).as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
