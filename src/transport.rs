use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::{Error, Result};

/// Default connect/read timeout, matching the hub firmware's expectations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Address of a Neo-hub. Each exchange opens and closes its own connection,
/// so a target can be shared freely between sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubTarget {
    host: String,
    port: u16,
    timeout: Duration,
}

impl HubTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for HubTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Outcome of one request/response exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Connect refused/unreachable/timed out, or the hub never answered.
    Offline,
    /// Presence probe succeeded; nothing was sent.
    Online,
    /// Decoded response document.
    Payload(Value),
}

/// Perform one framed exchange with the hub.
///
/// A `None` request is a pure presence probe: the connection is opened and
/// immediately dropped without writing a byte. Otherwise the request is sent
/// as a single JSON line terminated by `\0\r`, and the response is read until
/// the first newline, EOF, or a read timeout after at least one chunk.
///
/// An unreachable hub is `Ok(Reply::Offline)`, never an error; a response
/// that fails to decode is `Err` so callers can tell the two apart.
pub async fn exchange(target: &HubTarget, request: Option<&Value>) -> Result<Reply> {
    let mut stream = match timeout(
        target.timeout,
        TcpStream::connect((target.host.as_str(), target.port)),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            debug!(target = %target, error = %e, "connect failed");
            return Ok(Reply::Offline);
        }
        Err(_) => {
            debug!(target = %target, "connect timed out");
            return Ok(Reply::Offline);
        }
    };

    let request = match request {
        Some(request) => request,
        // no communication needed, connecting alone proves presence
        None => return Ok(Reply::Online),
    };

    let mut frame = serde_json::to_vec(request)?;
    frame.extend_from_slice(b"\0\r");
    debug!(target = %target, request = %request, "sending request");
    stream.write_all(&frame).await?;

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match timeout(target.timeout, stream.read(&mut chunk)).await {
            // Timed out before any byte arrived: the hub is not answering.
            Err(_) if buf.is_empty() => {
                debug!(target = %target, "read timed out, assuming offline");
                return Ok(Reply::Offline);
            }
            // Timed out mid-stream: the hub sometimes just idles instead of
            // terminating with a newline, so use what we have.
            Err(_) => break,
            Ok(Err(e)) if buf.is_empty() => return Err(Error::Io(e)),
            Ok(Err(_)) => break,
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.contains(&b'\n') {
                    break;
                }
            }
        }
    }

    let text = extract_frame(&buf)?;
    trace!(target = %target, response = %text, "received response");
    let value: Value = serde_json::from_str(&lenient_json(&text))?;
    Ok(Reply::Payload(value))
}

/// Check hub reachability without sending anything.
pub async fn probe(target: &HubTarget) -> bool {
    matches!(exchange(target, None).await, Ok(Reply::Online))
}

/// Response text is everything before the first newline, or the whole buffer
/// when the hub closed/idled without one. Trailing NUL padding is stripped.
fn extract_frame(buf: &[u8]) -> Result<String> {
    let mut frame = match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => &buf[..pos],
        None => buf,
    };
    while let [rest @ .., 0] = frame {
        frame = rest;
    }
    String::from_utf8(frame.to_vec())
        .map_err(|_| Error::Protocol("response is not valid UTF-8".to_string()))
}

/// The hub emits non-strict JSON on occasion. Map bare `NaN`/`Infinity`
/// tokens outside of strings to `null` so strict parsing succeeds.
fn lenient_json(text: &str) -> Cow<'_, str> {
    if !text.contains("NaN") && !text.contains("Infinity") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut skip_until = 0;
    for (i, c) in text.char_indices() {
        if i < skip_until {
            continue;
        }
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            'N' if text[i..].starts_with("NaN") => {
                out.push_str("null");
                skip_until = i + 3;
            }
            'I' if text[i..].starts_with("Infinity") => {
                out.push_str("null");
                skip_until = i + 8;
            }
            '-' if text[i + 1..].starts_with("Infinity") => {
                out.push_str("null");
                skip_until = i + 9;
            }
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
