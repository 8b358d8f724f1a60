use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

/// Default target when none is configured (the demo service).
pub const DEFAULT_TARGET: &str = "http://127.0.0.1:8000";
/// Default submission endpoint on the target.
pub const DEFAULT_ENDPOINT: &str = "/echo";
/// Default per-round-trip timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Errors constructing a target client from configuration.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The target address could not be parsed into `host:port`.
    #[error("Invalid target address {0:?}: expected [http://]host:port")]
    InvalidAddress(String),
}

/// The raw result of one submission round trip, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    /// The target answered with an HTTP status and body.
    Response { status: u16, body: String },
    /// The round trip failed below the application layer: connection
    /// refused, timeout, or a response the client could not parse.
    Transport(String),
}

/// A `TargetClient` delivers one candidate input to the target per call.
///
/// Exactly one network round trip per `submit`; the call must honor its
/// timeout (a violated timeout surfaces as `RawOutcome::Transport`, never a
/// hang) and must never retry on its own.
pub trait TargetClient: Send + Sync {
    fn submit(&self, payload: &str) -> RawOutcome;
}

/// HTTP/1.1 binding of [`TargetClient`]: `POST <endpoint>` with a JSON body
/// `{"data": <payload>}` over a plain `TcpStream`.
///
/// The connection is per-request (`Connection: close`), so the response is
/// simply everything the target writes before closing the socket.
#[derive(Debug, Clone)]
pub struct HttpTargetClient {
    host: String,
    port: u16,
    endpoint: String,
    timeout: Duration,
}

impl HttpTargetClient {
    /// Builds a client for `target` (accepts `http://host:port` or
    /// `host:port`) posting to `endpoint`.
    pub fn new(target: &str, endpoint: &str, timeout: Duration) -> Result<Self, ClientError> {
        let stripped = target
            .strip_prefix("http://")
            .unwrap_or(target)
            .trim_end_matches('/');
        let (host, port_str) = stripped
            .rsplit_once(':')
            .ok_or_else(|| ClientError::InvalidAddress(target.to_string()))?;
        let port: u16 = port_str
            .parse()
            .map_err(|_| ClientError::InvalidAddress(target.to_string()))?;
        if host.is_empty() {
            return Err(ClientError::InvalidAddress(target.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
            endpoint: endpoint.to_string(),
            timeout,
        })
    }

    fn resolve(&self) -> std::io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("No address resolved for {}:{}", self.host, self.port),
                )
            })
    }

    fn round_trip(&self, payload: &str) -> std::io::Result<(u16, String)> {
        let addr = self.resolve()?;
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let body = serde_json::json!({ "data": payload }).to_string();
        let request = format!(
            "POST {} HTTP/1.1\r\nHost: {}:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.endpoint,
            self.host,
            self.port,
            body.len(),
            body
        );
        stream.write_all(request.as_bytes())?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        parse_response(&raw)
    }
}

impl TargetClient for HttpTargetClient {
    fn submit(&self, payload: &str) -> RawOutcome {
        match self.round_trip(payload) {
            Ok((status, body)) => RawOutcome::Response { status, body },
            Err(e) => RawOutcome::Transport(e.to_string()),
        }
    }
}

/// Parses an HTTP/1.x response into `(status, body)`.
/// Anything that does not look like a status line is an `InvalidData` error,
/// which the caller reports as a transport failure.
fn parse_response(raw: &[u8]) -> std::io::Result<(u16, String)> {
    let text = String::from_utf8_lossy(raw);
    let malformed = |what: &str| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Malformed HTTP response: {what}"),
        )
    };

    let status_line = text.lines().next().ok_or_else(|| malformed("empty"))?;
    if !status_line.starts_with("HTTP/") {
        return Err(malformed("missing status line"));
    }
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| malformed("unparseable status code"))?;

    let body = match text.find("\r\n\r\n") {
        Some(index) => text[index + 4..].to_string(),
        None => String::new(),
    };
    Ok((status, body))
}
