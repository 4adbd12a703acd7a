//! Connection management and response framing.

use crate::error::ClientError;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tectonic_protocol::{
    encode_command, ProtocolError, Response, ResponseHeader, DEFAULT_HOST, DEFAULT_PORT,
    HEADER_SIZE,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default cap on a single body read (8 KiB).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Minimum body read cap (32 bytes).
pub const MIN_READ_CHUNK_SIZE: usize = 32;

/// Maximum body read cap (1 MiB).
pub const MAX_READ_CHUNK_SIZE: usize = 1024 * 1024;

/// Default largest body the client will accept (1 GiB).
pub const DEFAULT_MAX_BODY_SIZE: u64 = 1024 * 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server host name or IP.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Deadline for reading one complete response.
    pub request_timeout: Duration,
    /// Upper bound on the size of each body read.
    pub read_chunk_size: usize,
    /// Largest declared body length accepted before the frame is rejected.
    pub max_body_size: u64,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Default configuration with `TECTONIC_HOST` / `TECTONIC_PORT` overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("TECTONIC_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("TECTONIC_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!("Ignoring invalid TECTONIC_PORT={:?}", port),
            }
        }
        config
    }

    /// Returns `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.clamp(MIN_READ_CHUNK_SIZE, MAX_READ_CHUNK_SIZE);
        self
    }

    pub fn with_max_body_size(mut self, size: u64) -> Self {
        self.max_body_size = size;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

/// A framed connection to a tectonic server.
///
/// Generic over the byte stream so the framing can be driven by anything
/// that reads and writes; `Connection::connect` yields a TCP-backed one.
pub struct Connection<S = TcpStream> {
    stream: S,
    /// Scratch buffer for body reads, `read_chunk_size` long.
    chunk: Vec<u8>,
    max_body_size: u64,
    request_timeout: Duration,
}

impl Connection<TcpStream> {
    /// Opens a TCP connection to the configured endpoint.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let addr = config.addr();
        tracing::debug!("Connecting to {}...", addr);

        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| ClientError::Connect {
            addr: addr.clone(),
            source: std::io::ErrorKind::TimedOut.into(),
        })?
        .map_err(|source| {
            tracing::debug!("Connection failed: {}", source);
            ClientError::Connect {
                addr: addr.clone(),
                source,
            }
        })?;

        // Commands are small and latency-bound.
        stream.set_nodelay(true).ok();

        tracing::debug!("Connected to {}", addr);
        Ok(Self::from_stream(stream, config))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already-open stream.
    pub fn from_stream(stream: S, config: &ConnectionConfig) -> Self {
        let chunk_size = config
            .read_chunk_size
            .clamp(MIN_READ_CHUNK_SIZE, MAX_READ_CHUNK_SIZE);
        Self {
            stream,
            chunk: vec![0u8; chunk_size],
            max_body_size: config.max_body_size,
            request_timeout: config.request_timeout,
        }
    }

    /// Writes `text` followed by a single newline.
    pub async fn send_command(&mut self, text: &str) -> Result<(), ClientError> {
        let frame = encode_command(text);
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        tracing::trace!("Sent {} bytes", frame.len());
        Ok(())
    }

    /// Reads exactly one response: the 9-byte header, then exactly
    /// `body_len` body bytes.
    pub async fn read_response(&mut self) -> Result<Response, ClientError> {
        let mut raw = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            let n = self.stream.read(&mut raw[filled..]).await?;
            if n == 0 {
                tracing::debug!("Connection closed inside header ({} bytes)", filled);
                return Err(ProtocolError::ShortHeader { received: filled }.into());
            }
            filled += n;
            tracing::trace!("Header {}/{} bytes", filled, HEADER_SIZE);
        }

        let header = ResponseHeader::decode(&raw);
        if header.body_len == 0 {
            // A zero-length read is indistinguishable from EOF; never issue one.
            return Ok(Response::new(header.success, Bytes::new()));
        }

        let too_large = || ProtocolError::BodyTooLarge {
            size: header.body_len,
            max: self.max_body_size,
        };
        if header.body_len > self.max_body_size {
            return Err(too_large().into());
        }
        let expected = usize::try_from(header.body_len).map_err(|_| too_large())?;

        let mut body = BytesMut::with_capacity(expected.min(self.chunk.len()));
        while body.len() < expected {
            let want = (expected - body.len()).min(self.chunk.len());
            let n = self.stream.read(&mut self.chunk[..want]).await?;
            if n == 0 {
                tracing::debug!(
                    "Connection closed inside body ({}/{} bytes)",
                    body.len(),
                    expected
                );
                return Err(ProtocolError::ShortBody {
                    expected: header.body_len,
                    received: body.len() as u64,
                }
                .into());
            }
            body.extend_from_slice(&self.chunk[..n]);
            tracing::trace!("Body {}/{} bytes", body.len(), expected);
        }

        Ok(Response::new(header.success, body.freeze()))
    }

    /// Sends one command and reads its response, bounded by the request timeout.
    ///
    /// A timeout abandons a partially read frame, so the connection must not
    /// be used again afterwards.
    pub async fn request(&mut self, text: &str) -> Result<Response, ClientError> {
        self.send_command(text).await?;
        let timeout = self.request_timeout;
        tokio::time::timeout(timeout, self.read_response())
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}
