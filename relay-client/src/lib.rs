//! # relay-client
//!
//! Caller-side library for the ocsrelay authenticated request relay.
//!
//! A caller connects to the relay's Unix socket, sends exactly one
//! serialized [`RequestDescription`], and reads back one response envelope:
//! a self-delimiting optional fault, then the raw response body bytes.
//! When the fault is present the body must be treated as empty, whatever
//! the channel still carries.
//!
//! ```ignore
//! let client = RelayClient::new("/run/ocsrelay.sock");
//! let request = RequestDescription::new(account, "GET", "/ocs/v2.php/...", token);
//! let response = client.perform(&request).await?;
//! match response.fault {
//!     None => { /* stream response.into_body() */ }
//!     Some(fault) => { /* handle it */ }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use relay_types::{wire, RelayFault, RequestDescription, WireError};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UnixStream;

/// Errors a caller can hit before the envelope is readable.
///
/// Relay-side failures are not errors here: they arrive as the envelope's
/// [`RelayFault`] segment.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not connect to the relay socket.
    #[error("connection to relay failed: {0}")]
    Connect(#[source] std::io::Error),

    /// The envelope exchange itself failed.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

/// Handle to a relay daemon reachable over a Unix socket.
#[derive(Debug, Clone)]
pub struct RelayClient {
    socket_path: PathBuf,
}

impl RelayClient {
    /// Create a client for the relay listening at `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Perform one request and return the decoded envelope head.
    pub async fn perform(
        &self,
        request: &RequestDescription,
    ) -> Result<RelayResponse<UnixStream>, ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(ClientError::Connect)?;
        perform_on(stream, request).await
    }
}

/// Perform one request over an already-established channel.
///
/// Generic over the stream so tests can run the full exchange on in-memory
/// duplex pipes instead of a live socket.
pub async fn perform_on<S>(
    mut stream: S,
    request: &RequestDescription,
) -> Result<RelayResponse<S>, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    wire::encode_request(&mut stream, request).await?;
    let fault = wire::decode_fault(&mut stream).await?;
    Ok(RelayResponse { fault, stream })
}

/// One response envelope, with the fault segment already consumed.
#[derive(Debug)]
pub struct RelayResponse<S> {
    /// The leading fault segment; `None` means the relay cycle succeeded.
    pub fault: Option<RelayFault>,
    stream: S,
}

impl<S: AsyncRead + Unpin> RelayResponse<S> {
    /// The raw body stream. Meaningful only when [`fault`](Self::fault) is
    /// `None`.
    pub fn into_body(self) -> S {
        self.stream
    }

    /// Read the entire body into memory.
    ///
    /// On a faulted envelope this returns an empty buffer without touching
    /// the channel: whatever bytes remain are undefined by contract.
    pub async fn read_body(mut self) -> std::io::Result<Vec<u8>> {
        if self.fault.is_some() {
            return Ok(Vec::new());
        }
        let mut body = Vec::new();
        self.stream.read_to_end(&mut body).await?;
        Ok(body)
    }
}
