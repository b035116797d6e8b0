//! Structured errors delivered inside the response envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A relay failure that travels to the caller inside the response envelope.
///
/// The IPC boundary has no exception-propagation contract, so every failure
/// between decode and dispatch is captured into one of these and serialized
/// as the leading envelope segment. When the fault segment is non-`None`,
/// the body segment must be treated as empty regardless of its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayFault {
    /// The input channel did not contain exactly one well-formed envelope.
    #[error("malformed request envelope")]
    MalformedEnvelope,

    /// The envelope's declared type was not the expected one.
    #[error("unexpected envelope type")]
    UnknownType,

    /// The named account could not be resolved.
    #[error("account not found")]
    AccountNotFound,

    /// The caller is not allow-listed or presented a wrong token.
    /// Deliberately carries no detail about which check failed.
    #[error("caller not authorized")]
    Unauthorized,

    /// The relative URL path does not start with `/`.
    #[error("relative URL must start with '/'")]
    InvalidUrl,

    /// The HTTP method is not one of GET/POST/PUT/DELETE.
    #[error("unsupported HTTP method")]
    UnsupportedMethod,

    /// The upstream server answered with a non-200 status.
    #[error("upstream request returned status {status}")]
    UpstreamError {
        /// HTTP status code returned by the upstream server.
        status: u16,
    },

    /// Transport-level I/O failure while talking to the upstream server.
    /// Channel-copy failures are logged only and never reach the caller.
    #[error("transport failure: {reason}")]
    TransportFailure {
        /// Human-readable failure description.
        reason: String,
    },
}
