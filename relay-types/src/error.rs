//! Codec-level errors for the envelope wire format.

use thiserror::Error;

use crate::RelayFault;

/// Errors produced while reading or writing envelope frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying channel I/O failed.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame length exceeds the protocol maximum.
    #[error("frame too large: {size} > {limit}")]
    FrameTooLarge {
        /// Declared frame length.
        size: usize,
        /// Protocol maximum.
        limit: usize,
    },

    /// Frame declared a zero length (a frame always carries a kind byte).
    #[error("empty frame")]
    EmptyFrame,

    /// The frame's declared type is not the one the reader expected.
    #[error("unexpected frame kind: expected {expected}, got {actual}")]
    UnexpectedKind {
        /// Kind byte the reader expected.
        expected: u8,
        /// Kind byte actually present.
        actual: u8,
    },

    /// MessagePack encoding failed.
    #[error("encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("decoding failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl WireError {
    /// Map a codec error onto the fault that travels back to the caller.
    ///
    /// A wrong declared type becomes [`RelayFault::UnknownType`]; everything
    /// else collapses into [`RelayFault::MalformedEnvelope`].
    pub fn into_fault(self) -> RelayFault {
        match self {
            WireError::UnexpectedKind { .. } => RelayFault::UnknownType,
            _ => RelayFault::MalformedEnvelope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_kind_maps_to_unknown_type() {
        let err = WireError::UnexpectedKind {
            expected: 1,
            actual: 9,
        };
        assert_eq!(err.into_fault(), RelayFault::UnknownType);
    }

    #[test]
    fn io_error_maps_to_malformed_envelope() {
        let err = WireError::Io(std::io::Error::other("broken pipe"));
        assert_eq!(err.into_fault(), RelayFault::MalformedEnvelope);
    }
}
