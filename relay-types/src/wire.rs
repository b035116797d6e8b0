//! Framed envelope codec for the relay's IPC channel.
//!
//! Both channel directions carry length-prefixed frames: a 4-byte big-endian
//! length, a kind byte, then a MessagePack body. The length prefix makes the
//! fault segment self-delimiting, so a reader can consume exactly one
//! optional fault and treat every remaining byte as raw response body without
//! relying on any runtime's object-serialization framing.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{RelayFault, RequestDescription, WireError};

/// Maximum envelope frame size. Request descriptions and fault values are
/// small; anything larger is a malformed or hostile frame.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// A serialized [`RequestDescription`] (caller -> relay).
    Request = 1,
    /// A serialized `Option<RelayFault>` (relay -> caller).
    Fault = 2,
}

/// Write one frame: `u32_be(len) ++ u8(kind) ++ body`.
///
/// The length covers the kind byte and the body.
pub async fn write_frame<W>(writer: &mut W, kind: FrameKind, body: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let len = body.len() + 1;
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(&[kind as u8]).await?;
    writer.write_all(body).await?;
    Ok(())
}

/// Read one frame, returning its raw kind byte and body.
pub async fn read_frame<R>(reader: &mut R) -> Result<(u8, Vec<u8>), WireError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len == 0 {
        return Err(WireError::EmptyFrame);
    }
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_SIZE,
        });
    }

    let mut kind = [0u8; 1];
    reader.read_exact(&mut kind).await?;

    let mut body = vec![0u8; len - 1];
    reader.read_exact(&mut body).await?;

    Ok((kind[0], body))
}

fn expect_kind(actual: u8, expected: FrameKind) -> Result<(), WireError> {
    if actual == expected as u8 {
        Ok(())
    } else {
        Err(WireError::UnexpectedKind {
            expected: expected as u8,
            actual,
        })
    }
}

/// Serialize one request description onto the channel.
pub async fn encode_request<W>(
    writer: &mut W,
    request: &RequestDescription,
) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let body = rmp_serde::to_vec(request)?;
    write_frame(writer, FrameKind::Request, &body).await
}

/// Read exactly one request description from the channel.
pub async fn decode_request<R>(reader: &mut R) -> Result<RequestDescription, WireError>
where
    R: AsyncRead + Unpin,
{
    let (kind, body) = read_frame(reader).await?;
    expect_kind(kind, FrameKind::Request)?;
    Ok(rmp_serde::from_slice(&body)?)
}

/// Encode the fault segment (`None` is the explicit "no error" marker) into
/// a standalone byte buffer, ready to be prefixed onto the body stream.
pub fn fault_frame(fault: &Option<RelayFault>) -> Result<Vec<u8>, WireError> {
    let body = rmp_serde::to_vec(fault)?;
    let len = body.len() + 1;
    debug_assert!(len <= MAX_FRAME_SIZE);

    let mut frame = Vec::with_capacity(4 + len);
    frame.extend_from_slice(&(len as u32).to_be_bytes());
    frame.push(FrameKind::Fault as u8);
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Serialize the fault segment onto the channel.
pub async fn encode_fault<W>(writer: &mut W, fault: &Option<RelayFault>) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let body = rmp_serde::to_vec(fault)?;
    write_frame(writer, FrameKind::Fault, &body).await
}

/// Read the fault segment. After this returns, every remaining byte on the
/// channel is raw response body.
pub async fn decode_fault<R>(reader: &mut R) -> Result<Option<RelayFault>, WireError>
where
    R: AsyncRead + Unpin,
{
    let (kind, body) = read_frame(reader).await?;
    expect_kind(kind, FrameKind::Fault)?;
    Ok(rmp_serde::from_slice(&body)?)
}
