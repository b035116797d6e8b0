//! Channel bridge.
//!
//! Converts a one-shot response stream into a pipe readable by the caller:
//! one anonymous OS pipe per relay cycle, with a background task copying the
//! assembled envelope into the write end. The read end is returned
//! immediately so transmission overlaps with whatever the caller does next.

use std::io;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::unix::pipe;

/// Open a relay channel fed from `source`.
///
/// Spawns exactly one copy task that drains `source` into the pipe's write
/// end until EOF, then flushes and drops it. The write end is released on
/// every exit path, including copy failure, so the reader always observes
/// EOF; leaking it would wedge the caller forever. Copy failures are logged,
/// never propagated; the caller sees a truncated stream.
///
/// `on_complete` runs after a fully successful drain with the number of
/// bytes transmitted.
pub fn open_channel<S, F>(source: S, on_complete: F) -> io::Result<pipe::Receiver>
where
    S: AsyncRead + Send + Unpin + 'static,
    F: FnOnce(u64) + Send + 'static,
{
    let (sender, receiver) = pipe::pipe()?;
    tokio::spawn(transmit(source, sender, on_complete));
    Ok(receiver)
}

async fn transmit<S, F>(mut source: S, mut sender: pipe::Sender, on_complete: F)
where
    S: AsyncRead + Unpin,
    F: FnOnce(u64),
{
    match tokio::io::copy(&mut source, &mut sender).await {
        Ok(bytes) => {
            if let Err(e) = sender.shutdown().await {
                tracing::debug!(error = %e, "relay channel close failed");
            }
            tracing::debug!(bytes, "done sending result");
            on_complete(bytes);
        }
        Err(e) => {
            tracing::warn!(error = %e, "relay channel transmission failed");
        }
    }
    // sender drops here on every path, closing the write end
}
