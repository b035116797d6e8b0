//! Unix-socket front end.
//!
//! Each accepted connection is one relay invocation: the connection itself
//! is the input channel carrying exactly one request envelope, and the
//! response envelope is copied back into it. One spawned worker per caller;
//! a semaphore caps how many relay cycles run at once so a slow upstream
//! cannot starve the accept loop.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::Result;
use crate::relay::Relay;

/// Run the relay server until the listener fails.
///
/// Binds the configured Unix socket (replacing a stale socket file from a
/// previous run) and serves callers forever.
pub async fn run(relay: Arc<Relay>, config: &Config) -> Result<()> {
    let path = &config.server.socket_path;
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let listener = UnixListener::bind(path)?;
    // Local applications of any uid may connect; the gate decides admission.
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o666))?;

    tracing::info!(path = %path.display(), "relay listening");

    let workers = Arc::new(Semaphore::new(config.limits.max_concurrent_requests));

    loop {
        let (stream, _addr) = listener.accept().await?;
        let relay = relay.clone();
        let workers = workers.clone();

        tokio::spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };
            if let Err(e) = handle_caller(relay, stream).await {
                tracing::warn!(error = %e, "caller connection failed");
            }
        });
    }
}

/// Serve one caller connection end to end.
async fn handle_caller(relay: Arc<Relay>, mut stream: UnixStream) -> io::Result<()> {
    let caller_uid = stream.peer_cred()?.uid();
    tracing::debug!(caller_uid, "caller connected");

    let (mut reader, mut writer) = stream.split();
    let mut envelope = relay.perform_request(&mut reader, caller_uid).await?;

    tokio::io::copy(&mut envelope, &mut writer).await?;
    writer.shutdown().await?;
    Ok(())
}
