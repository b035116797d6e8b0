//! Relay orchestration.
//!
//! One relay cycle per caller: decode the request, resolve the account,
//! authorize, dispatch, then hand the caller a pipe carrying the fault
//! segment followed by the body stream. The first failure short-circuits
//! straight to encoding: faults are data, not IPC errors.

use relay_types::{wire, RelayFault, WireError};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::unix::pipe;

use crate::accounts::{AccountResolver, ConfigAccountResolver};
use crate::auth::AuthGate;
use crate::bridge;
use crate::config::Config;
use crate::dispatch::{self, ResponseBody};

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Thread-safe via `AtomicU64`; no locks needed for incrementing.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total relay cycles started.
    pub requests_total: AtomicU64,
    /// Total envelopes fully transmitted to their caller.
    pub completed_total: AtomicU64,
    /// Total cycles that produced a fault segment.
    pub faults_total: AtomicU64,
    /// Total authorization denials (a subset of `faults_total`).
    pub denied_total: AtomicU64,
    /// Total envelope bytes transmitted (fault segment + body).
    pub bytes_relayed: AtomicU64,
}

/// The relay service: authorization gate, account resolution, and the
/// per-request orchestration that ties them to the HTTP dispatcher.
pub struct Relay {
    gate: AuthGate,
    accounts: Arc<dyn AccountResolver>,
    metrics: Arc<RelayMetrics>,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("gate", &self.gate)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Create a relay from its collaborators.
    pub fn new(gate: AuthGate, accounts: Arc<dyn AccountResolver>) -> Self {
        Self {
            gate,
            accounts,
            metrics: Arc::new(RelayMetrics::default()),
        }
    }

    /// Build the relay from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            AuthGate::from_config(&config.auth),
            Arc::new(ConfigAccountResolver::new(config.accounts.clone())),
        )
    }

    /// The authorization gate, exposed for the pairing flow's token writes.
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// Operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Perform one relay cycle.
    ///
    /// Reads exactly one request envelope from `input` and returns the read
    /// end of a pipe carrying the response envelope: one fault frame
    /// (`None` on success) followed by the raw body bytes, empty on failure.
    /// Every failure between decode and dispatch is captured into the fault
    /// frame; the only errors this function itself returns are local pipe
    /// setup failures, which never carry request semantics.
    pub async fn perform_request<R>(&self, input: &mut R, caller_uid: u32) -> io::Result<pipe::Receiver>
    where
        R: AsyncRead + Send + Unpin,
    {
        self.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

        let outcome = self.process(input, caller_uid).await;

        let fault = match &outcome {
            Ok(_) => None,
            Err(fault) => {
                tracing::debug!(%fault, "relay cycle failed");
                self.metrics.faults_total.fetch_add(1, Ordering::Relaxed);
                if matches!(fault, RelayFault::Unauthorized) {
                    self.metrics.denied_total.fetch_add(1, Ordering::Relaxed);
                }
                Some(fault.clone())
            }
        };

        // The envelope is fully assembled before the bridge opens, so no
        // partial fault segment is ever exposed to the reader.
        let prefix = wire::fault_frame(&fault).map_err(io::Error::other)?;
        let source: Pin<Box<dyn AsyncRead + Send>> = match outcome {
            Ok(body) => Box::pin(std::io::Cursor::new(prefix).chain(body)),
            Err(_) => Box::pin(std::io::Cursor::new(prefix)),
        };

        let metrics = self.metrics.clone();
        bridge::open_channel(source, move |bytes| {
            metrics.completed_total.fetch_add(1, Ordering::Relaxed);
            metrics.bytes_relayed.fetch_add(bytes, Ordering::Relaxed);
        })
    }

    /// Decode -> resolve account -> authorize -> dispatch.
    async fn process<R>(
        &self,
        input: &mut R,
        caller_uid: u32,
    ) -> Result<ResponseBody, RelayFault>
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut request = wire::decode_request(input)
            .await
            .map_err(WireError::into_fault)?;

        // Account context is scoped to this one cycle; it drops on every
        // exit path below.
        let account = self.accounts.resolve(&request.account).await?;
        self.gate.authorize(&mut request, caller_uid)?;
        dispatch::dispatch(&mut request, &account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountConfig, AuthConfig, Config};
    use axum::routing::get;
    use axum::Router;
    use relay_types::RequestDescription;
    use std::collections::HashMap;

    async fn spawn_upstream(body: &'static str) -> String {
        let app = Router::new().route("/ok", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base_url
    }

    fn test_config(base_url: &str) -> Config {
        Config {
            auth: AuthConfig {
                allowed_packages: vec!["com.example.app".to_string()],
                tokens: HashMap::from([("com.example.app".to_string(), "T1".to_string())]),
                callers: HashMap::new(),
            },
            accounts: vec![AccountConfig {
                name: "user@upstream".to_string(),
                base_url: base_url.to_string(),
                username: None,
                app_password: None,
                timeout_secs: None,
            }],
            ..Config::default()
        }
    }

    async fn relay_roundtrip(
        relay: &Relay,
        request: &RequestDescription,
    ) -> (Option<RelayFault>, Vec<u8>) {
        let mut input = Vec::new();
        wire::encode_request(&mut input, request).await.unwrap();

        let mut output = relay
            .perform_request(&mut std::io::Cursor::new(input), 0)
            .await
            .unwrap();

        let fault = wire::decode_fault(&mut output).await.unwrap();
        let mut body = Vec::new();
        output.read_to_end(&mut body).await.unwrap();
        (fault, body)
    }

    fn authorized_request() -> RequestDescription {
        RequestDescription::new("user@upstream", "GET", "/ok", "T1")
            .with_package("com.example.app")
    }

    #[tokio::test]
    async fn successful_cycle_has_no_fault_and_streams_body() {
        let base_url = spawn_upstream("upstream payload").await;
        let relay = Relay::from_config(&test_config(&base_url));

        let (fault, body) = relay_roundtrip(&relay, &authorized_request()).await;
        assert_eq!(fault, None);
        assert_eq!(body, b"upstream payload");
        assert_eq!(relay.metrics().faults_total.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn wrong_token_yields_unauthorized_with_empty_body() {
        let base_url = spawn_upstream("never seen").await;
        let relay = Relay::from_config(&test_config(&base_url));

        let mut request = authorized_request();
        request.token = "WRONG".to_string();

        let (fault, body) = relay_roundtrip(&relay, &request).await;
        assert_eq!(fault, Some(RelayFault::Unauthorized));
        assert!(body.is_empty());
        assert_eq!(relay.metrics().denied_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn unknown_account_yields_account_not_found() {
        let base_url = spawn_upstream("x").await;
        let relay = Relay::from_config(&test_config(&base_url));

        let mut request = authorized_request();
        request.account = "nobody@nowhere".to_string();

        let (fault, body) = relay_roundtrip(&relay, &request).await;
        assert_eq!(fault, Some(RelayFault::AccountNotFound));
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn garbage_input_yields_malformed_envelope() {
        let base_url = spawn_upstream("x").await;
        let relay = Relay::from_config(&test_config(&base_url));

        // A plausible length prefix followed by garbage.
        let mut input = std::io::Cursor::new(vec![0, 0, 0, 3, 9, 0xff, 0xff]);
        let mut output = relay.perform_request(&mut input, 0).await.unwrap();

        let fault = wire::decode_fault(&mut output).await.unwrap();
        // Kind byte 9 is not a request frame.
        assert_eq!(fault, Some(RelayFault::UnknownType));

        let mut body = Vec::new();
        output.read_to_end(&mut body).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn truncated_input_yields_malformed_envelope() {
        let base_url = spawn_upstream("x").await;
        let relay = Relay::from_config(&test_config(&base_url));

        let mut input = std::io::Cursor::new(vec![0, 0]);
        let mut output = relay.perform_request(&mut input, 0).await.unwrap();

        let fault = wire::decode_fault(&mut output).await.unwrap();
        assert_eq!(fault, Some(RelayFault::MalformedEnvelope));
    }

    #[tokio::test]
    async fn metrics_count_transmitted_envelopes() {
        let base_url = spawn_upstream("12345").await;
        let relay = Relay::from_config(&test_config(&base_url));

        let (_, body) = relay_roundtrip(&relay, &authorized_request()).await;
        assert_eq!(body.len(), 5);

        tokio::task::yield_now().await;
        assert_eq!(relay.metrics().requests_total.load(Ordering::Relaxed), 1);
        assert_eq!(relay.metrics().completed_total.load(Ordering::Relaxed), 1);
        // Fault frame plus the five body bytes.
        assert!(relay.metrics().bytes_relayed.load(Ordering::Relaxed) > 5);
    }
}
