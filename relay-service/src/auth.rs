//! Capability-based authorization for calling applications.
//!
//! Authorization is per application, not per user: a caller is admitted iff
//! its package identifier is allow-listed and its token matches the one
//! stored during pairing. The gate runs before any network activity.

use dashmap::DashMap;
use relay_types::{RelayFault, RequestDescription};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AuthConfig;

/// Maps an OS-level caller identity (the numeric uid of the IPC peer) to an
/// application package identifier.
///
/// Injected so the gate is testable without a real IPC runtime.
pub trait CallerIdentityResolver: Send + Sync {
    /// Resolve a caller uid to a package identifier, if known.
    fn package_for_uid(&self, uid: u32) -> Option<String>;
}

/// Caller identity resolver backed by a fixed uid -> package table.
#[derive(Debug, Default)]
pub struct StaticCallerMap {
    packages: HashMap<u32, String>,
}

impl StaticCallerMap {
    /// Create a resolver from a uid -> package table.
    pub fn new(packages: HashMap<u32, String>) -> Self {
        Self { packages }
    }

    /// Build the resolver from the `[auth.callers]` config section.
    /// Entries whose key is not a numeric uid are skipped.
    pub fn from_config(config: &AuthConfig) -> Self {
        let packages = config
            .callers
            .iter()
            .filter_map(|(uid, package)| match uid.parse::<u32>() {
                Ok(uid) => Some((uid, package.clone())),
                Err(_) => {
                    tracing::warn!(key = %uid, "ignoring non-numeric caller uid in config");
                    None
                }
            })
            .collect();
        Self { packages }
    }
}

impl CallerIdentityResolver for StaticCallerMap {
    fn package_for_uid(&self, uid: u32) -> Option<String> {
        self.packages.get(&uid).cloned()
    }
}

/// Process-wide package -> token mapping.
///
/// Read concurrently by the gate; written only by the out-of-band pairing
/// flow via [`TokenStore::register`].
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: DashMap<String, String>,
}

impl TokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the store from the `[auth.tokens]` config section.
    pub fn from_config(config: &AuthConfig) -> Self {
        let store = Self::new();
        for (package, token) in &config.tokens {
            store.register(package.clone(), token.clone());
        }
        store
    }

    /// Record the token paired with an application. Pairing-flow surface.
    pub fn register(&self, package: String, token: String) {
        self.tokens.insert(package, token);
    }

    /// Stored token for a package; absent entries yield an empty string.
    pub fn token_for(&self, package: &str) -> String {
        self.tokens
            .get(package)
            .map(|t| t.value().clone())
            .unwrap_or_default()
    }
}

/// The authorization gate.
pub struct AuthGate {
    allow_list: Vec<String>,
    tokens: Arc<TokenStore>,
    resolver: Arc<dyn CallerIdentityResolver>,
}

impl AuthGate {
    /// Create a gate from an allow-list, a token store, and a caller
    /// identity resolver.
    pub fn new(
        allow_list: Vec<String>,
        tokens: Arc<TokenStore>,
        resolver: Arc<dyn CallerIdentityResolver>,
    ) -> Self {
        Self {
            allow_list,
            tokens,
            resolver,
        }
    }

    /// Build the gate from the `[auth]` config section.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.allowed_packages.clone(),
            Arc::new(TokenStore::from_config(config)),
            Arc::new(StaticCallerMap::from_config(config)),
        )
    }

    /// Shared handle to the token store, for the pairing flow.
    pub fn token_store(&self) -> Arc<TokenStore> {
        self.tokens.clone()
    }

    /// Authorize one request.
    ///
    /// Fills in `request.package_name` from the caller identity when the
    /// caller left it unset. Denial is always the bare
    /// [`RelayFault::Unauthorized`]; which check failed is logged at debug
    /// level only, never sent back.
    ///
    /// Empty tokens never authorize: an application whose pairing never
    /// completed has no stored token, and that absence must not match an
    /// empty request token.
    pub fn authorize(
        &self,
        request: &mut RequestDescription,
        caller_uid: u32,
    ) -> Result<(), RelayFault> {
        if request.package_name.is_none() {
            request.package_name = self.resolver.package_for_uid(caller_uid);
        }

        let Some(package) = request.package_name.as_deref() else {
            tracing::debug!(caller_uid, "denied: caller identity unresolvable");
            return Err(RelayFault::Unauthorized);
        };

        if !self.allow_list.iter().any(|p| p == package) {
            tracing::debug!(package, "denied: package not allow-listed");
            return Err(RelayFault::Unauthorized);
        }

        let stored = self.tokens.token_for(package);
        if stored.is_empty() || request.token.is_empty() {
            tracing::debug!(package, "denied: missing or empty token");
            return Err(RelayFault::Unauthorized);
        }

        if request.token != stored {
            tracing::debug!(package, "denied: token mismatch");
            return Err(RelayFault::Unauthorized);
        }

        Ok(())
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("allow_list", &self.allow_list)
            .finish_non_exhaustive()
    }
}
