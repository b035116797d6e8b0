//! Account resolution.
//!
//! The relay never stores account state itself; it resolves a name to an
//! [`AccountContext`] once per request and releases it when the cycle ends.
//! Client caching across requests belongs to an outer layer, not here.

use async_trait::async_trait;
use relay_types::RelayFault;
use std::time::Duration;

use crate::config::AccountConfig;

/// A resolved account: its base endpoint and a bound HTTP client.
///
/// Owned for the duration of a single relay cycle.
#[derive(Debug, Clone)]
pub struct AccountContext {
    /// Account name as configured.
    pub name: String,
    /// Base endpoint, without a trailing slash.
    pub base_url: String,
    /// HTTP client used for this request.
    pub client: reqwest::Client,
    /// Basic-auth credentials, applied by the dispatcher per request.
    pub credentials: Option<(String, String)>,
}

/// Resolves account names to contexts. Owned by the account subsystem; the
/// relay only calls it.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    /// Resolve an account by name.
    ///
    /// Fails with [`RelayFault::AccountNotFound`] when the name is unknown.
    async fn resolve(&self, name: &str) -> Result<AccountContext, RelayFault>;
}

/// Account resolver backed by the `[[accounts]]` config entries.
#[derive(Debug, Default)]
pub struct ConfigAccountResolver {
    accounts: Vec<AccountConfig>,
}

impl ConfigAccountResolver {
    /// Create a resolver over the configured accounts.
    pub fn new(accounts: Vec<AccountConfig>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountResolver for ConfigAccountResolver {
    async fn resolve(&self, name: &str) -> Result<AccountContext, RelayFault> {
        let entry = self
            .accounts
            .iter()
            .find(|a| a.name == name)
            .ok_or(RelayFault::AccountNotFound)?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = entry.timeout_secs {
            // Timeout policy is client configuration; the relay itself
            // enforces none.
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| RelayFault::TransportFailure {
            reason: e.to_string(),
        })?;

        let credentials = match (&entry.username, &entry.app_password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        Ok(AccountContext {
            name: entry.name.clone(),
            base_url: entry.base_url.trim_end_matches('/').to_string(),
            client,
            credentials,
        })
    }
}
