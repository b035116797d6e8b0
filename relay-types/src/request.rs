//! The request description callers hand to the relay.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One HTTP operation an external application asks the relay to perform.
///
/// Constructed by the caller and consumed by exactly one relay cycle.
/// The relay mutates it in two places only: the authorization gate fills in
/// `package_name` from the caller's OS identity when absent, and the
/// dispatcher rewrites `url` from a relative path to the absolute form bound
/// to the account's base endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescription {
    /// Name of the target account, resolved by the relay.
    pub account: String,
    /// Relative URL path; must start with `/`.
    pub url: String,
    /// HTTP method as sent by the caller. Validated at dispatch so that
    /// unsupported verbs stay representable on the wire.
    pub method: String,
    /// Optional text request body (POST/PUT only).
    #[serde(default)]
    pub body: Option<String>,
    /// Query parameters, order irrelevant.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Calling application's package identifier. `None` means "resolve it
    /// from the OS caller identity".
    #[serde(default)]
    pub package_name: Option<String>,
    /// Per-application shared secret proving prior pairing.
    pub token: String,
}

impl RequestDescription {
    /// Create a request with no body, parameters, or explicit package name.
    pub fn new(
        account: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            url: url.into(),
            method: method.into(),
            body: None,
            parameters: HashMap::new(),
            package_name: None,
            token: token.into(),
        }
    }

    /// Attach a text request body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a single query parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Set the package identifier explicitly instead of letting the relay
    /// resolve it from the caller's OS identity.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package_name = Some(package.into());
        self
    }
}
