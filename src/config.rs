// ABOUTME: Provider configuration with host-driven reload support
// ABOUTME: TTLs, issuer and base-path normalization, JSON payload merging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use chrono::Duration;
use serde::Deserialize;

use crate::constants::{DEFAULT_BASE_PATH, DEFAULT_ISSUER, DEFAULT_SCOPES};
use crate::errors::ConfigError;

/// Provider configuration. Construct with [`Config::default`] and override
/// fields, or merge a host-supplied JSON payload with [`Config::apply_payload`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Token issuer URL. Trailing slash is trimmed; falls back to the host
    /// site URL, then `http://localhost:8080`.
    pub issuer: String,
    /// Mount point of the HTTP surface. Leading slash enforced, trailing
    /// trimmed, empty defaulted.
    pub base_path: String,
    pub access_token_ttl: Duration,
    pub id_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub authorization_code_ttl: Duration,
    /// Optional PKCS#1 or PKCS#8 RSA private key. A fresh RSA-2048 key is
    /// generated when absent.
    pub private_key_pem: Option<String>,
    pub default_scopes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            base_path: DEFAULT_BASE_PATH.to_owned(),
            access_token_ttl: Duration::minutes(10),
            id_token_ttl: Duration::minutes(10),
            refresh_token_ttl: Duration::days(30),
            authorization_code_ttl: Duration::minutes(5),
            private_key_pem: None,
            default_scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl Config {
    /// Return a copy with every field coerced into its valid range.
    #[must_use]
    pub fn normalize(&self) -> Self {
        let defaults = Self::default();
        let mut out = self.clone();

        out.issuer = out.issuer.trim().trim_end_matches('/').to_owned();

        let mut base = out.base_path.trim().to_owned();
        if !base.is_empty() && !base.starts_with('/') {
            base.insert(0, '/');
        }
        base = base.trim_end_matches('/').to_owned();
        if base.is_empty() {
            base = DEFAULT_BASE_PATH.to_owned();
        }
        out.base_path = base;

        if out.access_token_ttl <= Duration::zero() {
            out.access_token_ttl = defaults.access_token_ttl;
        }
        if out.id_token_ttl <= Duration::zero() {
            out.id_token_ttl = defaults.id_token_ttl;
        }
        if out.refresh_token_ttl <= Duration::zero() {
            out.refresh_token_ttl = defaults.refresh_token_ttl;
        }
        if out.authorization_code_ttl <= Duration::zero() {
            out.authorization_code_ttl = defaults.authorization_code_ttl;
        }
        if out.default_scopes.is_empty() {
            out.default_scopes = defaults.default_scopes;
        }
        out
    }

    /// Normalize and fill the issuer from the host site URL, then the
    /// localhost default.
    #[must_use]
    pub fn with_fallback_issuer(&self, site_url: &str) -> Self {
        let mut out = self.normalize();
        if out.issuer.is_empty() {
            out.issuer = site_url.trim().trim_end_matches('/').to_owned();
        }
        if out.issuer.is_empty() {
            out.issuer = DEFAULT_ISSUER.to_owned();
        }
        out
    }

    /// Merge a host-supplied JSON payload over this configuration.
    ///
    /// Empty strings and non-positive TTLs leave the current value in place.
    /// `private_key_pem` is taken verbatim (an empty payload field clears it,
    /// switching the provider back to a generated key on rebuild).
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidPayload`] if the bytes are not valid JSON.
    pub fn apply_payload(&self, data: &[u8]) -> Result<Self, ConfigError> {
        if data.is_empty() {
            return Ok(self.normalize());
        }
        let payload: ConfigPayload = serde_json::from_slice(data)
            .map_err(|e| ConfigError::InvalidPayload(e.to_string()))?;

        let mut next = self.clone();
        if !payload.issuer.trim().is_empty() {
            next.issuer = payload.issuer;
        }
        if !payload.base_path.trim().is_empty() {
            next.base_path = payload.base_path;
        }
        if payload.access_token_ttl_seconds > 0 {
            next.access_token_ttl = Duration::seconds(payload.access_token_ttl_seconds);
        }
        if payload.id_token_ttl_seconds > 0 {
            next.id_token_ttl = Duration::seconds(payload.id_token_ttl_seconds);
        }
        if payload.refresh_token_ttl_seconds > 0 {
            next.refresh_token_ttl = Duration::seconds(payload.refresh_token_ttl_seconds);
        }
        if payload.authorization_code_ttl_seconds > 0 {
            next.authorization_code_ttl = Duration::seconds(payload.authorization_code_ttl_seconds);
        }
        next.private_key_pem = if payload.private_key_pem.trim().is_empty() {
            None
        } else {
            Some(payload.private_key_pem)
        };
        if !payload.default_scopes.trim().is_empty() {
            next.default_scopes = payload
                .default_scopes
                .split_whitespace()
                .map(str::to_owned)
                .collect();
        }
        Ok(next.normalize())
    }
}

/// Wire form of the host configuration payload.
#[derive(Debug, Default, Deserialize)]
struct ConfigPayload {
    #[serde(default)]
    issuer: String,
    #[serde(default)]
    base_path: String,
    #[serde(default)]
    access_token_ttl_seconds: i64,
    #[serde(default)]
    id_token_ttl_seconds: i64,
    #[serde(default)]
    refresh_token_ttl_seconds: i64,
    #[serde(default)]
    authorization_code_ttl_seconds: i64,
    #[serde(default)]
    private_key_pem: String,
    /// Space-joined scope list.
    #[serde(default)]
    default_scopes: String,
}
