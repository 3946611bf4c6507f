// ABOUTME: Domain error types for the provider core
// ABOUTME: Store, key, token, and reload errors plus the OAuth wire envelope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by [`crate::store::Store`] implementations.
///
/// The protocol-state variants (`AuthCodeConsumed`, `RefreshTokenReplay`, ...)
/// are load-bearing: the token endpoint maps them to specific OAuth error
/// codes, and replay detection aborts the refresh-token chain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("client not found")]
    ClientNotFound,
    #[error("client already exists")]
    ClientExists,
    #[error("client is inactive")]
    ClientInactive,
    #[error("invalid client secret")]
    InvalidClientSecret,
    #[error("consent not found")]
    ConsentNotFound,
    #[error("authorization code not found")]
    AuthCodeNotFound,
    #[error("authorization code expired")]
    AuthCodeExpired,
    #[error("authorization code already consumed")]
    AuthCodeConsumed,
    #[error("refresh token not found")]
    RefreshTokenNotFound,
    #[error("refresh token expired")]
    RefreshTokenExpired,
    #[error("refresh token revoked")]
    RefreshTokenRevoked,
    #[error("refresh token replay detected")]
    RefreshTokenReplay,
    #[error("invalid redirect uri")]
    InvalidRedirectUri,
    #[error("invalid scope")]
    InvalidScope,
    /// Backend I/O failure. Maps to `server_error` at the endpoints.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Error from a host key-value backend.
#[derive(Debug, Error)]
#[error("key-value backend error: {0}")]
pub struct KvError(String);

impl KvError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<KvError> for StoreError {
    fn from(err: KvError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Errors from the signing-key lifecycle.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The supplied PEM blob is not a PKCS#1 or PKCS#8 RSA private key.
    #[error("private key is invalid")]
    InvalidPrivateKey,
    #[error("key generation failed: {0}")]
    Generation(String),
    #[error("key encoding failed: {0}")]
    Encoding(String),
}

/// Errors from token issuance and validation.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Any validation deviation: bad signature, wrong algorithm, wrong
    /// issuer, wrong `use` claim, or expiry. Deliberately undifferentiated
    /// so the wire response leaks nothing about which check failed.
    #[error("invalid token")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Errors from a configuration reload.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration payload: {0}")]
    InvalidPayload(String),
    /// The reload is rejected and the prior configuration remains in force.
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// OAuth/OIDC error envelope returned by every protocol endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// Tag of the originating endpoint, for log correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl OAuthError {
    #[must_use]
    pub fn new(error: &str, description: &str, trace_id: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: Some(description.to_owned()),
            trace_id: Some(trace_id.to_owned()),
        }
    }
}
