// ABOUTME: Persistence contract for the provider's durable state
// ABOUTME: Store trait, shared client preparation, and request validation helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

//! The `Store` contract is the transactional surface of the provider.
//!
//! `consume_auth_code`, `rotate_refresh_token`, and `revoke_refresh_token`
//! are linearizable: two concurrent attempts on the same code or token must
//! see one success and one failure. All other reads tolerate point-in-time
//! snapshots.

mod kv;
mod memory;

pub use kv::{KeyValue, KvStore, MemoryKv};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::constants::{
    AUTH_METHOD_CLIENT_SECRET_POST, AUTH_METHOD_NONE, CLIENT_ID_PREFIX, CLIENT_STATUS_ACTIVE,
    GRANT_TYPE_AUTHORIZATION_CODE, GRANT_TYPE_REFRESH_TOKEN,
};
use crate::crypto::{constant_time_eq, normalize_scopes, random_url_safe, sha256_hex};
use crate::errors::StoreError;
use crate::models::{AuthCodeRecord, Client, ConsentRecord, RefreshTokenRecord};

/// Durable state for clients, authorization codes, refresh tokens, and
/// consent. See the module docs for the concurrency contract.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a client from a template. Fills a missing id with
    /// `cl_<random>`, generates a secret when none is supplied, and stores
    /// only the secret's SHA-256 hex. Returns the stored client and the raw
    /// secret (the one and only time it is available).
    async fn create_client(
        &self,
        template: Client,
        raw_secret: &str,
    ) -> Result<(Client, String), StoreError>;

    async fn get_client(&self, id: &str) -> Result<Client, StoreError>;

    /// All clients, sorted by `created_at` ascending.
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError>;

    /// Merge non-empty fields into the stored client; `first_party` is
    /// always overwritten.
    async fn update_client(&self, client: Client) -> Result<Client, StoreError>;

    async fn delete_client(&self, id: &str) -> Result<(), StoreError>;

    /// Authenticate a client for the token/revoke endpoints. The secret is
    /// ignored when the client's auth method is `none`; otherwise the stored
    /// hash is compared to `sha256_hex(raw_secret)` in constant time.
    async fn validate_client_secret(
        &self,
        client_id: &str,
        raw_secret: &str,
    ) -> Result<Client, StoreError>;

    /// Upsert by `code_hash`.
    async fn save_auth_code(&self, record: AuthCodeRecord) -> Result<(), StoreError>;

    /// One-shot consumption: marks the record consumed and returns it, or
    /// fails with `AuthCodeNotFound` / `AuthCodeConsumed` / `AuthCodeExpired`.
    /// Serialized per code hash; PKCE correctness depends on it.
    async fn consume_auth_code(
        &self,
        raw_code: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthCodeRecord, StoreError>;

    async fn save_refresh_token(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;

    async fn get_refresh_token(
        &self,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, StoreError>;

    /// Idempotent: missing or already-revoked tokens are not an error.
    async fn revoke_refresh_token(&self, raw_token: &str, now: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Atomically revoke the old token and insert its successor. An
    /// already-revoked old token signals `RefreshTokenReplay` and the
    /// successor is NOT inserted: the chain is treated as compromised.
    async fn rotate_refresh_token(
        &self,
        old_raw_token: &str,
        new_record: RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Upsert by `(client_id, user_id)`. `granted_at` is set once on first
    /// save; `updated_at` always refreshes; scope is normalized.
    async fn save_consent(&self, record: ConsentRecord) -> Result<(), StoreError>;

    async fn get_consent(&self, client_id: &str, user_id: &str)
        -> Result<ConsentRecord, StoreError>;
}

/// Exact-match membership check over the client's redirect allow-list,
/// each candidate compared in constant time.
pub fn validate_redirect_uri(client: &Client, uri: &str) -> Result<(), StoreError> {
    for allowed in &client.redirect_uris {
        if constant_time_eq(allowed, uri) {
            return Ok(());
        }
    }
    Err(StoreError::InvalidRedirectUri)
}

/// Requested scope must be a subset of the client's allowed scopes. An empty
/// request is always valid.
pub fn validate_scopes(client: &Client, requested: &[String]) -> Result<(), StoreError> {
    if requested.is_empty() {
        return Ok(());
    }
    let allowed: std::collections::HashSet<&str> =
        client.scopes.iter().map(String::as_str).collect();
    for scope in requested {
        if !allowed.contains(scope.as_str()) {
            return Err(StoreError::InvalidScope);
        }
    }
    Ok(())
}

/// A client is active iff its status is `active` (trimmed, case-insensitive).
#[must_use]
pub fn is_client_active(client: &Client) -> bool {
    client.status.trim().eq_ignore_ascii_case(CLIENT_STATUS_ACTIVE)
}

/// Whether the client is registered for the given grant type.
#[must_use]
pub fn client_allows_grant_type(client: &Client, grant_type: &str) -> bool {
    let target = grant_type.trim();
    if target.is_empty() {
        return false;
    }
    client
        .grant_types
        .iter()
        .any(|value| constant_time_eq(value.trim(), target))
}

/// Storage key for a consent record.
#[must_use]
pub fn consent_key(client_id: &str, user_id: &str) -> String {
    format!("{client_id}::{user_id}")
}

/// Generate a fresh `cl_`-prefixed client identifier.
pub(crate) fn generate_client_id() -> Result<String, StoreError> {
    let random = random_url_safe(24).map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok(format!("{CLIENT_ID_PREFIX}{random}"))
}

/// Fill in everything about a new client except its identifier: secret
/// hashing, list normalization, grant/auth-method/status defaults, and
/// timestamps. Returns the raw secret for the one-time response.
pub(crate) fn finalize_new_client(
    client: &mut Client,
    raw_secret: &str,
    now: DateTime<Utc>,
) -> Result<String, StoreError> {
    let raw_secret = if raw_secret.is_empty() {
        random_url_safe(32).map_err(|e| StoreError::Backend(e.to_string()))?
    } else {
        raw_secret.to_owned()
    };
    client.secret_hash = sha256_hex(&raw_secret);
    client.scopes = normalize_scopes(&client.scopes);
    client.redirect_uris = normalize_scopes(&client.redirect_uris);
    client.grant_types = normalize_scopes(&client.grant_types);
    if client.grant_types.is_empty() {
        client.grant_types = vec![
            GRANT_TYPE_AUTHORIZATION_CODE.to_owned(),
            GRANT_TYPE_REFRESH_TOKEN.to_owned(),
        ];
    }
    if client.token_endpoint_auth_method.is_empty() {
        client.token_endpoint_auth_method = AUTH_METHOD_CLIENT_SECRET_POST.to_owned();
    }
    if client.status.is_empty() {
        client.status = CLIENT_STATUS_ACTIVE.to_owned();
    }
    client.created_at = now;
    client.updated_at = now;
    Ok(raw_secret)
}

/// Merge non-empty update fields into `current`; `first_party` always wins.
pub(crate) fn merge_client_update(current: &mut Client, update: Client, now: DateTime<Utc>) {
    if !update.name.is_empty() {
        current.name = update.name;
    }
    if !update.redirect_uris.is_empty() {
        current.redirect_uris = normalize_scopes(&update.redirect_uris);
    }
    if !update.scopes.is_empty() {
        current.scopes = normalize_scopes(&update.scopes);
    }
    if !update.grant_types.is_empty() {
        current.grant_types = normalize_scopes(&update.grant_types);
    }
    if !update.token_endpoint_auth_method.is_empty() {
        current.token_endpoint_auth_method = update.token_endpoint_auth_method;
    }
    if !update.status.is_empty() {
        current.status = update.status;
    }
    current.first_party = update.first_party;
    current.updated_at = now;
}

/// Shared secret check used by both backends once the client is loaded.
pub(crate) fn check_client_secret(client: &Client, raw_secret: &str) -> Result<(), StoreError> {
    if !is_client_active(client) {
        return Err(StoreError::ClientInactive);
    }
    if client.token_endpoint_auth_method == AUTH_METHOD_NONE {
        return Ok(());
    }
    if raw_secret.is_empty() {
        return Err(StoreError::InvalidClientSecret);
    }
    if !constant_time_eq(&client.secret_hash, &sha256_hex(raw_secret)) {
        return Err(StoreError::InvalidClientSecret);
    }
    Ok(())
}
