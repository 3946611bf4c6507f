// ABOUTME: Persistent records and wire types for the provider core
// ABOUTME: Clients, authorization codes, refresh tokens, consent, profiles, token responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered relying-party client.
///
/// The plaintext secret exists only transiently at creation and is returned
/// once; afterwards only `secret_hash` (SHA-256 hex) persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    /// SHA-256 hex of the client secret. Persisted, never exposed over the
    /// admin API (see [`ClientSummary`]).
    #[serde(default)]
    pub secret_hash: String,
    /// Exact-match redirect allow-list.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    /// `client_secret_post` or `none`.
    #[serde(default)]
    pub token_endpoint_auth_method: String,
    /// First-party clients skip the consent prompt.
    #[serde(default)]
    pub first_party: bool,
    /// `active`, anything else is treated as inactive.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

/// Sanitized client view for admin API responses. No secret material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub grant_types: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub first_party: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Client> for ClientSummary {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id.clone(),
            name: client.name.clone(),
            redirect_uris: client.redirect_uris.clone(),
            scopes: client.scopes.clone(),
            grant_types: client.grant_types.clone(),
            token_endpoint_auth_method: client.token_endpoint_auth_method.clone(),
            first_party: client.first_party,
            status: client.status.clone(),
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

/// End-user profile supplied by the host. `id` is the stable subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
}

/// A one-time authorization code, keyed by the SHA-256 hex of the raw code.
/// The raw code is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCodeRecord {
    pub code_hash: String,
    pub client_id: String,
    pub user_id: String,
    /// Echo of the redirect URI the code was issued for; the token endpoint
    /// requires an exact match.
    pub redirect_uri: String,
    pub scope: Vec<String>,
    /// PKCE challenge, always S256.
    pub code_challenge: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
    /// Non-null once consumed; a consumed record can never be consumed again.
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub original_state: String,
}

/// A refresh token, keyed by the SHA-256 hex of the raw token.
///
/// At any instant a rotation chain has at most one non-revoked, non-expired
/// member; rotation moves the live pointer forward atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub client_id: String,
    pub user_id: String,
    pub scope: Vec<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Hash of the predecessor in the rotation chain, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_from: Option<String>,
}

/// Recorded consent for a `(client, user)` pair. Scope only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub client_id: String,
    pub user_id: String,
    pub scope: Vec<String>,
    pub granted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    pub first_party: bool,
}

/// Successful response from the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_summary_omits_secret_hash() {
        let client = Client {
            id: "cl_1".to_owned(),
            name: "Test".to_owned(),
            secret_hash: "deadbeef".to_owned(),
            status: "active".to_owned(),
            ..Client::default()
        };
        let summary = ClientSummary::from(&client);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("deadbeef"));
        assert!(!json.contains("secret_hash"));
        assert!(json.contains("\"id\":\"cl_1\""));
    }

    #[test]
    fn test_client_round_trips_secret_hash() {
        let client = Client {
            id: "cl_1".to_owned(),
            secret_hash: "deadbeef".to_owned(),
            ..Client::default()
        };
        let json = serde_json::to_string(&client).unwrap();
        let back: Client = serde_json::from_str(&json).unwrap();
        assert_eq!(back.secret_hash, "deadbeef");
    }

    #[test]
    fn test_token_response_skips_absent_fields() {
        let response = TokenResponse {
            access_token: "at".to_owned(),
            token_type: "Bearer".to_owned(),
            expires_in: 600,
            refresh_token: None,
            id_token: None,
            scope: Some("openid".to_owned()),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("refresh_token"));
        assert!(!json.contains("id_token"));
        assert!(json.contains("\"scope\":\"openid\""));
    }

    #[test]
    fn test_auth_code_record_defaults_consumed_at() {
        let json = r#"{
            "code_hash": "h", "client_id": "c", "user_id": "u",
            "redirect_uri": "https://client.example.com/cb",
            "scope": ["openid"], "code_challenge": "ch", "nonce": "",
            "expires_at": "2026-01-01T00:00:00Z",
            "created_at": "2026-01-01T00:00:00Z",
            "original_state": "s"
        }"#;
        let record: AuthCodeRecord = serde_json::from_str(json).unwrap();
        assert!(record.consumed_at.is_none());
    }
}
