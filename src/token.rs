// ABOUTME: Token issuance and validation for the provider core
// ABOUTME: RS256 access and ID tokens, opaque refresh-token minting, bearer validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::crypto::{join_scope, random_url_safe, sha256_hex};
use crate::errors::TokenError;
use crate::keys::KeyService;

/// Size in bytes of raw refresh tokens before base64url encoding.
const REFRESH_TOKEN_BYTES: usize = 32;

/// Inputs for access-token issuance. Optional fields default at signing time.
#[derive(Debug, Clone, Default)]
pub struct AccessTokenParams {
    /// Client id string, carried in `aud`.
    pub audience: String,
    /// Stable subject, carried in `sub`.
    pub subject: String,
    /// Granted scope; empty falls back to the configured defaults.
    pub scope: Vec<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Inputs for ID-token issuance.
#[derive(Debug, Clone, Default)]
pub struct IdTokenParams {
    pub audience: String,
    pub subject: String,
    pub nonce: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auth_time: Option<DateTime<Utc>>,
}

/// Wire claims of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    /// Space-joined normalized scope list.
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
    pub typ: String,
    #[serde(rename = "use")]
    pub token_use: String,
}

/// Wire claims of an ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub nonce: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
}

/// A freshly minted opaque refresh token. Only `token_hash` is persisted;
/// `raw` goes back to the client once and is never stored.
#[derive(Debug, Clone)]
pub struct MintedRefreshToken {
    pub raw: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates the provider's tokens against the active signing key.
pub struct TokenService {
    issuer: String,
    access_ttl: Duration,
    id_ttl: Duration,
    refresh_ttl: Duration,
    default_scopes: Vec<String>,
    keys: Arc<KeyService>,
}

impl TokenService {
    #[must_use]
    pub fn new(config: &Config, keys: Arc<KeyService>) -> Self {
        let normalized = config.normalize();
        Self {
            issuer: normalized.issuer,
            access_ttl: normalized.access_token_ttl,
            id_ttl: normalized.id_token_ttl,
            refresh_ttl: normalized.refresh_token_ttl,
            default_scopes: normalized.default_scopes,
            keys,
        }
    }

    /// Sign an RS256 access token. Returns the compact JWT and its remaining
    /// lifetime in seconds.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if JWT encoding fails.
    pub fn issue_access_token(&self, params: AccessTokenParams) -> Result<(String, i64), TokenError> {
        let now = Utc::now();
        let issued_at = params.issued_at.unwrap_or(now);
        let expires_at = params.expires_at.unwrap_or(now + self.access_ttl);
        let scope = if params.scope.is_empty() {
            self.default_scopes.clone()
        } else {
            params.scope
        };

        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: params.subject,
            aud: params.audience,
            scope: join_scope(&scope),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            typ: "Bearer".to_owned(),
            token_use: "access_token".to_owned(),
        };

        let signed = self.sign(&claims)?;
        Ok((signed, (expires_at - now).num_seconds()))
    }

    /// Sign an RS256 ID token carrying the nonce from the authorization leg.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if JWT encoding fails.
    pub fn issue_id_token(&self, params: IdTokenParams) -> Result<String, TokenError> {
        let now = Utc::now();
        let issued_at = params.issued_at.unwrap_or(now);
        let expires_at = params.expires_at.unwrap_or(now + self.id_ttl);
        let auth_time = params.auth_time.unwrap_or(now);

        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: params.subject,
            aud: params.audience,
            nonce: params.nonce,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            auth_time: auth_time.timestamp(),
        };
        self.sign(&claims)
    }

    /// Mint an opaque refresh token: 32 random bytes, URL-safe encoded.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if the system RNG fails.
    pub fn mint_refresh_token(&self) -> Result<MintedRefreshToken, TokenError> {
        let raw = random_url_safe(REFRESH_TOKEN_BYTES)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let token_hash = sha256_hex(&raw);
        Ok(MintedRefreshToken {
            raw,
            token_hash,
            expires_at: Utc::now() + self.refresh_ttl,
        })
    }

    /// Parse and validate a bearer access token.
    ///
    /// Enforces RS256, the configured issuer, `use == "access_token"`, and
    /// expiry. Verified against the current public key only.
    ///
    /// # Errors
    /// Any deviation returns [`TokenError::Invalid`].
    pub fn parse_and_validate_access_token(&self, raw: &str) -> Result<AccessTokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;
        validation.leeway = 0;

        let data = decode::<AccessTokenClaims>(raw, self.keys.decoding_key(), &validation)
            .map_err(|_| TokenError::Invalid)?;
        let claims = data.claims;
        if claims.token_use != "access_token" {
            return Err(TokenError::Invalid);
        }
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.keys.kid().to_owned());
        encode(&header, claims, self.keys.encoding_key())
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}
