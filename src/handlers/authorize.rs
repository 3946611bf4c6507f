// ABOUTME: Authorization endpoint state machine
// ABOUTME: Validates the request, records consent, mints the one-time code, redirects back
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use std::sync::Arc;

use chrono::Utc;
use http::StatusCode;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::Config;
use crate::crypto::{merge_scopes, random_url_safe, scope_is_subset, sha256_hex, split_scope};
use crate::models::{AuthCodeRecord, ConsentRecord};
use crate::provider::UserResolver;
use crate::store::{is_client_active, validate_redirect_uri, validate_scopes, Store};

use super::{oauth_error, OidcRequest, OidcResponse};

const TRACE: &str = "authorize";

/// Size in bytes of raw authorization codes before base64url encoding.
const AUTH_CODE_BYTES: usize = 32;

pub struct AuthorizeHandler {
    store: Arc<dyn Store>,
    config: Config,
    resolver: Arc<dyn UserResolver>,
}

impl AuthorizeHandler {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: &Config, resolver: Arc<dyn UserResolver>) -> Self {
        Self {
            store,
            config: config.normalize(),
            resolver,
        }
    }

    /// GET /authorize.
    ///
    /// Errors raised before the client and redirect URI are validated return
    /// JSON instead of redirecting, so codes can never leak to an unvalidated
    /// URI.
    pub async fn handle(&self, request: &OidcRequest) -> OidcResponse {
        let response_type = request.query("response_type");
        let client_id = request.query("client_id").trim();
        let redirect_uri = request.query("redirect_uri").trim();
        let scope = split_scope(request.query("scope"));
        let state = request.query("state");
        let nonce = request.query("nonce");
        let code_challenge = request.query("code_challenge").trim();
        let code_challenge_method = request.query("code_challenge_method").trim();

        if response_type != "code" {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "unsupported_response_type",
                "response_type must be code",
                TRACE,
            );
        }
        if client_id.is_empty() || redirect_uri.is_empty() || state.is_empty() {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "client_id, redirect_uri, state are required",
                TRACE,
            );
        }
        if code_challenge_method != "S256" {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "code_challenge_method must be S256",
                TRACE,
            );
        }
        if code_challenge.is_empty() {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "code_challenge is required",
                TRACE,
            );
        }

        let client = match self.store.get_client(client_id).await {
            Ok(client) if is_client_active(&client) => client,
            Ok(_) | Err(_) => {
                return oauth_error(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized_client",
                    "client is invalid",
                    TRACE,
                );
            }
        };
        if validate_redirect_uri(&client, redirect_uri).is_err() {
            warn!(client_id = %client.id, "authorization request with unregistered redirect_uri");
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "invalid redirect uri",
                TRACE,
            );
        }
        if validate_scopes(&client, &scope).is_err() {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_scope", "invalid scope", TRACE);
        }

        let Some(user) = self.resolver.resolve_request_user(request.extensions()) else {
            return oauth_error(
                StatusCode::UNAUTHORIZED,
                "access_denied",
                "user not logged in",
                TRACE,
            );
        };

        if let Err(e) = self.record_consent(&client.id, &user.id, &scope, client.first_party).await
        {
            // consent bookkeeping must not block the login; scope safety is
            // already enforced above
            warn!(client_id = %client.id, error = %e, "failed to persist consent");
        }

        let Ok(raw_code) = random_url_safe(AUTH_CODE_BYTES) else {
            return oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "failed to create authorization code",
                TRACE,
            );
        };
        let now = Utc::now();
        let record = AuthCodeRecord {
            code_hash: sha256_hex(&raw_code),
            client_id: client.id.clone(),
            user_id: user.id.clone(),
            redirect_uri: redirect_uri.to_owned(),
            scope,
            code_challenge: code_challenge.to_owned(),
            nonce: nonce.to_owned(),
            expires_at: now + self.config.authorization_code_ttl,
            consumed_at: None,
            created_at: now,
            original_state: state.to_owned(),
        };
        if let Err(e) = self.store.save_auth_code(record).await {
            error!(client_id = %client.id, error = %e, "failed to persist authorization code");
            return oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "failed to persist authorization code",
                TRACE,
            );
        }

        let Ok(location) = append_redirect_params(redirect_uri, &[("code", &raw_code), ("state", state)])
        else {
            return oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "failed to render redirect",
                TRACE,
            );
        };
        debug!(client_id = %client.id, user_id = %user.id, "authorization code issued");
        OidcResponse::Redirect { location }
    }

    /// First-party clients always (re)write consent with the requested
    /// scope. Third-party clients only write when the request goes beyond
    /// what was previously granted; scope only ever grows.
    async fn record_consent(
        &self,
        client_id: &str,
        user_id: &str,
        scope: &[String],
        first_party: bool,
    ) -> Result<(), crate::errors::StoreError> {
        let now = Utc::now();
        let consent = |scope: Vec<String>, first_party: bool| ConsentRecord {
            client_id: client_id.to_owned(),
            user_id: user_id.to_owned(),
            scope,
            granted_at: now,
            updated_at: now,
            revoked_at: None,
            first_party,
        };

        if first_party {
            return self.store.save_consent(consent(scope.to_vec(), true)).await;
        }
        match self.store.get_consent(client_id, user_id).await {
            Ok(existing) => {
                if scope_is_subset(scope, &existing.scope) {
                    Ok(())
                } else {
                    self.store
                        .save_consent(consent(
                            merge_scopes(&existing.scope, scope),
                            existing.first_party,
                        ))
                        .await
                }
            }
            Err(_) => self.store.save_consent(consent(scope.to_vec(), false)).await,
        }
    }
}

/// Unparseable or non-`http(s)` redirect target.
#[derive(Debug)]
struct InvalidRedirect;

/// Merge query parameters into a redirect URI. Only `http(s)` schemes are
/// allowed out.
fn append_redirect_params(base: &str, params: &[(&str, &str)]) -> Result<String, InvalidRedirect> {
    let mut url = Url::parse(base).map_err(|_| InvalidRedirect)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(InvalidRedirect);
    }
    url.query_pairs_mut().extend_pairs(params);
    Ok(url.into())
}
