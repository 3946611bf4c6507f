// ABOUTME: Refresh-token revocation endpoint (RFC 7009 semantics)
// ABOUTME: Authenticates the client, then never leaks token state: unknown tokens still get 200
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use std::sync::Arc;

use chrono::Utc;
use http::StatusCode;
use tracing::{debug, error};

use crate::crypto::constant_time_eq;
use crate::errors::StoreError;
use crate::store::Store;

use super::{oauth_error, OidcRequest, OidcResponse};

const TRACE: &str = "revoke";

pub struct RevokeHandler {
    store: Arc<dyn Store>,
}

impl RevokeHandler {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// POST /revoke with form fields `token`, `client_id`, `client_secret`.
    ///
    /// Unknown, expired, already-revoked, and foreign tokens all return 200
    /// without revoking anything.
    pub async fn handle(&self, request: &OidcRequest) -> OidcResponse {
        let token = request.form_value("token").trim();
        let client_id = request.form_value("client_id").trim();
        let client_secret = request.form_value("client_secret").trim();

        if token.is_empty() || client_id.is_empty() {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "token and client_id are required",
                TRACE,
            );
        }

        let client = match self.store.validate_client_secret(client_id, client_secret).await {
            Ok(client) => client,
            Err(_) => {
                return oauth_error(
                    StatusCode::UNAUTHORIZED,
                    "invalid_client",
                    "client credentials are invalid",
                    TRACE,
                );
            }
        };

        let now = Utc::now();
        let record = match self.store.get_refresh_token(token, now).await {
            Ok(record) => record,
            Err(
                StoreError::RefreshTokenNotFound
                | StoreError::RefreshTokenExpired
                | StoreError::RefreshTokenRevoked,
            ) => {
                return OidcResponse::Empty { status: StatusCode::OK };
            }
            Err(e) => {
                error!(client_id = %client.id, error = %e, "failed to look up token for revocation");
                return oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to revoke token",
                    TRACE,
                );
            }
        };
        if !constant_time_eq(&record.client_id, &client.id) {
            return OidcResponse::Empty { status: StatusCode::OK };
        }

        if let Err(e) = self.store.revoke_refresh_token(token, now).await {
            error!(client_id = %client.id, error = %e, "failed to revoke token");
            return oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "failed to revoke token",
                TRACE,
            );
        }
        debug!(client_id = %client.id, "refresh token revoked");
        OidcResponse::Empty { status: StatusCode::OK }
    }
}
