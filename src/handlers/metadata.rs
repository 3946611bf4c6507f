// ABOUTME: Discovery document and JWKS endpoints
// ABOUTME: Advertises exactly the capabilities this provider implements
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use std::sync::Arc;

use http::StatusCode;
use serde_json::json;

use crate::config::Config;
use crate::keys::KeyService;

use super::{oauth_error, OidcRequest, OidcResponse};

pub struct MetadataHandler {
    config: Config,
    keys: Arc<KeyService>,
}

impl MetadataHandler {
    #[must_use]
    pub fn new(config: &Config, keys: Arc<KeyService>) -> Self {
        Self {
            config: config.normalize(),
            keys,
        }
    }

    /// GET /.well-known/openid-configuration.
    pub fn handle_discovery(&self, _request: &OidcRequest) -> OidcResponse {
        let issuer = &self.config.issuer;
        let base = self.config.base_path.trim_end_matches('/');
        OidcResponse::json(
            StatusCode::OK,
            json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}{base}/authorize"),
                "token_endpoint": format!("{issuer}{base}/token"),
                "userinfo_endpoint": format!("{issuer}{base}/userinfo"),
                "jwks_uri": format!("{issuer}{base}/.well-known/jwks.json"),
                "revocation_endpoint": format!("{issuer}{base}/revoke"),
                "response_types_supported": ["code"],
                "subject_types_supported": ["public"],
                "id_token_signing_alg_values_supported": ["RS256"],
                "grant_types_supported": ["authorization_code", "refresh_token"],
                "scopes_supported": self.config.default_scopes,
                "token_endpoint_auth_methods_supported": ["client_secret_post", "none"],
                "code_challenge_methods_supported": ["S256"],
            }),
        )
    }

    /// GET /.well-known/jwks.json.
    pub fn handle_jwks(&self, _request: &OidcRequest) -> OidcResponse {
        match serde_json::to_value(self.keys.jwks()) {
            Ok(body) => OidcResponse::json(StatusCode::OK, body),
            Err(_) => oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "failed to serialize jwks",
                "jwks",
            ),
        }
    }
}
