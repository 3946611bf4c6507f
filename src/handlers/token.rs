// ABOUTME: Token endpoint state machines for the authorization_code and refresh_token grants
// ABOUTME: One-shot code consumption, PKCE verification, refresh-token rotation with replay abort
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use std::sync::Arc;

use chrono::Utc;
use http::StatusCode;
use tracing::{debug, error, warn};

use crate::constants::{GRANT_TYPE_AUTHORIZATION_CODE, GRANT_TYPE_REFRESH_TOKEN};
use crate::crypto::{constant_time_eq, join_scope};
use crate::errors::StoreError;
use crate::models::{Client, RefreshTokenRecord, TokenResponse};
use crate::pkce::verify_s256;
use crate::store::{client_allows_grant_type, Store};
use crate::token::{AccessTokenParams, IdTokenParams, TokenService};

use super::{oauth_error, OidcRequest, OidcResponse};

const TRACE: &str = "token";

pub struct TokenGrantHandler {
    store: Arc<dyn Store>,
    tokens: Arc<TokenService>,
}

impl TokenGrantHandler {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    /// POST /token. Dispatches on `grant_type`.
    pub async fn handle(&self, request: &OidcRequest) -> OidcResponse {
        match request.form_value("grant_type").trim() {
            GRANT_TYPE_AUTHORIZATION_CODE => self.authorization_code_grant(request).await,
            GRANT_TYPE_REFRESH_TOKEN => self.refresh_token_grant(request).await,
            _ => oauth_error(
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                "grant_type is not supported",
                TRACE,
            ),
        }
    }

    async fn authorization_code_grant(&self, request: &OidcRequest) -> OidcResponse {
        let client_id = request.form_value("client_id").trim();
        let client_secret = request.form_value("client_secret").trim();
        let code = request.form_value("code").trim();
        let redirect_uri = request.form_value("redirect_uri").trim();
        let code_verifier = request.form_value("code_verifier").trim();

        if client_id.is_empty() || code.is_empty() || redirect_uri.is_empty() || code_verifier.is_empty()
        {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "missing required parameters",
                TRACE,
            );
        }

        let client = match self.authenticate_client(client_id, client_secret, GRANT_TYPE_AUTHORIZATION_CODE).await {
            Ok(client) => client,
            Err(response) => return response,
        };

        let code_record = match self.store.consume_auth_code(code, Utc::now()).await {
            Ok(record) => record,
            Err(
                StoreError::AuthCodeNotFound
                | StoreError::AuthCodeExpired
                | StoreError::AuthCodeConsumed,
            ) => {
                warn!(client_id = %client.id, "authorization code rejected");
                return oauth_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_grant",
                    "authorization code is invalid",
                    TRACE,
                );
            }
            Err(e) => {
                error!(client_id = %client.id, error = %e, "failed to consume authorization code");
                return oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to consume authorization code",
                    TRACE,
                );
            }
        };

        if !constant_time_eq(&code_record.client_id, &client.id)
            || !constant_time_eq(&code_record.redirect_uri, redirect_uri)
        {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "authorization code does not match client or redirect_uri",
                TRACE,
            );
        }
        if verify_s256(code_verifier, &code_record.code_challenge).is_err() {
            warn!(client_id = %client.id, "PKCE verification failed");
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "code_verifier is invalid",
                TRACE,
            );
        }

        match self
            .issue_code_grant_response(&client, &code_record.user_id, &code_record.nonce, code_record.scope)
            .await
        {
            Ok(response) => {
                debug!(client_id = %client.id, "authorization code exchanged");
                OidcResponse::json(
                    StatusCode::OK,
                    serde_json::to_value(response).unwrap_or(serde_json::Value::Null),
                )
            }
            Err(e) => {
                error!(client_id = %client.id, error = %e, "failed to issue tokens");
                oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to issue tokens",
                    TRACE,
                )
            }
        }
    }

    async fn refresh_token_grant(&self, request: &OidcRequest) -> OidcResponse {
        let client_id = request.form_value("client_id").trim();
        let client_secret = request.form_value("client_secret").trim();
        let refresh_token = request.form_value("refresh_token").trim();

        if client_id.is_empty() || refresh_token.is_empty() {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "client_id and refresh_token are required",
                TRACE,
            );
        }

        let client = match self.authenticate_client(client_id, client_secret, GRANT_TYPE_REFRESH_TOKEN).await {
            Ok(client) => client,
            Err(response) => return response,
        };

        let now = Utc::now();
        let record = match self.store.get_refresh_token(refresh_token, now).await {
            Ok(record) => record,
            Err(
                StoreError::RefreshTokenNotFound
                | StoreError::RefreshTokenExpired
                | StoreError::RefreshTokenRevoked,
            ) => {
                return oauth_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_grant",
                    "refresh token is invalid",
                    TRACE,
                );
            }
            Err(e) => {
                error!(client_id = %client.id, error = %e, "failed to load refresh token");
                return oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to load refresh token",
                    TRACE,
                );
            }
        };
        if !constant_time_eq(&record.client_id, &client.id) {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "refresh token does not belong to client",
                TRACE,
            );
        }

        // mint first, then rotate: the new record only becomes live if the
        // rotation succeeds
        let (mut response, new_record, raw_refresh) =
            match self.issue_refreshed_response(&client, &record.user_id, record.scope.clone(), &record.token_hash) {
                Ok(parts) => parts,
                Err(e) => {
                    error!(client_id = %client.id, error = %e, "failed to issue refreshed tokens");
                    return oauth_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "server_error",
                        "failed to issue refreshed tokens",
                        TRACE,
                    );
                }
            };

        match self.store.rotate_refresh_token(refresh_token, new_record, now).await {
            Ok(()) => {}
            Err(StoreError::RefreshTokenReplay) => {
                // the chain is compromised; nothing new was inserted
                warn!(client_id = %client.id, "refresh token replay detected");
                return oauth_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_grant",
                    "refresh token replay detected",
                    TRACE,
                );
            }
            Err(e) => {
                error!(client_id = %client.id, error = %e, "failed to rotate refresh token");
                return oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to rotate refresh token",
                    TRACE,
                );
            }
        }

        response.refresh_token = Some(raw_refresh);
        debug!(client_id = %client.id, "refresh token rotated");
        OidcResponse::json(
            StatusCode::OK,
            serde_json::to_value(response).unwrap_or(serde_json::Value::Null),
        )
    }

    async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
        grant_type: &str,
    ) -> Result<Client, OidcResponse> {
        let client = self
            .store
            .validate_client_secret(client_id, client_secret)
            .await
            .map_err(|_| {
                oauth_error(
                    StatusCode::UNAUTHORIZED,
                    "invalid_client",
                    "client credentials are invalid",
                    TRACE,
                )
            })?;
        if !client_allows_grant_type(&client, grant_type) {
            return Err(oauth_error(
                StatusCode::BAD_REQUEST,
                "unauthorized_client",
                "client is not registered for this grant type",
                TRACE,
            ));
        }
        Ok(client)
    }

    /// Full token set for the code grant: access + ID + fresh refresh token,
    /// with the refresh record persisted before the response leaves.
    async fn issue_code_grant_response(
        &self,
        client: &Client,
        user_id: &str,
        nonce: &str,
        scope: Vec<String>,
    ) -> Result<TokenResponse, Box<dyn std::error::Error + Send + Sync>> {
        let (access_token, expires_in) = self.tokens.issue_access_token(AccessTokenParams {
            audience: client.id.clone(),
            subject: user_id.to_owned(),
            scope: scope.clone(),
            ..AccessTokenParams::default()
        })?;
        let id_token = self.tokens.issue_id_token(IdTokenParams {
            audience: client.id.clone(),
            subject: user_id.to_owned(),
            nonce: nonce.to_owned(),
            ..IdTokenParams::default()
        })?;
        let minted = self.tokens.mint_refresh_token()?;
        self.store
            .save_refresh_token(RefreshTokenRecord {
                token_hash: minted.token_hash,
                client_id: client.id.clone(),
                user_id: user_id.to_owned(),
                scope: scope.clone(),
                expires_at: minted.expires_at,
                revoked_at: None,
                created_at: Utc::now(),
                rotated_from: None,
            })
            .await?;
        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_owned(),
            expires_in,
            refresh_token: Some(minted.raw),
            id_token: Some(id_token),
            scope: Some(join_scope(&scope)),
        })
    }

    /// Access token plus the successor refresh record for the refresh grant.
    /// The successor is handed to `rotate_refresh_token` by the caller, not
    /// persisted here.
    fn issue_refreshed_response(
        &self,
        client: &Client,
        user_id: &str,
        scope: Vec<String>,
        predecessor_hash: &str,
    ) -> Result<(TokenResponse, RefreshTokenRecord, String), crate::errors::TokenError> {
        let (access_token, expires_in) = self.tokens.issue_access_token(AccessTokenParams {
            audience: client.id.clone(),
            subject: user_id.to_owned(),
            scope: scope.clone(),
            ..AccessTokenParams::default()
        })?;
        let minted = self.tokens.mint_refresh_token()?;
        let new_record = RefreshTokenRecord {
            token_hash: minted.token_hash,
            client_id: client.id.clone(),
            user_id: user_id.to_owned(),
            scope: scope.clone(),
            expires_at: minted.expires_at,
            revoked_at: None,
            created_at: Utc::now(),
            rotated_from: Some(predecessor_hash.to_owned()),
        };
        let response = TokenResponse {
            access_token,
            token_type: "Bearer".to_owned(),
            expires_in,
            refresh_token: None,
            id_token: None,
            scope: Some(join_scope(&scope)),
        };
        Ok((response, new_record, minted.raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::crypto::sha256_hex;
    use crate::keys::KeyService;
    use crate::models::AuthCodeRecord;
    use crate::store::InMemoryStore;
    use chrono::Duration;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    async fn setup() -> (Arc<InMemoryStore>, TokenGrantHandler) {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_client(
                Client {
                    id: "client_1".to_owned(),
                    name: "client-1".to_owned(),
                    redirect_uris: vec!["https://client.example.com/callback".to_owned()],
                    scopes: vec!["openid".to_owned(), "profile".to_owned()],
                    grant_types: vec![
                        "authorization_code".to_owned(),
                        "refresh_token".to_owned(),
                    ],
                    token_endpoint_auth_method: "client_secret_post".to_owned(),
                    status: "active".to_owned(),
                    ..Client::default()
                },
                "secret_1",
            )
            .await
            .unwrap();

        let config = Config {
            issuer: "https://id.example.com".to_owned(),
            ..Config::default()
        };
        let keys = Arc::new(KeyService::new(None).unwrap());
        let tokens = Arc::new(TokenService::new(&config, keys));
        let handler = TokenGrantHandler::new(Arc::clone(&store) as Arc<dyn Store>, tokens);
        (store, handler)
    }

    async fn seed_auth_code(store: &InMemoryStore, raw_code: &str) {
        let now = Utc::now();
        store
            .save_auth_code(AuthCodeRecord {
                code_hash: sha256_hex(raw_code),
                client_id: "client_1".to_owned(),
                user_id: "u_1".to_owned(),
                redirect_uri: "https://client.example.com/callback".to_owned(),
                scope: vec!["openid".to_owned(), "profile".to_owned()],
                code_challenge: CHALLENGE.to_owned(),
                nonce: "nonce-1".to_owned(),
                expires_at: now + Duration::minutes(5),
                consumed_at: None,
                created_at: now,
                original_state: "state-1".to_owned(),
            })
            .await
            .unwrap();
    }

    fn code_grant_request(code: &str) -> OidcRequest {
        OidcRequest::new().with_form([
            ("grant_type", "authorization_code"),
            ("client_id", "client_1"),
            ("client_secret", "secret_1"),
            ("code", code),
            ("redirect_uri", "https://client.example.com/callback"),
            ("code_verifier", VERIFIER),
        ])
    }

    #[tokio::test]
    async fn test_code_grant_returns_full_token_set() {
        let (store, handler) = setup().await;
        seed_auth_code(&store, "auth_code_1").await;

        let response = handler.handle(&code_grant_request("auth_code_1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.body().unwrap();
        assert!(!body["access_token"].as_str().unwrap().is_empty());
        assert!(!body["id_token"].as_str().unwrap().is_empty());
        assert!(!body["refresh_token"].as_str().unwrap().is_empty());
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["scope"], "openid profile");

        // the refresh token is live in the store
        let raw_refresh = body["refresh_token"].as_str().unwrap();
        assert!(store.get_refresh_token(raw_refresh, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_code_replay_is_invalid_grant() {
        let (store, handler) = setup().await;
        seed_auth_code(&store, "auth_code_1").await;

        assert_eq!(
            handler.handle(&code_grant_request("auth_code_1")).await.status(),
            StatusCode::OK
        );
        let replay = handler.handle(&code_grant_request("auth_code_1")).await;
        assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
        assert_eq!(replay.body().unwrap()["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn test_wrong_verifier_is_invalid_grant_and_burns_the_code() {
        let (store, handler) = setup().await;
        seed_auth_code(&store, "auth_code_1").await;

        let request = code_grant_request("auth_code_1")
            .with_form([("code_verifier", "wrong-verifier-wrong-verifier-wrong-verifier")]);
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().unwrap()["error"], "invalid_grant");

        // consumption is one-shot even on PKCE failure
        let retry = handler.handle(&code_grant_request("auth_code_1")).await;
        assert_eq!(retry.body().unwrap()["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn test_bad_client_secret_is_invalid_client() {
        let (store, handler) = setup().await;
        seed_auth_code(&store, "auth_code_1").await;

        let request = code_grant_request("auth_code_1").with_form([("client_secret", "wrong")]);
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.body().unwrap()["error"], "invalid_client");
    }

    #[tokio::test]
    async fn test_redirect_uri_mismatch_is_invalid_grant() {
        let (store, handler) = setup().await;
        seed_auth_code(&store, "auth_code_1").await;

        let request = code_grant_request("auth_code_1")
            .with_form([("redirect_uri", "https://client.example.com/other")]);
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().unwrap()["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn test_unknown_grant_type() {
        let (_store, handler) = setup().await;
        let request = OidcRequest::new().with_form([("grant_type", "password")]);
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().unwrap()["error"], "unsupported_grant_type");
    }

    #[tokio::test]
    async fn test_grant_type_not_registered_for_client() {
        let (store, handler) = setup().await;
        store
            .update_client(Client {
                id: "client_1".to_owned(),
                grant_types: vec!["refresh_token".to_owned()],
                ..Client::default()
            })
            .await
            .unwrap();
        seed_auth_code(&store, "auth_code_1").await;

        let response = handler.handle(&code_grant_request("auth_code_1")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().unwrap()["error"], "unauthorized_client");
    }

    #[tokio::test]
    async fn test_refresh_grant_rotates_and_detects_replay() {
        let (store, handler) = setup().await;
        let now = Utc::now();
        store
            .save_refresh_token(RefreshTokenRecord {
                token_hash: sha256_hex("refresh_old"),
                client_id: "client_1".to_owned(),
                user_id: "u_1".to_owned(),
                scope: vec!["openid".to_owned(), "profile".to_owned()],
                expires_at: now + Duration::hours(2),
                revoked_at: None,
                created_at: now,
                rotated_from: None,
            })
            .await
            .unwrap();

        let request = OidcRequest::new().with_form([
            ("grant_type", "refresh_token"),
            ("client_id", "client_1"),
            ("client_secret", "secret_1"),
            ("refresh_token", "refresh_old"),
        ]);
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.body().unwrap();
        let new_refresh = body["refresh_token"].as_str().unwrap();
        assert_ne!(new_refresh, "refresh_old");
        // no ID token on refresh
        assert!(body.get("id_token").is_none());

        // the predecessor is revoked and linked from the successor
        assert_eq!(
            store.get_refresh_token("refresh_old", Utc::now()).await.unwrap_err(),
            StoreError::RefreshTokenRevoked
        );
        let successor = store.get_refresh_token(new_refresh, Utc::now()).await.unwrap();
        assert_eq!(successor.rotated_from, Some(sha256_hex("refresh_old")));

        // replaying the original is fatal and leaves the successor live
        let replay = handler.handle(&request).await;
        assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
        assert_eq!(replay.body().unwrap()["error"], "invalid_grant");
        assert!(store.get_refresh_token(new_refresh, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_token_of_other_client_is_rejected() {
        let (store, handler) = setup().await;
        let now = Utc::now();
        store
            .save_refresh_token(RefreshTokenRecord {
                token_hash: sha256_hex("foreign"),
                client_id: "client_2".to_owned(),
                user_id: "u_1".to_owned(),
                scope: vec!["openid".to_owned()],
                expires_at: now + Duration::hours(2),
                revoked_at: None,
                created_at: now,
                rotated_from: None,
            })
            .await
            .unwrap();

        let request = OidcRequest::new().with_form([
            ("grant_type", "refresh_token"),
            ("client_id", "client_1"),
            ("client_secret", "secret_1"),
            ("refresh_token", "foreign"),
        ]);
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().unwrap()["error"], "invalid_grant");
    }
}
