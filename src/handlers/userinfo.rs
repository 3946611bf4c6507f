// ABOUTME: UserInfo endpoint: bearer-token validated profile lookup
// ABOUTME: Accepts GET or POST with an Authorization: Bearer header
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use std::sync::Arc;

use http::StatusCode;
use serde_json::json;

use crate::provider::UserResolver;
use crate::token::TokenService;

use super::{unauthorized_token, OidcRequest, OidcResponse};

const TRACE: &str = "userinfo";

pub struct UserInfoHandler {
    tokens: Arc<TokenService>,
    resolver: Arc<dyn UserResolver>,
}

impl UserInfoHandler {
    #[must_use]
    pub fn new(tokens: Arc<TokenService>, resolver: Arc<dyn UserResolver>) -> Self {
        Self { tokens, resolver }
    }

    /// GET/POST /userinfo. Every validation failure is a uniform 401
    /// `invalid_token`.
    pub async fn handle(&self, request: &OidcRequest) -> OidcResponse {
        let authorization = request.header("authorization").trim();
        let lowered = authorization.to_ascii_lowercase();
        if !lowered.starts_with("bearer ") {
            return unauthorized_token(TRACE);
        }
        let raw_token = authorization["bearer ".len()..].trim();

        let Ok(claims) = self.tokens.parse_and_validate_access_token(raw_token) else {
            return unauthorized_token(TRACE);
        };
        if claims.sub.is_empty() {
            return unauthorized_token(TRACE);
        }
        let Some(user) = self.resolver.resolve_user_by_id(&claims.sub) else {
            return unauthorized_token(TRACE);
        };

        OidcResponse::json(
            StatusCode::OK,
            json!({
                "sub": user.id,
                "preferred_username": user.username,
                "name": user.name,
                "email": user.email,
                "email_verified": !user.email.is_empty(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::keys::KeyService;
    use crate::models::UserProfile;
    use crate::token::AccessTokenParams;

    struct ById(UserProfile);

    impl UserResolver for ById {
        fn resolve_request_user(&self, _extensions: &http::Extensions) -> Option<UserProfile> {
            None
        }

        fn resolve_user_by_id(&self, user_id: &str) -> Option<UserProfile> {
            (user_id == self.0.id).then(|| self.0.clone())
        }
    }

    fn setup() -> (Arc<TokenService>, UserInfoHandler) {
        let config = Config {
            issuer: "https://id.example.com".to_owned(),
            ..Config::default()
        };
        let tokens = Arc::new(TokenService::new(
            &config,
            Arc::new(KeyService::new(None).unwrap()),
        ));
        let resolver = Arc::new(ById(UserProfile {
            id: "u_1".to_owned(),
            username: "jdoe".to_owned(),
            email: "jdoe@example.com".to_owned(),
            name: "J. Doe".to_owned(),
        }));
        let handler = UserInfoHandler::new(Arc::clone(&tokens), resolver);
        (tokens, handler)
    }

    fn bearer_token(tokens: &TokenService) -> String {
        tokens
            .issue_access_token(AccessTokenParams {
                audience: "client_1".to_owned(),
                subject: "u_1".to_owned(),
                scope: vec!["openid".to_owned(), "profile".to_owned()],
                ..AccessTokenParams::default()
            })
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_valid_bearer_returns_profile() {
        let (tokens, handler) = setup();
        let request = OidcRequest::new()
            .with_header("Authorization", format!("Bearer {}", bearer_token(&tokens)));
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.body().unwrap();
        assert_eq!(body["sub"], "u_1");
        assert_eq!(body["preferred_username"], "jdoe");
        assert_eq!(body["email_verified"], true);
    }

    #[tokio::test]
    async fn test_case_insensitive_bearer_prefix() {
        let (tokens, handler) = setup();
        let request = OidcRequest::new()
            .with_header("Authorization", format!("bearer {}", bearer_token(&tokens)));
        assert_eq!(handler.handle(&request).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_header_is_invalid_token() {
        let (_tokens, handler) = setup();
        let response = handler.handle(&OidcRequest::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.body().unwrap()["error"], "invalid_token");
    }

    #[tokio::test]
    async fn test_tampered_token_is_invalid_token() {
        let (tokens, handler) = setup();
        let mut token = bearer_token(&tokens);
        token.pop();
        token.push('A');
        let request = OidcRequest::new().with_header("Authorization", format!("Bearer {token}"));
        let response = handler.handle(&request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.body().unwrap()["error"], "invalid_token");
    }

    #[tokio::test]
    async fn test_unknown_subject_is_invalid_token() {
        let (tokens, _) = setup();
        let handler = UserInfoHandler::new(
            Arc::clone(&tokens),
            Arc::new(ById(UserProfile {
                id: "someone_else".to_owned(),
                ..UserProfile::default()
            })),
        );
        let request = OidcRequest::new()
            .with_header("Authorization", format!("Bearer {}", bearer_token(&tokens)));
        assert_eq!(handler.handle(&request).await.status(), StatusCode::UNAUTHORIZED);
    }
}
