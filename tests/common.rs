// ABOUTME: Shared fixtures for the integration test suites
// ABOUTME: Seeds a provider with a known client and a static login user
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

#![allow(dead_code)]

use std::sync::Arc;

use http::Extensions;
use oidc_provider::models::UserProfile;
use oidc_provider::provider::UserResolver;
use oidc_provider::store::InMemoryStore;
use oidc_provider::{Client, Config, OidcProvider, Store};

// Verifier/challenge pair from RFC 7636 appendix B.
pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

pub const ISSUER: &str = "https://answer.example.com";
pub const REDIRECT_URI: &str = "https://client.example.com/callback";

/// Resolver that always reports the same logged-in user, and resolves only
/// that user by id.
pub struct StaticUser(pub UserProfile);

impl UserResolver for StaticUser {
    fn resolve_request_user(&self, _extensions: &Extensions) -> Option<UserProfile> {
        Some(self.0.clone())
    }

    fn resolve_user_by_id(&self, user_id: &str) -> Option<UserProfile> {
        (user_id == self.0.id).then(|| self.0.clone())
    }
}

pub fn test_user() -> UserProfile {
    UserProfile {
        id: "u_1".to_owned(),
        username: "jdoe".to_owned(),
        email: "jdoe@example.com".to_owned(),
        name: "J. Doe".to_owned(),
    }
}

/// Provider over an in-memory store, seeded with `client_1` / `secret_1`.
pub async fn seeded_provider() -> Arc<OidcProvider> {
    let store = Arc::new(InMemoryStore::new());
    store
        .create_client(
            Client {
                id: "client_1".to_owned(),
                name: "client-1".to_owned(),
                redirect_uris: vec![REDIRECT_URI.to_owned()],
                scopes: vec!["openid".to_owned(), "profile".to_owned()],
                grant_types: vec!["authorization_code".to_owned(), "refresh_token".to_owned()],
                token_endpoint_auth_method: "client_secret_post".to_owned(),
                status: "active".to_owned(),
                ..Client::default()
            },
            "secret_1",
        )
        .await
        .expect("seed client");

    let config = Config {
        issuer: ISSUER.to_owned(),
        ..Config::default()
    };
    Arc::new(
        OidcProvider::new(store, Arc::new(StaticUser(test_user())), config, "").expect("provider"),
    )
}
