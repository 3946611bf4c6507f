// ABOUTME: Integration tests for the OIDC surface around the grants
// ABOUTME: UserInfo, discovery, JWKS, revocation, and configuration reload behavior
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::collections::HashMap;

use common::{seeded_provider, CHALLENGE, ISSUER, REDIRECT_URI, VERIFIER};
use http::StatusCode;
use oidc_provider::handlers::OidcRequest;
use serde_json::json;

/// Full code grant; returns (access_token, refresh_token).
async fn obtain_tokens(provider: &oidc_provider::OidcProvider) -> (String, String) {
    let services = provider.snapshot().await;
    let authorize = OidcRequest::new().with_query([
        ("response_type", "code"),
        ("client_id", "client_1"),
        ("redirect_uri", REDIRECT_URI),
        ("scope", "openid profile"),
        ("state", "state-1"),
        ("nonce", "nonce-1"),
        ("code_challenge", CHALLENGE),
        ("code_challenge_method", "S256"),
    ]);
    let redirect = services.authorize.handle(&authorize).await;
    let location = url::Url::parse(redirect.location().unwrap()).unwrap();
    let pairs: HashMap<String, String> = location.query_pairs().into_owned().collect();

    let exchange = OidcRequest::new().with_form([
        ("grant_type", "authorization_code"),
        ("client_id", "client_1"),
        ("client_secret", "secret_1"),
        ("code", pairs["code"].as_str()),
        ("redirect_uri", REDIRECT_URI),
        ("code_verifier", VERIFIER),
    ]);
    let granted = services.token_grant.handle(&exchange).await;
    let body = granted.body().unwrap();
    (
        body["access_token"].as_str().unwrap().to_owned(),
        body["refresh_token"].as_str().unwrap().to_owned(),
    )
}

// =============================================================================
// UserInfo
// =============================================================================

#[tokio::test]
async fn test_userinfo_returns_profile_for_valid_bearer() {
    let provider = seeded_provider().await;
    let (access_token, _) = obtain_tokens(&provider).await;

    let services = provider.snapshot().await;
    let request =
        OidcRequest::new().with_header("Authorization", format!("Bearer {access_token}"));
    let response = services.userinfo.handle(&request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.body().unwrap();
    assert_eq!(body["sub"], "u_1");
    assert_eq!(body["preferred_username"], "jdoe");
    assert_eq!(body["name"], "J. Doe");
    assert_eq!(body["email"], "jdoe@example.com");
    assert_eq!(body["email_verified"], true);
}

#[tokio::test]
async fn test_userinfo_rejects_tampered_signature() {
    let provider = seeded_provider().await;
    let (access_token, _) = obtain_tokens(&provider).await;

    let mut tampered = access_token;
    tampered.pop();
    tampered.push('A');

    let services = provider.snapshot().await;
    let request = OidcRequest::new().with_header("Authorization", format!("Bearer {tampered}"));
    let response = services.userinfo.handle(&request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.body().unwrap()["error"], "invalid_token");
}

#[tokio::test]
async fn test_userinfo_rejects_refresh_token_as_bearer() {
    let provider = seeded_provider().await;
    let (_, refresh_token) = obtain_tokens(&provider).await;

    let services = provider.snapshot().await;
    let request =
        OidcRequest::new().with_header("Authorization", format!("Bearer {refresh_token}"));
    assert_eq!(
        services.userinfo.handle(&request).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

// =============================================================================
// Discovery and JWKS
// =============================================================================

#[tokio::test]
async fn test_discovery_composes_endpoints_from_issuer_and_base_path() {
    let provider = seeded_provider().await;
    let services = provider.snapshot().await;
    let response = services.metadata.handle_discovery(&OidcRequest::new());
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.body().unwrap();
    assert_eq!(body["issuer"], ISSUER);
    assert_eq!(
        body["authorization_endpoint"],
        format!("{ISSUER}/api/auth/oidc/authorize")
    );
    assert_eq!(body["token_endpoint"], format!("{ISSUER}/api/auth/oidc/token"));
    assert_eq!(
        body["userinfo_endpoint"],
        format!("{ISSUER}/api/auth/oidc/userinfo")
    );
    assert_eq!(
        body["revocation_endpoint"],
        format!("{ISSUER}/api/auth/oidc/revoke")
    );
    assert_eq!(
        body["jwks_uri"],
        format!("{ISSUER}/api/auth/oidc/.well-known/jwks.json")
    );
    assert_eq!(body["response_types_supported"], json!(["code"]));
    assert_eq!(body["subject_types_supported"], json!(["public"]));
    assert_eq!(body["id_token_signing_alg_values_supported"], json!(["RS256"]));
    assert_eq!(
        body["grant_types_supported"],
        json!(["authorization_code", "refresh_token"])
    );
    assert_eq!(
        body["token_endpoint_auth_methods_supported"],
        json!(["client_secret_post", "none"])
    );
    assert_eq!(body["code_challenge_methods_supported"], json!(["S256"]));
}

#[tokio::test]
async fn test_jwks_matches_active_signing_key() {
    let provider = seeded_provider().await;
    let services = provider.snapshot().await;
    let response = services.metadata.handle_jwks(&OidcRequest::new());
    let body = response.body().unwrap();
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kid"], services.keys.kid());
}

// =============================================================================
// Revocation
// =============================================================================

#[tokio::test]
async fn test_revoked_refresh_token_cannot_be_used() {
    let provider = seeded_provider().await;
    let (_, refresh_token) = obtain_tokens(&provider).await;

    let services = provider.snapshot().await;
    let revoke = OidcRequest::new().with_form([
        ("token", refresh_token.as_str()),
        ("client_id", "client_1"),
        ("client_secret", "secret_1"),
    ]);
    assert_eq!(services.revoke.handle(&revoke).await.status(), StatusCode::OK);
    // idempotent: revoking again is still 200
    assert_eq!(services.revoke.handle(&revoke).await.status(), StatusCode::OK);

    let refresh = OidcRequest::new().with_form([
        ("grant_type", "refresh_token"),
        ("client_id", "client_1"),
        ("client_secret", "secret_1"),
        ("refresh_token", refresh_token.as_str()),
    ]);
    let response = services.token_grant.handle(&refresh).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.body().unwrap()["error"], "invalid_grant");
}

// =============================================================================
// Configuration reload
// =============================================================================

#[tokio::test]
async fn test_reload_with_bad_key_keeps_serving_with_prior_key() {
    let provider = seeded_provider().await;
    let before = provider.snapshot().await;
    let kid_before = before.keys.kid().to_owned();

    assert!(provider
        .apply_config(br#"{"private_key_pem": "garbage"}"#)
        .await
        .is_err());

    let services = provider.snapshot().await;
    let jwks = services.metadata.handle_jwks(&OidcRequest::new());
    assert_eq!(jwks.body().unwrap()["keys"][0]["kid"], kid_before);
}

#[tokio::test]
async fn test_reload_changes_discovery_issuer() {
    let provider = seeded_provider().await;
    provider
        .apply_config(br#"{"issuer": "https://sso.example.com", "base_path": "/sso"}"#)
        .await
        .unwrap();

    let services = provider.snapshot().await;
    let body = services
        .metadata
        .handle_discovery(&OidcRequest::new());
    let body = body.body().unwrap().clone();
    assert_eq!(body["issuer"], "https://sso.example.com");
    assert_eq!(
        body["token_endpoint"],
        "https://sso.example.com/sso/token"
    );

    // tokens issued before the reload no longer validate: issuer changed
    // and the signing key was regenerated with the new graph
    let (provider2_access, _) = {
        let p = seeded_provider().await;
        obtain_tokens(&p).await
    };
    assert!(services
        .tokens
        .parse_and_validate_access_token(&provider2_access)
        .is_err());
}
