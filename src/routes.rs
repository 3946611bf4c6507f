// ABOUTME: Axum adaptor for the provider's HTTP surface
// ABOUTME: Converts axum extractors to the abstract request surface and back
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

//! Route wiring.
//!
//! [`router`] serves the public protocol endpoints under the configured base
//! path. [`admin_router`] is separate so the host can mount it behind its
//! own admin authentication. Both resolve the service graph per request via
//! [`OidcProvider::snapshot`], so a configuration reload takes effect
//! without re-registering routes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use http::StatusCode;

use crate::handlers::{OidcRequest, OidcResponse};
use crate::provider::OidcProvider;

impl IntoResponse for OidcResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Json { status, body } => (status, Json(body)).into_response(),
            Self::Redirect { location } => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            Self::Empty { status } => status.into_response(),
        }
    }
}

/// Public endpoints under the configured base path.
pub async fn router(provider: Arc<OidcProvider>) -> Router {
    let base = provider.base_path().await;
    Router::new()
        .route(
            &format!("{base}/.well-known/openid-configuration"),
            get(handle_discovery),
        )
        .route(&format!("{base}/.well-known/jwks.json"), get(handle_jwks))
        .route(&format!("{base}/authorize"), get(handle_authorize))
        .route(&format!("{base}/token"), post(handle_token))
        .route(
            &format!("{base}/userinfo"),
            get(handle_userinfo).post(handle_userinfo),
        )
        .route(&format!("{base}/revoke"), post(handle_revoke))
        .with_state(provider)
}

/// Admin client CRUD under `<base>/admin/clients`. Mount behind host admin
/// authentication.
pub async fn admin_router(provider: Arc<OidcProvider>) -> Router {
    let base = provider.base_path().await;
    Router::new()
        .route(
            &format!("{base}/admin/clients"),
            get(handle_admin_list).post(handle_admin_create),
        )
        .route(
            &format!("{base}/admin/clients/{{client_id}}"),
            get(handle_admin_get)
                .put(handle_admin_update)
                .delete(handle_admin_delete),
        )
        .with_state(provider)
}

/// Carry the query string, headers, and request extensions (where host
/// middleware parks the login session) over to the abstract surface.
fn request_from_parts(parts: &Parts) -> OidcRequest {
    let query: Vec<(String, String)> =
        url::form_urlencoded::parse(parts.uri.query().unwrap_or("").as_bytes())
            .into_owned()
            .collect();
    let mut request = OidcRequest::new()
        .with_query(query)
        .with_extensions(parts.extensions.clone());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    request
}

async fn handle_discovery(State(provider): State<Arc<OidcProvider>>) -> OidcResponse {
    let services = provider.snapshot().await;
    services.metadata.handle_discovery(&OidcRequest::new())
}

async fn handle_jwks(State(provider): State<Arc<OidcProvider>>) -> OidcResponse {
    let services = provider.snapshot().await;
    services.metadata.handle_jwks(&OidcRequest::new())
}

async fn handle_authorize(
    State(provider): State<Arc<OidcProvider>>,
    parts: Parts,
) -> OidcResponse {
    let services = provider.snapshot().await;
    services.authorize.handle(&request_from_parts(&parts)).await
}

async fn handle_token(
    State(provider): State<Arc<OidcProvider>>,
    Form(form): Form<HashMap<String, String>>,
) -> OidcResponse {
    let services = provider.snapshot().await;
    services
        .token_grant
        .handle(&OidcRequest::new().with_form(form))
        .await
}

async fn handle_userinfo(
    State(provider): State<Arc<OidcProvider>>,
    parts: Parts,
) -> OidcResponse {
    let services = provider.snapshot().await;
    services.userinfo.handle(&request_from_parts(&parts)).await
}

async fn handle_revoke(
    State(provider): State<Arc<OidcProvider>>,
    Form(form): Form<HashMap<String, String>>,
) -> OidcResponse {
    let services = provider.snapshot().await;
    services
        .revoke
        .handle(&OidcRequest::new().with_form(form))
        .await
}

async fn handle_admin_list(State(provider): State<Arc<OidcProvider>>) -> OidcResponse {
    let services = provider.snapshot().await;
    services.admin.handle_list(&OidcRequest::new()).await
}

async fn handle_admin_create(
    State(provider): State<Arc<OidcProvider>>,
    Json(body): Json<serde_json::Value>,
) -> OidcResponse {
    let services = provider.snapshot().await;
    services
        .admin
        .handle_create(&OidcRequest::new().with_body(body))
        .await
}

async fn handle_admin_get(
    State(provider): State<Arc<OidcProvider>>,
    Path(client_id): Path<String>,
) -> OidcResponse {
    let services = provider.snapshot().await;
    services
        .admin
        .handle_get(&OidcRequest::new(), client_id.trim())
        .await
}

async fn handle_admin_update(
    State(provider): State<Arc<OidcProvider>>,
    Path(client_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> OidcResponse {
    let services = provider.snapshot().await;
    services
        .admin
        .handle_update(&OidcRequest::new().with_body(body), client_id.trim())
        .await
}

async fn handle_admin_delete(
    State(provider): State<Arc<OidcProvider>>,
    Path(client_id): Path<String>,
) -> OidcResponse {
    let services = provider.snapshot().await;
    services
        .admin
        .handle_delete(&OidcRequest::new(), client_id.trim())
        .await
}
