// ABOUTME: Admin client CRUD handlers, thin wrappers around the Store
// ABOUTME: Mounted behind the host's admin authentication; responses are sanitized
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use std::sync::Arc;

use http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::errors::StoreError;
use crate::models::{Client, ClientSummary};
use crate::store::Store;

use super::{oauth_error, OidcRequest, OidcResponse};

pub struct AdminClientHandler {
    store: Arc<dyn Store>,
}

#[derive(Debug, Default, Deserialize)]
struct CreateClientRequest {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    grant_types: Vec<String>,
    #[serde(default)]
    token_endpoint_auth_method: String,
    #[serde(default)]
    first_party: bool,
    /// Optional caller-supplied secret; generated when empty.
    #[serde(default)]
    secret: String,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateClientRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    grant_types: Vec<String>,
    #[serde(default)]
    token_endpoint_auth_method: String,
    #[serde(default)]
    first_party: bool,
    #[serde(default)]
    status: String,
}

impl AdminClientHandler {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// POST /admin/clients. Returns 201 with the sanitized client and the
    /// raw secret, which is not retrievable afterwards.
    pub async fn handle_create(&self, request: &OidcRequest) -> OidcResponse {
        let Ok(req) = request.json_body::<CreateClientRequest>() else {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "invalid request body",
                "admin_client_create",
            );
        };
        if req.name.trim().is_empty() {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "name is required",
                "admin_client_create",
            );
        }
        let template = Client {
            id: req.id,
            name: req.name.trim().to_owned(),
            redirect_uris: req.redirect_uris,
            scopes: req.scopes,
            grant_types: req.grant_types,
            token_endpoint_auth_method: req.token_endpoint_auth_method,
            first_party: req.first_party,
            status: "active".to_owned(),
            ..Client::default()
        };
        match self.store.create_client(template, &req.secret).await {
            Ok((client, secret)) => OidcResponse::json(
                StatusCode::CREATED,
                json!({
                    "client": ClientSummary::from(&client),
                    "client_secret": secret,
                }),
            ),
            Err(StoreError::ClientExists) => oauth_error(
                StatusCode::CONFLICT,
                "invalid_request",
                "client already exists",
                "admin_client_create",
            ),
            Err(e) => {
                error!(error = %e, "failed to create client");
                oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to create client",
                    "admin_client_create",
                )
            }
        }
    }

    /// GET /admin/clients.
    pub async fn handle_list(&self, _request: &OidcRequest) -> OidcResponse {
        match self.store.list_clients().await {
            Ok(clients) => {
                let summaries: Vec<ClientSummary> =
                    clients.iter().map(ClientSummary::from).collect();
                OidcResponse::json(StatusCode::OK, json!({ "clients": summaries }))
            }
            Err(e) => {
                error!(error = %e, "failed to list clients");
                oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to list clients",
                    "admin_client_list",
                )
            }
        }
    }

    /// GET /admin/clients/{id}.
    pub async fn handle_get(&self, _request: &OidcRequest, client_id: &str) -> OidcResponse {
        match self.store.get_client(client_id).await {
            Ok(client) => OidcResponse::json(
                StatusCode::OK,
                serde_json::to_value(ClientSummary::from(&client)).unwrap_or(serde_json::Value::Null),
            ),
            Err(StoreError::ClientNotFound) => oauth_error(
                StatusCode::NOT_FOUND,
                "invalid_request",
                "client not found",
                "admin_client_get",
            ),
            Err(e) => {
                error!(error = %e, "failed to load client");
                oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to load client",
                    "admin_client_get",
                )
            }
        }
    }

    /// PUT /admin/clients/{id}. Non-empty fields merge; `first_party`
    /// always overwrites.
    pub async fn handle_update(&self, request: &OidcRequest, client_id: &str) -> OidcResponse {
        let Ok(req) = request.json_body::<UpdateClientRequest>() else {
            return oauth_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "invalid request body",
                "admin_client_update",
            );
        };
        let update = Client {
            id: client_id.to_owned(),
            name: req.name.trim().to_owned(),
            redirect_uris: req.redirect_uris,
            scopes: req.scopes,
            grant_types: req.grant_types,
            token_endpoint_auth_method: req.token_endpoint_auth_method,
            first_party: req.first_party,
            status: req.status,
            ..Client::default()
        };
        match self.store.update_client(update).await {
            Ok(updated) => OidcResponse::json(
                StatusCode::OK,
                serde_json::to_value(ClientSummary::from(&updated))
                    .unwrap_or(serde_json::Value::Null),
            ),
            Err(StoreError::ClientNotFound) => oauth_error(
                StatusCode::NOT_FOUND,
                "invalid_request",
                "client not found",
                "admin_client_update",
            ),
            Err(e) => {
                error!(error = %e, "failed to update client");
                oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to update client",
                    "admin_client_update",
                )
            }
        }
    }

    /// DELETE /admin/clients/{id}.
    pub async fn handle_delete(&self, _request: &OidcRequest, client_id: &str) -> OidcResponse {
        match self.store.delete_client(client_id).await {
            Ok(()) => OidcResponse::Empty {
                status: StatusCode::NO_CONTENT,
            },
            Err(StoreError::ClientNotFound) => oauth_error(
                StatusCode::NOT_FOUND,
                "invalid_request",
                "client not found",
                "admin_client_delete",
            ),
            Err(e) => {
                error!(error = %e, "failed to delete client");
                oauth_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to delete client",
                    "admin_client_delete",
                )
            }
        }
    }
}
