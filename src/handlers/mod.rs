// ABOUTME: Abstract request/response surface consumed by the endpoint handlers
// ABOUTME: Keeps the protocol core independent of the host transport
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

//! Endpoint handlers.
//!
//! Every handler consumes an [`OidcRequest`] and produces an
//! [`OidcResponse`]; the axum adaptor in [`crate::routes`] converts between
//! these and real HTTP. Tests drive handlers directly through the same
//! surface.

mod admin;
mod authorize;
mod metadata;
mod revoke;
mod token;
mod userinfo;

pub use admin::AdminClientHandler;
pub use authorize::AuthorizeHandler;
pub use metadata::MetadataHandler;
pub use revoke::RevokeHandler;
pub use token::TokenGrantHandler;
pub use userinfo::UserInfoHandler;

use std::collections::HashMap;

use http::{Extensions, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::OAuthError;

/// Transport-agnostic view of an incoming request: query parameters, form
/// fields, headers (lower-cased names), the host's request extensions (where
/// its login middleware parks the authenticated session), and an optional
/// JSON body for the admin surface.
#[derive(Default)]
pub struct OidcRequest {
    query: HashMap<String, String>,
    form: HashMap<String, String>,
    headers: HashMap<String, String>,
    extensions: Extensions,
    body: Option<serde_json::Value>,
}

impl OidcRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Query parameter by name; empty string when absent.
    #[must_use]
    pub fn query(&self, key: &str) -> &str {
        self.query.get(key).map_or("", String::as_str)
    }

    /// Form field by name; empty string when absent.
    #[must_use]
    pub fn form_value(&self, key: &str) -> &str {
        self.form.get(key).map_or("", String::as_str)
    }

    /// Header by case-insensitive name; empty string when absent.
    #[must_use]
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map_or("", String::as_str)
    }

    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Decode the JSON body into a request DTO.
    ///
    /// # Errors
    /// Fails when no body is present or it does not match `T`.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            Some(value) => serde_json::from_value(value.clone()),
            None => serde_json::from_value(serde_json::Value::Null),
        }
    }

    // Builder-style setters used by the transport adaptor and by tests.

    #[must_use]
    pub fn with_query<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn with_form<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        self.form
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Transport-agnostic response produced by the handlers.
#[derive(Debug, Clone)]
pub enum OidcResponse {
    Json {
        status: StatusCode,
        body: serde_json::Value,
    },
    /// 302 Found back to the relying party.
    Redirect { location: String },
    /// Status with an empty body (revoke 200, admin delete 204).
    Empty { status: StatusCode },
}

impl OidcResponse {
    #[must_use]
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self::Json { status, body }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json { status, .. } | Self::Empty { status } => *status,
            Self::Redirect { .. } => StatusCode::FOUND,
        }
    }

    /// The JSON body, if this is a JSON response.
    #[must_use]
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The redirect location, if this is a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location } => Some(location),
            _ => None,
        }
    }
}

/// Write the standard OAuth error envelope.
pub(crate) fn oauth_error(
    status: StatusCode,
    code: &str,
    description: &str,
    trace_id: &str,
) -> OidcResponse {
    let envelope = OAuthError::new(code, description, trace_id);
    OidcResponse::json(
        status,
        serde_json::to_value(envelope).unwrap_or(serde_json::Value::Null),
    )
}

/// 401 `invalid_token` for bearer-token failures.
pub(crate) fn unauthorized_token(trace_id: &str) -> OidcResponse {
    oauth_error(
        StatusCode::UNAUTHORIZED,
        "invalid_token",
        "access token is invalid",
        trace_id,
    )
}
