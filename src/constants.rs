// ABOUTME: Shared literals used across the provider core
// ABOUTME: KV group names, grant types, auth methods, and configuration defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

/// Key-value group holding client records, keyed by client id.
pub const KV_GROUP_CLIENTS: &str = "oidc_clients";

/// Key-value group holding authorization codes, keyed by code hash.
pub const KV_GROUP_AUTH_CODES: &str = "oidc_auth_codes";

/// Key-value group holding refresh tokens, keyed by token hash.
pub const KV_GROUP_REFRESH_TOKENS: &str = "oidc_refresh_tokens";

/// Key-value group holding consent records, keyed by `<client_id>::<user_id>`.
pub const KV_GROUP_CONSENTS: &str = "oidc_consents";

/// Page size for key-value group listings.
pub const KV_PAGE_SIZE: usize = 200;

pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

pub const AUTH_METHOD_CLIENT_SECRET_POST: &str = "client_secret_post";
pub const AUTH_METHOD_NONE: &str = "none";

pub const CLIENT_STATUS_ACTIVE: &str = "active";

/// Prefix for generated client identifiers.
pub const CLIENT_ID_PREFIX: &str = "cl_";

/// Default mount point for the provider's HTTP surface.
pub const DEFAULT_BASE_PATH: &str = "/api/auth/oidc";

/// Issuer of last resort when neither config nor the host supplies one.
pub const DEFAULT_ISSUER: &str = "http://localhost:8080";

pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];
