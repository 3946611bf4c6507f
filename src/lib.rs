// ABOUTME: Main library entry point for the embeddable OIDC provider
// ABOUTME: Wires the protocol core, persistence contracts, and the host-facing shell
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

//! # oidc-provider
//!
//! An OpenID Connect 1.0 / OAuth 2.0 authorization-code provider with PKCE,
//! designed to be embedded inside a host application. Relying parties redirect
//! end-users to `/authorize`, exchange the resulting code for RS256-signed
//! access and ID tokens plus an opaque refresh token at `/token`, and later
//! rotate or revoke those tokens.
//!
//! ## Features
//!
//! - **Authorization-code grant with PKCE**: only `S256`, verified in constant time
//! - **Refresh-token rotation**: every use mints a successor; replay aborts the chain
//! - **RS256 signing**: single active RSA-2048 key with stable `kid` and JWKS publication
//! - **Pluggable persistence**: in-memory store, or any host key-value backend
//!   through the [`store::KeyValue`] contract
//! - **Hot-reloadable configuration**: the service graph is rebuilt atomically;
//!   a bad reload keeps the previous graph serving
//!
//! ## Architecture
//!
//! The protocol core ([`handlers`]) consumes an abstract request/response
//! surface and never touches the transport. The shell ([`provider`]) owns the
//! service graph and adapts it to an [`axum::Router`] in [`routes`]. The host
//! supplies two things: a [`store::Store`] (or a [`store::KeyValue`] backend)
//! and a [`provider::UserResolver`] that maps its login session to a
//! [`models::UserProfile`].

/// Provider configuration: TTLs, issuer, base path, signing key material
pub mod config;

/// Shared literals: KV group names, grant types, defaults
pub mod constants;

/// Hashing, randomness, constant-time comparison, scope normalization
pub mod crypto;

/// Domain error types and the OAuth wire envelope
pub mod errors;

/// Endpoint state machines over the abstract request/response surface
pub mod handlers;

/// Signing-key lifecycle and JWKS publication
pub mod keys;

/// Persistent records and wire types
pub mod models;

/// PKCE `S256` verification
pub mod pkce;

/// The host-facing shell: service graph, config reload, user resolution
pub mod provider;

/// Axum adaptor for the public and admin endpoint surfaces
pub mod routes;

/// Persistence contract and its in-memory / key-value backends
pub mod store;

/// Token issuance and validation
pub mod token;

pub use config::Config;
pub use errors::{ConfigError, KeyError, OAuthError, StoreError, TokenError};
pub use keys::KeyService;
pub use models::{Client, TokenResponse, UserProfile};
pub use provider::{OidcProvider, UserResolver};
pub use store::{InMemoryStore, KvStore, Store};
pub use token::TokenService;
