// ABOUTME: Host-facing provider shell: service graph, config hot-reload, user resolution
// ABOUTME: A request sees either the whole old graph or the whole new graph, never a mix
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

//! Provider shell.
//!
//! [`OidcProvider`] owns an immutable service graph behind a reader-writer
//! lock. A configuration change parses and rebuilds the whole graph and
//! swaps it in one step; in-flight requests keep executing against the old
//! graph. A reload that fails (bad key PEM, bad payload) leaves the previous
//! graph serving.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use http::Extensions;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::Config;
use crate::errors::{ConfigError, KeyError};
use crate::handlers::{
    AdminClientHandler, AuthorizeHandler, MetadataHandler, RevokeHandler, TokenGrantHandler,
    UserInfoHandler,
};
use crate::keys::KeyService;
use crate::models::UserProfile;
use crate::store::Store;
use crate::token::TokenService;

/// Host contract for mapping requests and subjects to user profiles.
///
/// The host adapter knows where its login middleware parks the session (a
/// typed value in the request extensions) and how to materialize a
/// [`UserProfile`] from it. The core never inspects host types.
pub trait UserResolver: Send + Sync {
    /// Resolve the logged-in user behind an authorization request, if any.
    fn resolve_request_user(&self, extensions: &Extensions) -> Option<UserProfile>;

    /// Resolve a profile by stable subject id, for the userinfo endpoint.
    fn resolve_user_by_id(&self, user_id: &str) -> Option<UserProfile>;
}

/// Wraps the host resolver with a profile cache and field fallbacks:
/// profiles seen at authorize time stay available to the userinfo leg even
/// when the host cannot resolve by id, an empty username falls back to the
/// id, and an empty display name falls back to the username.
pub struct CachingUserResolver {
    host: Arc<dyn UserResolver>,
    cache: StdRwLock<HashMap<String, UserProfile>>,
}

impl CachingUserResolver {
    #[must_use]
    pub fn new(host: Arc<dyn UserResolver>) -> Self {
        Self {
            host,
            cache: StdRwLock::new(HashMap::new()),
        }
    }

    fn normalize_and_cache(&self, mut user: UserProfile) -> Option<UserProfile> {
        if user.id.trim().is_empty() {
            return None;
        }
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(&user.id) {
            if user.username.is_empty() {
                user.username = cached.username.clone();
            }
            if user.email.is_empty() {
                user.email = cached.email.clone();
            }
            if user.name.is_empty() {
                user.name = cached.name.clone();
            }
        }
        if user.username.is_empty() {
            user.username = user.id.clone();
        }
        if user.name.is_empty() {
            user.name = user.username.clone();
        }
        cache.insert(user.id.clone(), user.clone());
        Some(user)
    }
}

impl UserResolver for CachingUserResolver {
    fn resolve_request_user(&self, extensions: &Extensions) -> Option<UserProfile> {
        let user = self.host.resolve_request_user(extensions)?;
        self.normalize_and_cache(user)
    }

    fn resolve_user_by_id(&self, user_id: &str) -> Option<UserProfile> {
        if let Some(user) = self.host.resolve_user_by_id(user_id) {
            return self.normalize_and_cache(user);
        }
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(user_id).cloned()
    }
}

/// The immutable service graph. Built as a whole, swapped as a whole.
pub struct Services {
    pub config: Config,
    pub keys: Arc<KeyService>,
    pub tokens: Arc<TokenService>,
    pub authorize: AuthorizeHandler,
    pub token_grant: TokenGrantHandler,
    pub userinfo: UserInfoHandler,
    pub revoke: RevokeHandler,
    pub metadata: MetadataHandler,
    pub admin: AdminClientHandler,
}

impl Services {
    fn build(
        config: &Config,
        store: &Arc<dyn Store>,
        resolver: &Arc<CachingUserResolver>,
    ) -> Result<Self, KeyError> {
        let config = config.normalize();
        let keys = Arc::new(KeyService::new(config.private_key_pem.as_deref())?);
        let tokens = Arc::new(TokenService::new(&config, Arc::clone(&keys)));
        let resolver: Arc<dyn UserResolver> = resolver.clone();
        Ok(Self {
            authorize: AuthorizeHandler::new(Arc::clone(store), &config, Arc::clone(&resolver)),
            token_grant: TokenGrantHandler::new(Arc::clone(store), Arc::clone(&tokens)),
            userinfo: UserInfoHandler::new(Arc::clone(&tokens), resolver),
            revoke: RevokeHandler::new(Arc::clone(store)),
            metadata: MetadataHandler::new(&config, Arc::clone(&keys)),
            admin: AdminClientHandler::new(Arc::clone(store)),
            config,
            keys,
            tokens,
        })
    }
}

struct ProviderState {
    config: Config,
    services: Arc<Services>,
}

/// Process-wide provider instance.
pub struct OidcProvider {
    store: Arc<dyn Store>,
    resolver: Arc<CachingUserResolver>,
    site_url: String,
    state: RwLock<ProviderState>,
}

impl OidcProvider {
    /// Build the provider and its first service graph. Key material is
    /// parsed or generated here, before the first request is served.
    ///
    /// `site_url` is the host's public URL, used as the issuer fallback.
    ///
    /// # Errors
    /// Returns [`KeyError`] if the configured private key cannot be used.
    pub fn new(
        store: Arc<dyn Store>,
        resolver: Arc<dyn UserResolver>,
        config: Config,
        site_url: &str,
    ) -> Result<Self, KeyError> {
        let resolver = Arc::new(CachingUserResolver::new(resolver));
        let config = config.with_fallback_issuer(site_url);
        let services = Services::build(&config, &store, &resolver)?;
        info!(issuer = %config.issuer, base_path = %config.base_path, "oidc provider initialized");
        Ok(Self {
            store,
            resolver,
            site_url: site_url.to_owned(),
            state: RwLock::new(ProviderState {
                config,
                services: Arc::new(services),
            }),
        })
    }

    /// Apply a host-supplied configuration payload.
    ///
    /// The new graph is built under the write lock and swapped atomically.
    /// On any failure the previous configuration remains in force.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for an unparseable payload or unusable key.
    pub async fn apply_config(&self, payload: &[u8]) -> Result<(), ConfigError> {
        let mut state = self.state.write().await;
        let next = state
            .config
            .apply_payload(payload)?
            .with_fallback_issuer(&self.site_url);
        let services = Services::build(&next, &self.store, &self.resolver).map_err(|e| {
            error!(error = %e, "configuration reload rejected");
            e
        })?;
        info!(issuer = %next.issuer, base_path = %next.base_path, "oidc provider reconfigured");
        state.config = next;
        state.services = Arc::new(services);
        Ok(())
    }

    /// The current service graph. Requests hold the returned `Arc` for
    /// their whole lifetime, so a concurrent reload never mixes graphs.
    pub async fn snapshot(&self) -> Arc<Services> {
        let state = self.state.read().await;
        Arc::clone(&state.services)
    }

    /// The current normalized configuration.
    pub async fn config(&self) -> Config {
        let state = self.state.read().await;
        state.config.clone()
    }

    /// The base path the HTTP surface is mounted under.
    pub async fn base_path(&self) -> String {
        let state = self.state.read().await;
        state.config.base_path.clone()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
