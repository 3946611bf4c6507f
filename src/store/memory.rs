// ABOUTME: In-memory Store implementation used by tests and single-node hosts
// ABOUTME: One writer lock over plain maps; linearizable primitives by construction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::crypto::{normalize_scopes, sha256_hex};
use crate::errors::StoreError;
use crate::models::{AuthCodeRecord, Client, ConsentRecord, RefreshTokenRecord};

use super::{
    check_client_secret, consent_key, finalize_new_client, generate_client_id,
    merge_client_update, Store,
};

/// Everything behind a single lock; no `.await` happens while it is held,
/// so the consume/rotate/revoke primitives are trivially linearizable.
#[derive(Default)]
struct Inner {
    clients: HashMap<String, Client>,
    auth_codes: HashMap<String, AuthCodeRecord>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    consents: HashMap<String, ConsentRecord>,
}

/// In-memory [`Store`] backend.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_client(
        &self,
        template: Client,
        raw_secret: &str,
    ) -> Result<(Client, String), StoreError> {
        let mut inner = self.inner.write().await;
        let mut client = template;
        client.id = client.id.trim().to_owned();
        if client.id.is_empty() {
            client.id = generate_client_id()?;
        } else if inner.clients.contains_key(&client.id) {
            return Err(StoreError::ClientExists);
        }
        let raw_secret = finalize_new_client(&mut client, raw_secret, Utc::now())?;
        inner.clients.insert(client.id.clone(), client.clone());
        Ok((client, raw_secret))
    }

    async fn get_client(&self, id: &str) -> Result<Client, StoreError> {
        let inner = self.inner.read().await;
        inner.clients.get(id).cloned().ok_or(StoreError::ClientNotFound)
    }

    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        let inner = self.inner.read().await;
        let mut out: Vec<Client> = inner.clients.values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn update_client(&self, client: Client) -> Result<Client, StoreError> {
        let mut inner = self.inner.write().await;
        let current = inner
            .clients
            .get_mut(&client.id)
            .ok_or(StoreError::ClientNotFound)?;
        merge_client_update(current, client, Utc::now());
        Ok(current.clone())
    }

    async fn delete_client(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .clients
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::ClientNotFound)
    }

    async fn validate_client_secret(
        &self,
        client_id: &str,
        raw_secret: &str,
    ) -> Result<Client, StoreError> {
        let client = self.get_client(client_id).await?;
        check_client_secret(&client, raw_secret)?;
        Ok(client)
    }

    async fn save_auth_code(&self, record: AuthCodeRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.auth_codes.insert(record.code_hash.clone(), record);
        Ok(())
    }

    async fn consume_auth_code(
        &self,
        raw_code: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthCodeRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let hash = sha256_hex(raw_code);
        let record = inner
            .auth_codes
            .get_mut(&hash)
            .ok_or(StoreError::AuthCodeNotFound)?;
        if record.consumed_at.is_some() {
            return Err(StoreError::AuthCodeConsumed);
        }
        if now > record.expires_at {
            return Err(StoreError::AuthCodeExpired);
        }
        record.consumed_at = Some(now);
        Ok(record.clone())
    }

    async fn save_refresh_token(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.refresh_tokens.insert(record.token_hash.clone(), record);
        Ok(())
    }

    async fn get_refresh_token(
        &self,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let inner = self.inner.read().await;
        let record = inner
            .refresh_tokens
            .get(&sha256_hex(raw_token))
            .ok_or(StoreError::RefreshTokenNotFound)?;
        if record.revoked_at.is_some() {
            return Err(StoreError::RefreshTokenRevoked);
        }
        if now > record.expires_at {
            return Err(StoreError::RefreshTokenExpired);
        }
        Ok(record.clone())
    }

    async fn revoke_refresh_token(
        &self,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.refresh_tokens.get_mut(&sha256_hex(raw_token)) {
            if record.revoked_at.is_none() {
                record.revoked_at = Some(now);
            }
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        old_raw_token: &str,
        new_record: RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let old_hash = sha256_hex(old_raw_token);
        let old_record = inner
            .refresh_tokens
            .get_mut(&old_hash)
            .ok_or(StoreError::RefreshTokenNotFound)?;
        if old_record.revoked_at.is_some() {
            return Err(StoreError::RefreshTokenReplay);
        }
        old_record.revoked_at = Some(now);
        inner
            .refresh_tokens
            .insert(new_record.token_hash.clone(), new_record);
        Ok(())
    }

    async fn save_consent(&self, record: ConsentRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = consent_key(&record.client_id, &record.user_id);
        let now = Utc::now();
        let mut record = record;
        // granted_at is set once; updates only move updated_at forward
        if let Some(existing) = inner.consents.get(&key) {
            record.granted_at = existing.granted_at;
        } else {
            record.granted_at = now;
        }
        record.updated_at = now;
        record.scope = normalize_scopes(&record.scope);
        inner.consents.insert(key, record);
        Ok(())
    }

    async fn get_consent(
        &self,
        client_id: &str,
        user_id: &str,
    ) -> Result<ConsentRecord, StoreError> {
        let inner = self.inner.read().await;
        inner
            .consents
            .get(&consent_key(client_id, user_id))
            .cloned()
            .ok_or(StoreError::ConsentNotFound)
    }
}
