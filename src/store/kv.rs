// ABOUTME: Store implementation over a host key-value backend
// ABOUTME: JSON records in four groups; coarse mutex stands in for missing CAS
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

//! Key-value backed store.
//!
//! The backend contract has no conditional writes, so the three linearizable
//! primitives (`consume_auth_code`, `revoke_refresh_token`,
//! `rotate_refresh_token`) serialize through one process-wide mutex. A
//! backend with CAS should replace this with per-key conditional updates;
//! the `Store` contract itself does not change.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::constants::{
    KV_GROUP_AUTH_CODES, KV_GROUP_CLIENTS, KV_GROUP_CONSENTS, KV_GROUP_REFRESH_TOKENS,
    KV_PAGE_SIZE,
};
use crate::crypto::{normalize_scopes, sha256_hex};
use crate::errors::{KvError, StoreError};
use crate::models::{AuthCodeRecord, Client, ConsentRecord, RefreshTokenRecord};

use super::{
    check_client_secret, consent_key, finalize_new_client, generate_client_id,
    merge_client_update, Store,
};

/// The host's key-value contract. Values are opaque strings; the store keeps
/// JSON in them. Group listing is paginated, `page` starting at 1.
#[async_trait]
pub trait KeyValue: Send + Sync {
    async fn get(&self, group: &str, key: &str) -> Result<Option<String>, KvError>;
    async fn set(&self, group: &str, key: &str, value: &str) -> Result<(), KvError>;
    async fn del(&self, group: &str, key: &str) -> Result<(), KvError>;
    async fn get_group(
        &self,
        group: &str,
        page: usize,
        page_size: usize,
    ) -> Result<HashMap<String, String>, KvError>;
}

/// [`Store`] over a host [`KeyValue`] backend.
pub struct KvStore<K> {
    backend: K,
    /// Serializes the linearizable primitives; see module docs.
    critical: Mutex<()>,
}

impl<K: KeyValue> KvStore<K> {
    #[must_use]
    pub fn new(backend: K) -> Self {
        Self {
            backend,
            critical: Mutex::new(()),
        }
    }

    async fn save_json<T: Serialize>(
        &self,
        group: &str,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(value).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.backend.set(group, key, &payload).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        group: &str,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.backend.get(group, key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(value))
    }

    async fn list_group(&self, group: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut result = HashMap::new();
        for page in 1.. {
            let items = self.backend.get_group(group, page, KV_PAGE_SIZE).await?;
            if items.is_empty() {
                break;
            }
            let len = items.len();
            result.extend(items);
            if len < KV_PAGE_SIZE {
                break;
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl<K: KeyValue> Store for KvStore<K> {
    async fn create_client(
        &self,
        template: Client,
        raw_secret: &str,
    ) -> Result<(Client, String), StoreError> {
        let mut client = template;
        client.id = client.id.trim().to_owned();
        if client.id.is_empty() {
            // retry until a free id is found; collisions on 24 random bytes
            // are astronomically rare but the read is cheap
            loop {
                let candidate = generate_client_id()?;
                if self
                    .get_json::<Client>(KV_GROUP_CLIENTS, &candidate)
                    .await?
                    .is_none()
                {
                    client.id = candidate;
                    break;
                }
            }
        } else if self
            .get_json::<Client>(KV_GROUP_CLIENTS, &client.id)
            .await?
            .is_some()
        {
            return Err(StoreError::ClientExists);
        }

        let raw_secret = finalize_new_client(&mut client, raw_secret, Utc::now())?;
        self.save_json(KV_GROUP_CLIENTS, &client.id, &client).await?;
        Ok((client, raw_secret))
    }

    async fn get_client(&self, id: &str) -> Result<Client, StoreError> {
        self.get_json(KV_GROUP_CLIENTS, id)
            .await?
            .ok_or(StoreError::ClientNotFound)
    }

    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        let rows = self.list_group(KV_GROUP_CLIENTS).await?;
        let mut out = Vec::with_capacity(rows.len());
        for (key, raw) in rows {
            match serde_json::from_str::<Client>(&raw) {
                Ok(client) => out.push(client),
                Err(e) => warn!(key = %key, error = %e, "skipping undecodable client record"),
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn update_client(&self, client: Client) -> Result<Client, StoreError> {
        let mut current = self.get_client(&client.id).await?;
        merge_client_update(&mut current, client, Utc::now());
        self.save_json(KV_GROUP_CLIENTS, &current.id, &current).await?;
        Ok(current)
    }

    async fn delete_client(&self, id: &str) -> Result<(), StoreError> {
        // existence check so a missing client surfaces as ClientNotFound
        let _ = self.get_client(id).await?;
        self.backend.del(KV_GROUP_CLIENTS, id).await?;
        Ok(())
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
        self.save_json(KV_GROUP_AUTH_CODES, &record.code_hash, &record)
            .await
    }

    async fn consume_auth_code(
        &self,
        raw_code: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthCodeRecord, StoreError> {
        let _guard = self.critical.lock().await;
        let code_hash = sha256_hex(raw_code);
        let mut record: AuthCodeRecord = self
            .get_json(KV_GROUP_AUTH_CODES, &code_hash)
            .await?
            .ok_or(StoreError::AuthCodeNotFound)?;
        if record.consumed_at.is_some() {
            return Err(StoreError::AuthCodeConsumed);
        }
        if now > record.expires_at {
            return Err(StoreError::AuthCodeExpired);
        }
        record.consumed_at = Some(now);
        self.save_json(KV_GROUP_AUTH_CODES, &code_hash, &record).await?;
        Ok(record)
    }

    async fn save_refresh_token(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        self.save_json(KV_GROUP_REFRESH_TOKENS, &record.token_hash, &record)
            .await
    }

    async fn get_refresh_token(
        &self,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let record: RefreshTokenRecord = self
            .get_json(KV_GROUP_REFRESH_TOKENS, &sha256_hex(raw_token))
            .await?
            .ok_or(StoreError::RefreshTokenNotFound)?;
        if record.revoked_at.is_some() {
            return Err(StoreError::RefreshTokenRevoked);
        }
        if now > record.expires_at {
            return Err(StoreError::RefreshTokenExpired);
        }
        Ok(record)
    }

    async fn revoke_refresh_token(
        &self,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let _guard = self.critical.lock().await;
        let token_hash = sha256_hex(raw_token);
        let Some(mut record) = self
            .get_json::<RefreshTokenRecord>(KV_GROUP_REFRESH_TOKENS, &token_hash)
            .await?
        else {
            return Ok(());
        };
        if record.revoked_at.is_some() {
            return Ok(());
        }
        record.revoked_at = Some(now);
        self.save_json(KV_GROUP_REFRESH_TOKENS, &token_hash, &record).await
    }

    async fn rotate_refresh_token(
        &self,
        old_raw_token: &str,
        new_record: RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let _guard = self.critical.lock().await;
        let old_hash = sha256_hex(old_raw_token);
        let mut old_record: RefreshTokenRecord = self
            .get_json(KV_GROUP_REFRESH_TOKENS, &old_hash)
            .await?
            .ok_or(StoreError::RefreshTokenNotFound)?;
        if old_record.revoked_at.is_some() {
            return Err(StoreError::RefreshTokenReplay);
        }
        old_record.revoked_at = Some(now);
        self.save_json(KV_GROUP_REFRESH_TOKENS, &old_hash, &old_record).await?;
        self.save_json(KV_GROUP_REFRESH_TOKENS, &new_record.token_hash, &new_record)
            .await
    }

    async fn save_consent(&self, record: ConsentRecord) -> Result<(), StoreError> {
        let key = consent_key(&record.client_id, &record.user_id);
        let now = Utc::now();
        let mut record = record;
        if let Some(existing) = self.get_json::<ConsentRecord>(KV_GROUP_CONSENTS, &key).await? {
            record.granted_at = existing.granted_at;
        } else {
            record.granted_at = now;
        }
        record.updated_at = now;
        record.scope = normalize_scopes(&record.scope);
        self.save_json(KV_GROUP_CONSENTS, &key, &record).await
    }

    async fn get_consent(
        &self,
        client_id: &str,
        user_id: &str,
    ) -> Result<ConsentRecord, StoreError> {
        self.get_json(KV_GROUP_CONSENTS, &consent_key(client_id, user_id))
            .await?
            .ok_or(StoreError::ConsentNotFound)
    }
}

/// In-process [`KeyValue`] backend for tests and examples. Group listings
/// come back in key order, so pagination is deterministic.
#[derive(Default)]
pub struct MemoryKv {
    groups: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValue for MemoryKv {
    async fn get(&self, group: &str, key: &str) -> Result<Option<String>, KvError> {
        let groups = self.groups.read().await;
        Ok(groups.get(group).and_then(|g| g.get(key).cloned()))
    }

    async fn set(&self, group: &str, key: &str, value: &str) -> Result<(), KvError> {
        let mut groups = self.groups.write().await;
        groups
            .entry(group.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn del(&self, group: &str, key: &str) -> Result<(), KvError> {
        let mut groups = self.groups.write().await;
        if let Some(g) = groups.get_mut(group) {
            g.remove(key);
        }
        Ok(())
    }

    async fn get_group(
        &self,
        group: &str,
        page: usize,
        page_size: usize,
    ) -> Result<HashMap<String, String>, KvError> {
        if page == 0 {
            return Err(KvError::new("page numbering starts at 1"));
        }
        let groups = self.groups.read().await;
        let Some(g) = groups.get(group) else {
            return Ok(HashMap::new());
        };
        Ok(g.iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
