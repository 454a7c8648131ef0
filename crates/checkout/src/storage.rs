//! Durable persistence for the in-progress checkout draft.
//!
//! The draft is mirrored to a key-value [`StorageMedium`] (browser local
//! storage, a session file, an in-memory map in tests) under a fixed
//! namespace key, with a 30-day expiry. Storage failures never surface to
//! the flow: every operation degrades to "no saved data" / no-op with a
//! `tracing` warning, because a disabled storage medium must not block
//! checkout.
//!
//! Two browser tabs sharing one medium can race on field-level saves; the
//! design accepts last-write-wins for that cross-tab case.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tidewater_core::CartId;

use crate::draft::CheckoutDraft;

/// Namespace key for the persisted draft document.
pub const DRAFT_KEY: &str = "checkout_data_v1";
/// Namespace key for the cached remote cart ID.
pub const CART_ID_KEY: &str = "cart_id_v1";
/// Timestamp field stamped into the persisted document.
pub const SAVED_AT_KEY: &str = "savedAtEpochMillis";
/// Age after which a persisted draft is treated as absent and purged.
pub const DRAFT_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Error from the underlying storage medium.
#[derive(thiserror::Error, Debug, Clone)]
pub enum StorageError {
    /// The medium is disabled or inaccessible in this environment.
    #[error("storage medium unavailable")]
    Unavailable,
    /// The medium failed mid-operation.
    #[error("storage operation failed: {0}")]
    Backend(String),
}

/// A durable string key-value store.
///
/// Implementations must be usable through a shared reference; the draft
/// store serializes access on top.
pub trait StorageMedium {
    /// Read the value under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the medium is unavailable.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the medium is unavailable.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the medium is unavailable.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory [`StorageMedium`] for tests and ephemeral embedders.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<HashMap<String, String>>,
}

impl StorageMedium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

impl MemoryMedium {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned lock means a panic mid-insert on a plain HashMap;
        // the map itself is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Persists the checkout draft and the cached cart ID.
///
/// Cheap to clone; clones share the same medium so the flow and the
/// session orchestrator see one record.
#[derive(Debug)]
pub struct DraftStore<M> {
    medium: Arc<M>,
}

impl<M> Clone for DraftStore<M> {
    fn clone(&self) -> Self {
        Self {
            medium: Arc::clone(&self.medium),
        }
    }
}

impl<M: StorageMedium> DraftStore<M> {
    /// Create a store over the given medium.
    pub fn new(medium: M) -> Self {
        Self {
            medium: Arc::new(medium),
        }
    }

    /// Merge `draft` into the stored record and stamp the save time.
    ///
    /// Keys already in the stored document but absent from the draft's
    /// serialization are left untouched.
    pub fn save(&self, draft: &CheckoutDraft) {
        let patch = match serde_json::to_value(draft) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!("checkout draft did not serialize to an object; skipping save");
                return;
            }
        };
        self.merge_and_write(patch);
    }

    /// Load the stored draft, purging it first if older than the TTL.
    #[must_use]
    pub fn load(&self) -> Option<CheckoutDraft> {
        let raw = self.load_unexpired()?;
        match serde_json::from_value(Value::Object(raw)) {
            Ok(draft) => Some(draft),
            Err(e) => {
                tracing::warn!(error = %e, "persisted draft is malformed; discarding");
                self.clear();
                None
            }
        }
    }

    /// Remove the stored draft.
    pub fn clear(&self) {
        if let Err(e) = self.medium.remove(DRAFT_KEY) {
            tracing::warn!(error = %e, "failed to clear persisted draft");
        }
    }

    /// Read-modify-write a single key of the stored document.
    ///
    /// Unrelated keys written by other steps are preserved, so field-level
    /// saves from different steps never clobber each other.
    pub fn save_field(&self, key: &str, value: Value) {
        let mut patch = Map::new();
        patch.insert(key.to_owned(), value);
        self.merge_and_write(patch);
    }

    /// Read a single key of the stored document.
    #[must_use]
    pub fn load_field(&self, key: &str) -> Option<Value> {
        self.load_unexpired()?.get(key).cloned()
    }

    /// Cache the remote cart ID (no TTL; the remote cart has its own
    /// lifetime and stale IDs self-heal in the session layer).
    pub fn cache_cart_id(&self, cart_id: &CartId) {
        if let Err(e) = self.medium.set(CART_ID_KEY, cart_id.as_str()) {
            tracing::warn!(error = %e, "failed to cache cart id");
        }
    }

    /// The cached remote cart ID, if any.
    #[must_use]
    pub fn cached_cart_id(&self) -> Option<CartId> {
        match self.medium.get(CART_ID_KEY) {
            Ok(Some(id)) if !id.is_empty() => Some(CartId::new(id)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cached cart id");
                None
            }
        }
    }

    /// Drop the cached remote cart ID.
    pub fn forget_cart_id(&self) {
        if let Err(e) = self.medium.remove(CART_ID_KEY) {
            tracing::warn!(error = %e, "failed to forget cached cart id");
        }
    }

    /// Load the raw stored document, enforcing the TTL.
    fn load_unexpired(&self) -> Option<Map<String, Value>> {
        let text = match self.medium.get(DRAFT_KEY) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "storage unavailable; treating draft as absent");
                return None;
            }
        };

        let map = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::warn!("persisted draft is not a JSON object; discarding");
                self.clear();
                return None;
            }
        };

        let saved_at = map.get(SAVED_AT_KEY).and_then(Value::as_i64).unwrap_or(0);
        let age = now_ms().saturating_sub(saved_at);
        if age > DRAFT_TTL_MS {
            tracing::debug!(age_ms = age, "persisted draft expired; purging");
            self.clear();
            return None;
        }

        Some(map)
    }

    fn merge_and_write(&self, patch: Map<String, Value>) {
        let mut doc = self.load_unexpired().unwrap_or_default();
        for (key, value) in patch {
            doc.insert(key, value);
        }
        doc.insert(SAVED_AT_KEY.to_owned(), Value::from(now_ms()));

        let text = match serde_json::to_string(&Value::Object(doc)) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize draft");
                return;
            }
        };
        if let Err(e) = self.medium.set(DRAFT_KEY, &text) {
            tracing::warn!(error = %e, "storage unavailable; draft not saved");
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
