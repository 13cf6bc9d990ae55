//! # Socialauth Session
//!
//! State stores holding the values that must survive between the authorize redirect and
//! the provider callback (`redirect_uri`, CSRF `state`) and between requests once a user
//! is authenticated (`auth_token`, `id`, `expires`).

#![warn(missing_docs)]

use async_trait::async_trait;
use socialauth_core::{AuthError, StateStore};
use std::collections::HashMap;
use std::sync::RwLock;

/// An in-memory state store, one instance per browser session.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.values.read().map(|values| values.len()).unwrap_or(0)
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> AuthError {
    AuthError::Session("state store lock poisoned".to_string())
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let values = self.values.read().map_err(|_| poisoned())?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        values.remove(key);
        Ok(())
    }
}

/// A view over another store that prefixes every key with a namespace.
///
/// Several providers can then share one browser session without clobbering each
/// other's `redirect_uri` or `id`.
pub struct ScopedState<'a> {
    inner: &'a dyn StateStore,
    prefix: String,
}

impl<'a> ScopedState<'a> {
    /// Scope `inner` to `namespace`.
    pub fn new(inner: &'a dyn StateStore, namespace: &str) -> Self {
        Self {
            inner,
            prefix: format!("socialauth.{namespace}."),
        }
    }

    /// The fully qualified key written to the underlying store.
    pub fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl<'a> StateStore for ScopedState<'a> {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.inner.get(&self.key(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.inner.set(&self.key(key), value).await
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.inner.remove(&self.key(key)).await
    }

    async fn has(&self, key: &str) -> Result<bool, AuthError> {
        self.inner.has(&self.key(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStateStore::new();
        assert!(!store.has("id").await.unwrap());

        store.set("id", "42").await.unwrap();
        assert_eq!(store.get("id").await.unwrap().as_deref(), Some("42"));
        assert!(store.has("id").await.unwrap());

        store.set("id", "43").await.unwrap();
        assert_eq!(store.get("id").await.unwrap().as_deref(), Some("43"));

        store.remove("id").await.unwrap();
        store.remove("id").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn scoped_views_do_not_collide() {
        let store = MemoryStateStore::new();
        let foursquare = ScopedState::new(&store, "foursquare");
        let instagram = ScopedState::new(&store, "instagram");

        foursquare.set("id", "fsq").await.unwrap();
        instagram.set("id", "ig").await.unwrap();

        assert_eq!(foursquare.get("id").await.unwrap().as_deref(), Some("fsq"));
        assert_eq!(instagram.get("id").await.unwrap().as_deref(), Some("ig"));
        assert_eq!(
            store.get("socialauth.foursquare.id").await.unwrap().as_deref(),
            Some("fsq")
        );
        assert_eq!(store.len(), 2);

        instagram.remove("id").await.unwrap();
        assert!(!instagram.has("id").await.unwrap());
        assert!(foursquare.has("id").await.unwrap());
    }
}
