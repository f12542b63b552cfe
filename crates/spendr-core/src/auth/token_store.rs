//! Durable holder of the access and refresh token strings.
//!
//! The store mirrors both tokens in memory and writes through to a
//! [`TokenStorage`] backend. A failing backend never takes the session down:
//! the first error is logged and the store continues memory-only for the
//! rest of the process lifetime.

use std::sync::Mutex;

use tracing::{debug, warn};

use super::lock;
use super::storage::{FileStorage, KeyringStorage, MemoryStorage, TokenStorage};
use crate::config::{Config, TokenStorageKind};
use crate::models::TokenPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Storage key for this token
    pub fn key(&self) -> &'static str {
        match self {
            TokenKind::Access => "accessToken",
            TokenKind::Refresh => "refreshToken",
        }
    }
}

struct Inner {
    backend: Option<Box<dyn TokenStorage>>,
    access: Option<String>,
    refresh: Option<String>,
}

impl Inner {
    fn slot(&mut self, kind: TokenKind) -> &mut Option<String> {
        match kind {
            TokenKind::Access => &mut self.access,
            TokenKind::Refresh => &mut self.refresh,
        }
    }

    /// Drop the backend after a failure; memory keeps serving this process.
    fn degrade(&mut self, error: anyhow::Error) {
        if let Some(backend) = self.backend.take() {
            warn!(
                backend = backend.name(),
                error = %error,
                "Token storage unavailable, continuing with in-memory session"
            );
        }
    }
}

pub struct TokenStore {
    inner: Mutex<Inner>,
}

impl TokenStore {
    /// Open a store over `backend`, loading any tokens it already holds.
    pub fn new(backend: Box<dyn TokenStorage>) -> Self {
        let mut inner = Inner {
            backend: None,
            access: None,
            refresh: None,
        };

        let loaded = [TokenKind::Access, TokenKind::Refresh]
            .into_iter()
            .map(|kind| backend.get(kind.key()).map(|value| (kind, value)))
            .collect::<anyhow::Result<Vec<_>>>();

        match loaded {
            Ok(values) => {
                for (kind, value) in values {
                    *inner.slot(kind) = value.filter(|v| !v.is_empty());
                }
                debug!(
                    backend = backend.name(),
                    has_access = inner.access.is_some(),
                    has_refresh = inner.refresh.is_some(),
                    "Token store loaded"
                );
                inner.backend = Some(backend);
            }
            Err(e) => {
                inner.backend = Some(backend);
                inner.degrade(e);
            }
        }

        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// Build the store selected by the configuration.
    pub fn from_config(config: &Config) -> Self {
        match config.token_storage {
            TokenStorageKind::Memory => Self::in_memory(),
            TokenStorageKind::Keyring => Self::new(Box::new(KeyringStorage::new())),
            TokenStorageKind::File => match config.cache_dir() {
                Ok(dir) => Self::new(Box::new(FileStorage::new(dir))),
                Err(e) => {
                    warn!(error = %e, "No cache directory, tokens will not persist");
                    Self::in_memory()
                }
            },
        }
    }

    pub fn get(&self, kind: TokenKind) -> Option<String> {
        lock(&self.inner).slot(kind).clone()
    }

    /// Store a token. An empty value is treated as removal.
    pub fn set(&self, kind: TokenKind, value: &str) {
        let mut inner = lock(&self.inner);
        if value.is_empty() {
            *inner.slot(kind) = None;
        } else {
            *inner.slot(kind) = Some(value.to_string());
        }

        let result = match inner.backend.as_ref() {
            Some(backend) if value.is_empty() => backend.remove(kind.key()),
            Some(backend) => backend.set(kind.key(), value),
            None => Ok(()),
        };
        if let Err(e) = result {
            inner.degrade(e);
        }
    }

    /// Remove both tokens. Safe to call when nothing is stored.
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.access = None;
        inner.refresh = None;

        let result = match inner.backend.as_ref() {
            Some(backend) => backend
                .remove(TokenKind::Access.key())
                .and_then(|()| backend.remove(TokenKind::Refresh.key())),
            None => Ok(()),
        };
        if let Err(e) = result {
            inner.degrade(e);
        }
    }

    /// Both tokens, if a complete pair is held
    pub fn pair(&self) -> Option<TokenPair> {
        let inner = lock(&self.inner);
        match (&inner.access, &inner.refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair {
                access: access.clone(),
                refresh: refresh.clone(),
            }),
            _ => None,
        }
    }

    /// Persist a freshly issued pair
    pub fn set_pair(&self, pair: &TokenPair) {
        self.set(TokenKind::Access, &pair.access);
        self.set(TokenKind::Refresh, &pair.refresh);
    }

    /// Whether writes still reach durable storage
    pub fn is_durable(&self) -> bool {
        lock(&self.inner)
            .backend
            .as_ref()
            .map(|b| b.name() != "memory")
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    /// Backend whose every operation fails, like a locked keychain.
    struct BrokenStorage;

    impl TokenStorage for BrokenStorage {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow!("storage unavailable"))
        }
        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow!("storage unavailable"))
        }
        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow!("storage unavailable"))
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    /// Backend that loads fine but fails on write.
    struct ReadOnlyStorage;

    impl TokenStorage for ReadOnlyStorage {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok((key == "accessToken").then(|| "A0".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow!("read-only"))
        }
        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow!("read-only"))
        }
        fn name(&self) -> &'static str {
            "read-only"
        }
    }

    #[test]
    fn test_set_get_clear() {
        let store = TokenStore::in_memory();
        assert_eq!(store.get(TokenKind::Access), None);

        store.set(TokenKind::Access, "A1");
        store.set(TokenKind::Refresh, "R1");
        assert_eq!(store.get(TokenKind::Access).as_deref(), Some("A1"));
        assert_eq!(
            store.pair(),
            Some(TokenPair {
                access: "A1".to_string(),
                refresh: "R1".to_string()
            })
        );

        store.clear();
        assert_eq!(store.get(TokenKind::Access), None);
        assert_eq!(store.get(TokenKind::Refresh), None);
        store.clear();
        assert!(store.pair().is_none());
    }

    #[test]
    fn test_empty_value_is_absent() {
        let store = TokenStore::in_memory();
        store.set(TokenKind::Access, "A1");
        store.set(TokenKind::Access, "");
        assert_eq!(store.get(TokenKind::Access), None);
    }

    #[test]
    fn test_tokens_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = TokenStore::new(Box::new(FileStorage::new(dir.path())));
            store.set_pair(&TokenPair {
                access: "A1".to_string(),
                refresh: "R1".to_string(),
            });
            assert!(store.is_durable());
        }
        let reopened = TokenStore::new(Box::new(FileStorage::new(dir.path())));
        assert_eq!(reopened.get(TokenKind::Access).as_deref(), Some("A1"));
        assert_eq!(reopened.get(TokenKind::Refresh).as_deref(), Some("R1"));
    }

    #[test]
    fn test_unavailable_storage_degrades_to_memory() {
        let store = TokenStore::new(Box::new(BrokenStorage));
        assert!(!store.is_durable());
        assert_eq!(store.get(TokenKind::Access), None);

        store.set(TokenKind::Access, "A1");
        assert_eq!(store.get(TokenKind::Access).as_deref(), Some("A1"));
        store.clear();
        assert_eq!(store.get(TokenKind::Access), None);
    }

    #[test]
    fn test_write_failure_keeps_session_in_memory() {
        let store = TokenStore::new(Box::new(ReadOnlyStorage));
        assert_eq!(store.get(TokenKind::Access).as_deref(), Some("A0"));
        assert!(store.is_durable());

        store.set(TokenKind::Access, "A1");
        assert!(!store.is_durable());
        assert_eq!(store.get(TokenKind::Access).as_deref(), Some("A1"));
    }
}
