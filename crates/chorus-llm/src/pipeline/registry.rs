//! Process-wide table of cancellation handles keyed by abort key

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// Cancellation handles for in-flight top-level requests
///
/// Several requests may share a key; aborting the key cancels all of them.
/// Entries are removed by their [`AbortGuard`] when the request ends.
#[derive(Debug, Default)]
pub struct AbortRegistry {
    entries: DashMap<String, Vec<(u64, CancellationToken)>>,
    next_id: AtomicU64,
}

impl AbortRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token under `key` until the returned guard drops
    pub fn register(self: &Arc<Self>, key: impl Into<String>, token: CancellationToken) -> AbortGuard {
        let key = key.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.entry(key.clone()).or_default().push((id, token));
        tracing::debug!(abort_key = %key, "registered abort handle");

        AbortGuard {
            registry: Arc::clone(self),
            key,
            id,
        }
    }

    /// Cancel every request registered under `key`
    ///
    /// Returns whether anything was registered. Safe to call repeatedly.
    pub fn abort(&self, key: &str) -> bool {
        let tokens: Vec<CancellationToken> = self
            .entries
            .get(key)
            .map(|entry| entry.iter().map(|(_, token)| token.clone()).collect())
            .unwrap_or_default();

        // cancel outside the shard lock
        for token in &tokens {
            token.cancel();
        }

        if !tokens.is_empty() {
            tracing::info!(abort_key = %key, requests = tokens.len(), "aborted");
        }
        !tokens.is_empty()
    }

    /// Drop every handle registered under `key` without cancelling
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Whether any request is registered under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn release(&self, key: &str, id: u64) {
        self.entries.remove_if_mut(key, |_, handles| {
            handles.retain(|(entry, _)| *entry != id);
            handles.is_empty()
        });
    }
}

/// Keeps a registry entry alive; removes exactly that entry on drop
#[derive(Debug)]
pub struct AbortGuard {
    registry: Arc<AbortRegistry>,
    key: String,
    id: u64,
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_cancels_every_request_under_key() {
        let registry = Arc::new(AbortRegistry::new());
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        let _a = registry.register("msg-1", first.clone());
        let _b = registry.register("msg-1", second.clone());

        assert!(registry.abort("msg-1"));
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert!(registry.abort("msg-1"));
    }

    #[test]
    fn guard_removes_only_its_entry() {
        let registry = Arc::new(AbortRegistry::new());
        let kept = CancellationToken::new();
        let guard = registry.register("msg-1", CancellationToken::new());
        let _other = registry.register("msg-1", kept.clone());

        drop(guard);
        assert!(registry.contains("msg-1"));

        registry.abort("msg-1");
        assert!(kept.is_cancelled());
    }

    #[test]
    fn last_guard_clears_key() {
        let registry = Arc::new(AbortRegistry::new());
        let guard = registry.register("msg-1", CancellationToken::new());
        drop(guard);

        assert!(!registry.contains("msg-1"));
        assert!(!registry.abort("msg-1"));
    }

    #[test]
    fn unrelated_keys_do_not_interfere() {
        let registry = Arc::new(AbortRegistry::new());
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let _ga = registry.register("a", a.clone());
        let _gb = registry.register("b", b.clone());

        registry.abort("a");
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
    }

    #[test]
    fn remove_drops_without_cancelling() {
        let registry = Arc::new(AbortRegistry::new());
        let token = CancellationToken::new();
        let guard = registry.register("a", token.clone());

        assert!(registry.remove("a"));
        assert!(!token.is_cancelled());
        drop(guard);
        assert!(!registry.contains("a"));
    }
}
