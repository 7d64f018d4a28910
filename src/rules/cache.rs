// Read-through cache in front of the rule table
//
// Writes made through the engine invalidate the affected keys before they
// return, so they are visible to the next resolution immediately. Writes
// made by another process are picked up once the entry expires, at most
// `ttl_seconds` later.

use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::{TransitionKey, TransitionRule};
use crate::config::CacheConfig;
use crate::error::StoreError;
use crate::observability::engine_metrics;

#[derive(Clone)]
pub struct RuleCache {
    entries: Option<Cache<TransitionKey, Option<TransitionRule>>>,
    // Loads hold the read side across fetch + insert; invalidations take the
    // write side, so a load that started before an invalidation can never
    // re-insert the stale value after it.
    gate: Arc<RwLock<()>>,
}

impl std::fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCache")
            .field("enabled", &self.entries.is_some())
            .finish()
    }
}

impl RuleCache {
    pub fn new(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();
        Self {
            entries: Some(entries),
            gate: Arc::new(RwLock::new(())),
        }
    }

    pub fn disabled() -> Self {
        Self {
            entries: None,
            gate: Arc::new(RwLock::new(())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Return the cached lookup for `key`, or run `load` and remember its result
    pub async fn get_or_load<F, Fut>(
        &self,
        key: TransitionKey,
        load: F,
    ) -> Result<Option<TransitionRule>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<TransitionRule>, StoreError>>,
    {
        let Some(entries) = &self.entries else {
            return load().await;
        };

        let _guard = self.gate.read().await;
        if let Some(cached) = entries.get(&key).await {
            engine_metrics().record_cache_hit();
            return Ok(cached);
        }

        engine_metrics().record_cache_miss();
        let loaded = load().await?;
        entries.insert(key, loaded.clone()).await;
        Ok(loaded)
    }

    pub async fn invalidate(&self, keys: &[TransitionKey]) {
        let Some(entries) = &self.entries else {
            return;
        };
        let _guard = self.gate.write().await;
        for key in keys {
            entries.invalidate(key).await;
        }
        debug!(count = keys.len(), "Invalidated cached transition rules");
    }

    pub async fn invalidate_all(&self) {
        let Some(entries) = &self.entries else {
            return;
        };
        let _guard = self.gate.write().await;
        entries.invalidate_all();
        debug!("Invalidated all cached transition rules");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Id;
    use crate::rules::RuleDraft;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn enabled() -> RuleCache {
        RuleCache::new(&CacheConfig {
            enabled: true,
            ttl_seconds: 60,
            max_capacity: 100,
        })
    }

    fn sample_rule(key: TransitionKey) -> TransitionRule {
        RuleDraft {
            from_status: key.from_status,
            action: key.action,
            ticket_type: key.ticket_type,
            to_status: Id::new(),
            description: "sample".to_string(),
            is_default: false,
        }
        .into_rule()
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let cache = enabled();
        let key = TransitionKey::new(Id::new(), Id::new(), Id::new());
        let rule = sample_rule(key);
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let found = cache
                .get_or_load(key, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(rule.clone()))
                })
                .await
                .unwrap();
            assert_eq!(found.unwrap().id, rule.id);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidation_forces_reload() {
        let cache = enabled();
        let key = TransitionKey::new(Id::new(), Id::new(), Id::new());
        let mut rule = sample_rule(key);

        cache.get_or_load(key, || async { Ok(Some(rule.clone())) }).await.unwrap();
        rule.is_active = false;
        cache.invalidate(&[key]).await;

        let reloaded = cache
            .get_or_load(key, || async { Ok(Some(rule.clone())) })
            .await
            .unwrap()
            .unwrap();
        assert!(!reloaded.is_active);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_loads() {
        let cache = RuleCache::disabled();
        let key = TransitionKey::new(Id::new(), Id::new(), Id::new());
        let loads = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_load(key, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await
                .unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert!(!cache.is_enabled());
    }

    #[tokio::test]
    async fn test_load_errors_are_not_cached() {
        let cache = enabled();
        let key = TransitionKey::new(Id::new(), Id::new(), Id::new());

        let failed = cache
            .get_or_load(key, || async {
                Err(StoreError::Unavailable {
                    reason: "down".to_string(),
                })
            })
            .await;
        assert!(failed.is_err());

        let loaded = cache.get_or_load(key, || async { Ok(None) }).await.unwrap();
        assert!(loaded.is_none());
    }
}
