// function_resolver.rs
// 将触发器的函数引用解析为具体函数（单个函数或按权重分配的多个函数）
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::function_meta::{Function, FunctionReference, ResolveKey, ResolveResult, Trigger};
use super::function_store::{FunctionStore, NamespaceStores};
use super::resolve_cache::ResolveCache;
use super::resolver_config::ResolverConfig;
use super::resolver_error::ResolveError;
use super::weighted_distribution::WeightedDistribution;

/// Turns a trigger's function reference into a [`ResolveResult`], caching
/// results per (namespace, trigger, resource version).
pub struct FunctionReferenceResolver {
    ref_cache: Arc<ResolveCache<ResolveKey, ResolveResult>>,
    stores: NamespaceStores,
    purger: Option<JoinHandle<()>>,
}

impl FunctionReferenceResolver {
    /// Eager purging needs a tokio runtime; without one the cache still
    /// expires entries on lookup.
    pub fn new(stores: NamespaceStores, config: ResolverConfig) -> Self {
        let ref_cache = Arc::new(ResolveCache::new(config.cache_ttl));
        let purger = match (config.purge_interval, tokio::runtime::Handle::try_current()) {
            (Some(every), Ok(_)) => Some(ResolveCache::spawn_purger(&ref_cache, every)),
            (Some(_), Err(_)) => {
                log::warn!("no tokio runtime, resolver cache expires entries lazily");
                None
            }
            (None, _) => None,
        };
        Self {
            ref_cache,
            stores,
            purger,
        }
    }

    pub async fn resolve(&self, trigger: &Trigger) -> Result<ResolveResult, ResolveError> {
        let key = ResolveKey::from_trigger(trigger);

        // check cache
        if let Some(result) = self.ref_cache.get(&key) {
            log::debug!("resolve cache hit for trigger {}", key);
            return Ok(result);
        }
        log::debug!("resolve cache miss for trigger {}", key);

        let result = match &trigger.function_reference {
            FunctionReference::ByName(name) => self.resolve_by_name(&key.namespace, name).await?,
            FunctionReference::ByWeights(weights) => {
                self.resolve_by_function_weights(&key.namespace, weights)
                    .await?
            }
            FunctionReference::Unsupported(kind) => {
                return Err(ResolveError::UnsupportedReference(kind.clone()))
            }
        };

        self.ref_cache.set(key, result.clone());
        Ok(result)
    }

    async fn resolve_by_name(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ResolveResult, ResolveError> {
        let store = self.stores.get(namespace)?;
        let function = lookup_function(store.as_ref(), namespace, name).await?;
        Ok(ResolveResult::SingleFunction(function))
    }

    async fn resolve_by_function_weights(
        &self,
        namespace: &str,
        weights: &IndexMap<String, i32>,
    ) -> Result<ResolveResult, ResolveError> {
        let store = self.stores.get(namespace)?;
        let mut functions = HashMap::with_capacity(weights.len());
        let mut distribution = WeightedDistribution::new();

        for (name, weight) in weights {
            // 任何一个函数不存在都放弃整个解析，不缓存部分结果
            let function = lookup_function(store.as_ref(), namespace, name).await?;
            functions.insert(function.name.clone(), function);
            distribution.push(name, *weight);
        }

        if !distribution.is_empty() && !distribution.is_usable() {
            log::warn!(
                "function weights in namespace {} do not form a usable distribution: {:?}",
                namespace,
                distribution.entries()
            );
        }

        Ok(ResolveResult::MultipleFunctions {
            functions,
            distribution,
        })
    }

    /// Invalidates the entry for this exact key. A key that is absent, or
    /// cached under another resource version, is left alone.
    pub fn delete(&self, namespace: &str, trigger_name: &str, trigger_resource_version: &str) -> bool {
        let key = ResolveKey::new(namespace, trigger_name, trigger_resource_version);
        let removed = self.ref_cache.delete(&key);
        if removed {
            log::info!("invalidated resolve cache entry for trigger {}", key);
        }
        removed
    }

    pub fn snapshot(&self) -> HashMap<ResolveKey, ResolveResult> {
        self.ref_cache.snapshot()
    }
}

impl Drop for FunctionReferenceResolver {
    fn drop(&mut self) {
        if let Some(purger) = self.purger.take() {
            purger.abort();
        }
    }
}

async fn lookup_function(
    store: &dyn FunctionStore,
    namespace: &str,
    name: &str,
) -> Result<Function, ResolveError> {
    match store.lookup(namespace, name).await? {
        Some(function) => Ok(function),
        None => {
            log::error!("function {}/{} does not exist", namespace, name);
            Err(ResolveError::not_found(namespace, name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::function_store::InMemoryFunctionStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // 统计 lookup 次数，用来判断是否命中缓存
    struct CountingStore {
        inner: InMemoryFunctionStore,
        lookups: AtomicUsize,
    }

    impl CountingStore {
        fn with_functions(namespace: &str, names: &[&str]) -> Arc<Self> {
            let inner = InMemoryFunctionStore::new(namespace);
            for name in names {
                inner.upsert(Function::new(namespace, name));
            }
            Arc::new(Self {
                inner,
                lookups: AtomicUsize::new(0),
            })
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FunctionStore for CountingStore {
        async fn lookup(
            &self,
            namespace: &str,
            name: &str,
        ) -> Result<Option<Function>, ResolveError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(namespace, name).await
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl FunctionStore for BrokenStore {
        async fn lookup(&self, _: &str, _: &str) -> Result<Option<Function>, ResolveError> {
            Err(ResolveError::Store("index not synced".to_string()))
        }
    }

    fn resolver_with(store: Arc<CountingStore>, ttl: Duration) -> FunctionReferenceResolver {
        let mut stores = NamespaceStores::new();
        stores.insert("default", store);
        FunctionReferenceResolver::new(
            stores,
            ResolverConfig {
                cache_ttl: ttl,
                purge_interval: None,
            },
        )
    }

    fn by_name(name: &str, version: &str, function: &str) -> Trigger {
        Trigger::new(
            "default",
            name,
            version,
            FunctionReference::ByName(function.to_string()),
        )
    }

    fn by_weights(name: &str, version: &str, weights: &[(&str, i32)]) -> Trigger {
        let weights = weights
            .iter()
            .map(|(f, w)| (f.to_string(), *w))
            .collect::<IndexMap<_, _>>();
        Trigger::new("default", name, version, FunctionReference::ByWeights(weights))
    }

    #[tokio::test]
    async fn resolves_single_function_by_name() {
        let store = CountingStore::with_functions("default", &["f1"]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));

        let result = resolver.resolve(&by_name("t1", "v1", "f1")).await.unwrap();
        assert_eq!(
            result,
            ResolveResult::SingleFunction(Function::new("default", "f1"))
        );
        assert_eq!(result.function_map().len(), 1);
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn second_resolve_is_a_cache_hit() {
        let store = CountingStore::with_functions("default", &["f1"]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));
        let trigger = by_name("t1", "v1", "f1");

        let first = resolver.resolve(&trigger).await.unwrap();
        let second = resolver.resolve(&trigger).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn resolves_weighted_functions_in_declared_order() {
        let store = CountingStore::with_functions("default", &["fA", "fB"]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));

        let result = resolver
            .resolve(&by_weights("t2", "v1", &[("fA", 70), ("fB", 30)]))
            .await
            .unwrap();

        let distribution = result.distribution().expect("weighted result");
        let entries: Vec<(&str, i32, i64)> = distribution
            .entries()
            .iter()
            .map(|e| (e.name.as_str(), e.weight, e.sum_prefix))
            .collect();
        assert_eq!(entries, vec![("fA", 70, 70), ("fB", 30, 100)]);
        let mut names: Vec<String> = result.function_map().into_keys().collect();
        names.sort();
        assert_eq!(names, vec!["fA", "fB"]);
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn missing_function_is_not_found_and_not_cached() {
        let store = CountingStore::with_functions("default", &[]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));
        let trigger = by_name("t1", "v1", "f1");

        let err = resolver.resolve(&trigger).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(resolver.snapshot().is_empty());

        // 失败结果不缓存，再次解析会重新查询
        let err = resolver.resolve(&trigger).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn partial_weighted_resolution_is_discarded() {
        let store = CountingStore::with_functions("default", &["fA"]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));

        let err = resolver
            .resolve(&by_weights("t2", "v1", &[("fA", 70), ("fB", 30)]))
            .await
            .unwrap_err();
        match err {
            ResolveError::NotFound { namespace, name } => {
                assert_eq!(namespace, "default");
                assert_eq!(name, "fB");
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(!resolver
            .snapshot()
            .contains_key(&ResolveKey::new("default", "t2", "v1")));
    }

    #[tokio::test]
    async fn unsupported_reference_is_rejected() {
        let store = CountingStore::with_functions("default", &["f1"]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));
        let trigger = Trigger::new(
            "default",
            "t3",
            "v1",
            FunctionReference::Unsupported("function-label-selector".to_string()),
        );

        match resolver.resolve(&trigger).await {
            Err(ResolveError::UnsupportedReference(kind)) => {
                assert_eq!(kind, "function-label-selector")
            }
            other => panic!("expected UnsupportedReference, got {:?}", other),
        }
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn unknown_namespace_is_store_unavailable() {
        let store = CountingStore::with_functions("default", &["f1"]);
        let resolver = resolver_with(store, Duration::from_secs(60));
        let mut trigger = by_name("t1", "v1", "f1");
        trigger.namespace = "prod".to_string();

        assert!(matches!(
            resolver.resolve(&trigger).await,
            Err(ResolveError::StoreUnavailable(ns)) if ns == "prod"
        ));
    }

    #[tokio::test]
    async fn store_errors_surface_immediately() {
        let mut stores = NamespaceStores::new();
        stores.insert("default", Arc::new(BrokenStore));
        let resolver = FunctionReferenceResolver::new(stores, ResolverConfig::default());

        assert!(matches!(
            resolver.resolve(&by_name("t1", "v1", "f1")).await,
            Err(ResolveError::Store(_))
        ));
        assert!(resolver.snapshot().is_empty());
    }

    #[tokio::test]
    async fn delete_forces_fresh_lookup() {
        let store = CountingStore::with_functions("default", &["f1"]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));
        let trigger = by_name("t1", "v1", "f1");

        resolver.resolve(&trigger).await.unwrap();
        assert!(resolver.delete("default", "t1", "v1"));
        resolver.resolve(&trigger).await.unwrap();
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn delete_with_other_version_keeps_stale_entry() {
        let store = CountingStore::with_functions("default", &["f1"]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));
        let trigger = by_name("t1", "v1", "f1");

        resolver.resolve(&trigger).await.unwrap();
        assert!(!resolver.delete("default", "t1", "v2"));
        assert!(!resolver.delete("default", "missing", "v1"));

        let snapshot = resolver.snapshot();
        assert!(snapshot.contains_key(&ResolveKey::new("default", "t1", "v1")));
        resolver.resolve(&trigger).await.unwrap();
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn edited_trigger_misses_cache() {
        let store = CountingStore::with_functions("default", &["f1", "f2"]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));

        resolver.resolve(&by_name("t1", "v1", "f1")).await.unwrap();
        let edited = resolver.resolve(&by_name("t1", "v2", "f2")).await.unwrap();
        assert_eq!(edited.get("f2").unwrap().name, "f2");
        assert_eq!(store.lookups(), 2);
        // 旧版本的条目等待过期，不会被覆盖
        assert_eq!(resolver.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn expired_entry_is_resolved_again() {
        let store = CountingStore::with_functions("default", &["f1"]);
        let resolver = resolver_with(store.clone(), Duration::from_millis(10));
        let trigger = by_name("t1", "v1", "f1");

        resolver.resolve(&trigger).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        resolver.resolve(&trigger).await.unwrap();
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn snapshot_does_not_touch_live_cache() {
        let store = CountingStore::with_functions("default", &["f1"]);
        let resolver = resolver_with(store.clone(), Duration::from_secs(60));
        let trigger = by_name("t1", "v1", "f1");
        resolver.resolve(&trigger).await.unwrap();

        let mut snapshot = resolver.snapshot();
        snapshot.clear();
        assert_eq!(resolver.snapshot().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_agree() {
        let store = CountingStore::with_functions("default", &["fA", "fB"]);
        let resolver = Arc::new(resolver_with(store.clone(), Duration::from_secs(60)));
        let trigger = by_weights("t2", "v1", &[("fA", 50), ("fB", 50)]);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                let trigger = trigger.clone();
                tokio::spawn(async move { resolver.resolve(&trigger).await })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        // 没有合并并发请求，每个未命中的调用各自查询两个函数
        let lookups = store.lookups();
        assert!((2..=16).contains(&lookups) && lookups % 2 == 0);
        assert_eq!(resolver.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn purger_runs_with_runtime() {
        let store = CountingStore::with_functions("default", &["f1"]);
        let mut stores = NamespaceStores::new();
        stores.insert("default", store);
        let resolver = FunctionReferenceResolver::new(
            stores,
            ResolverConfig {
                cache_ttl: Duration::from_millis(5),
                purge_interval: Some(Duration::from_millis(10)),
            },
        );
        resolver.resolve(&by_name("t1", "v1", "f1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(resolver.ref_cache.is_empty());
    }
}
