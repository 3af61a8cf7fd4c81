// function_store.rs
// 每个命名空间一个函数存储，由外部 watch 机制保持更新
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::function_meta::Function;
use super::resolver_error::ResolveError;

/// Indexed view of the functions deployed in a namespace.
///
/// `Ok(None)` means the store answered and the function is absent.
#[async_trait]
pub trait FunctionStore: Send + Sync {
    async fn lookup(&self, namespace: &str, name: &str) -> Result<Option<Function>, ResolveError>;
}

/// Function store kept in memory and fed by the watch / controller sync.
pub struct InMemoryFunctionStore {
    namespace: String,
    functions: DashMap<String, Function>,
}

impl InMemoryFunctionStore {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            functions: DashMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn upsert(&self, function: Function) -> Option<Function> {
        self.functions.insert(function.name.clone(), function)
    }

    pub fn remove(&self, name: &str) -> Option<Function> {
        self.functions.remove(name).map(|(_, function)| function)
    }

    /// Replaces the store's contents with `functions`. Functions belonging to
    /// another namespace are skipped.
    pub fn replace_all(&self, functions: Vec<Function>) -> usize {
        let incoming: HashMap<String, Function> = functions
            .into_iter()
            .filter(|f| {
                if f.namespace != self.namespace {
                    log::warn!(
                        "skipping function {}/{} listed for namespace {}",
                        f.namespace,
                        f.name,
                        self.namespace
                    );
                    return false;
                }
                true
            })
            .map(|f| (f.name.clone(), f))
            .collect();
        self.functions.retain(|name, _| incoming.contains_key(name));
        let count = incoming.len();
        for (name, function) in incoming {
            self.functions.insert(name, function);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[async_trait]
impl FunctionStore for InMemoryFunctionStore {
    async fn lookup(&self, namespace: &str, name: &str) -> Result<Option<Function>, ResolveError> {
        if namespace != self.namespace {
            return Ok(None);
        }
        Ok(self.functions.get(name).map(|entry| entry.value().clone()))
    }
}

/// Namespace -> function store table, built from the watched namespaces.
#[derive(Clone, Default)]
pub struct NamespaceStores {
    stores: HashMap<String, Arc<dyn FunctionStore>>,
}

impl NamespaceStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, namespace: &str, store: Arc<dyn FunctionStore>) {
        self.stores.insert(namespace.to_string(), store);
    }

    pub fn get(&self, namespace: &str) -> Result<&Arc<dyn FunctionStore>, ResolveError> {
        self.stores
            .get(namespace)
            .ok_or_else(|| ResolveError::StoreUnavailable(namespace.to_string()))
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }
}
