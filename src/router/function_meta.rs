// function_meta.rs
// 触发器、函数以及解析结果的数据结构
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::weighted_distribution::WeightedDistribution;

pub const FUNCTION_REFERENCE_TYPE_NAME: &str = "name";
pub const FUNCTION_REFERENCE_TYPE_WEIGHTS: &str = "function-weights";

/// A deployed function as seen through the namespace's function store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub resource_version: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Function {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource_version: String::new(),
            environment: String::new(),
            labels: HashMap::new(),
        }
    }
}

/// Which function(s) a trigger routes to.
///
/// `Unsupported` keeps the raw kind of references written by a producer that
/// knows more reference types than this router does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FunctionReferenceSpec", into = "FunctionReferenceSpec")]
pub enum FunctionReference {
    ByName(String),
    ByWeights(IndexMap<String, i32>),
    Unsupported(String),
}

impl FunctionReference {
    pub fn kind(&self) -> &str {
        match self {
            FunctionReference::ByName(_) => FUNCTION_REFERENCE_TYPE_NAME,
            FunctionReference::ByWeights(_) => FUNCTION_REFERENCE_TYPE_WEIGHTS,
            FunctionReference::Unsupported(kind) => kind,
        }
    }
}

// 与控制器保存的对象格式一致：{"type": ..., "name": ..., "functionWeights": {...}}
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionReferenceSpec {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    function_weights: IndexMap<String, i32>,
}

impl From<FunctionReferenceSpec> for FunctionReference {
    fn from(spec: FunctionReferenceSpec) -> Self {
        match spec.kind.as_str() {
            FUNCTION_REFERENCE_TYPE_NAME => FunctionReference::ByName(spec.name),
            FUNCTION_REFERENCE_TYPE_WEIGHTS => FunctionReference::ByWeights(spec.function_weights),
            _ => FunctionReference::Unsupported(spec.kind),
        }
    }
}

impl From<FunctionReference> for FunctionReferenceSpec {
    fn from(reference: FunctionReference) -> Self {
        match reference {
            FunctionReference::ByName(name) => FunctionReferenceSpec {
                kind: FUNCTION_REFERENCE_TYPE_NAME.to_string(),
                name,
                function_weights: IndexMap::new(),
            },
            FunctionReference::ByWeights(function_weights) => FunctionReferenceSpec {
                kind: FUNCTION_REFERENCE_TYPE_WEIGHTS.to_string(),
                name: String::new(),
                function_weights,
            },
            FunctionReference::Unsupported(kind) => FunctionReferenceSpec {
                kind,
                name: String::new(),
                function_weights: IndexMap::new(),
            },
        }
    }
}

/// An HTTP trigger binding a route to one or more functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub namespace: String,
    pub name: String,
    pub resource_version: String,
    #[serde(default)]
    pub relative_url: String,
    #[serde(default)]
    pub methods: Vec<String>,
    pub function_reference: FunctionReference,
}

impl Trigger {
    pub fn new(
        namespace: &str,
        name: &str,
        resource_version: &str,
        function_reference: FunctionReference,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource_version: resource_version.to_string(),
            relative_url: String::new(),
            methods: Vec::new(),
            function_reference,
        }
    }
}

/// Cache key of a resolution. The resource version changes on every trigger
/// edit, so an edited trigger never hits an entry built for its old spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveKey {
    pub namespace: String,
    pub trigger_name: String,
    pub trigger_resource_version: String,
}

impl ResolveKey {
    pub fn new(namespace: &str, trigger_name: &str, trigger_resource_version: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            trigger_name: trigger_name.to_string(),
            trigger_resource_version: trigger_resource_version.to_string(),
        }
    }

    pub fn from_trigger(trigger: &Trigger) -> Self {
        Self::new(&trigger.namespace, &trigger.name, &trigger.resource_version)
    }
}

impl fmt::Display for ResolveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.namespace, self.trigger_name, self.trigger_resource_version
        )
    }
}

/// Outcome of resolving a trigger's function reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ResolveResult {
    SingleFunction(Function),
    MultipleFunctions {
        functions: HashMap<String, Function>,
        distribution: WeightedDistribution,
    },
}

impl ResolveResult {
    /// Copy of the name -> function mapping.
    pub fn function_map(&self) -> HashMap<String, Function> {
        match self {
            ResolveResult::SingleFunction(function) => {
                HashMap::from([(function.name.clone(), function.clone())])
            }
            ResolveResult::MultipleFunctions { functions, .. } => functions.clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        match self {
            ResolveResult::SingleFunction(function) if function.name == name => Some(function),
            ResolveResult::SingleFunction(_) => None,
            ResolveResult::MultipleFunctions { functions, .. } => functions.get(name),
        }
    }

    pub fn distribution(&self) -> Option<&WeightedDistribution> {
        match self {
            ResolveResult::SingleFunction(_) => None,
            ResolveResult::MultipleFunctions { distribution, .. } => Some(distribution),
        }
    }

    /// Picks the function a request should go to. `None` when the weighted
    /// distribution cannot be sampled.
    pub fn choose_function<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Function> {
        match self {
            ResolveResult::SingleFunction(function) => Some(function),
            ResolveResult::MultipleFunctions {
                functions,
                distribution,
            } => distribution
                .pick(rng)
                .and_then(|entry| functions.get(&entry.name)),
        }
    }
}
