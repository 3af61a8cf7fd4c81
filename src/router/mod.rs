pub mod controller_query;
pub mod function_meta;
pub mod function_resolver;
pub mod function_store;
pub mod resolve_cache;
pub mod resolver_config;
pub mod resolver_error;
pub mod weighted_distribution;

pub use function_meta::{Function, FunctionReference, ResolveKey, ResolveResult, Trigger};
pub use function_resolver::FunctionReferenceResolver;
pub use function_store::{FunctionStore, InMemoryFunctionStore, NamespaceStores};
pub use resolve_cache::ResolveCache;
pub use resolver_config::{ResolverConfig, RouterConfig};
pub use resolver_error::ResolveError;
pub use weighted_distribution::{WeightedDistribution, WeightedEntry};
