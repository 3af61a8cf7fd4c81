use reqwest::StatusCode;
use serde_json::Error as JsonError;

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("function {namespace}/{name} does not exist")]
    NotFound { namespace: String, name: String },

    #[error("unrecognized function reference type {0}")]
    UnsupportedReference(String),

    #[error("function store for namespace {0} not found")]
    StoreUnavailable(String),

    // 存储层自身的错误，原样返回给调用方
    #[error("function store error: {0}")]
    Store(String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(StatusCode, String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] JsonError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ResolveError {
    pub fn not_found(namespace: &str, name: &str) -> Self {
        ResolveError::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }
}
