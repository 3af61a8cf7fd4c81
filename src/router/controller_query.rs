//控制器客户端：启动时拉取命名空间内的函数列表，填充内存中的函数存储
use reqwest::{StatusCode, Url};
use std::collections::HashMap;

use super::function_meta::Function;
use super::function_store::InMemoryFunctionStore;
use super::resolver_error::ResolveError;

#[derive(Clone)]
pub struct ControllerClient {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl ControllerClient {
    pub fn new(base_url: Url, auth_token: Option<String>) -> Result<Self, ResolveError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(std::time::Duration::from_secs(3)) //超时
            .build()
            .map_err(|e| {
                ResolveError::HttpError(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed to build HTTP client: {}", e),
                )
            })?;
        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    /// Lists the functions deployed in `namespace`.
    pub async fn list_functions(&self, namespace: &str) -> Result<Vec<Function>, ResolveError> {
        let url = format!("{}v2/functions", self.base_url);
        //Url样例：http://controller.fission/v2/functions?namespace=default

        let mut req = self.client.get(&url).query(&[("namespace", namespace)]);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            ResolveError::HttpError(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Request failed: {}", e),
            )
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            ResolveError::HttpError(status, format!("Failed to read response: {}", e))
        })?;

        match status {
            StatusCode::OK => {
                let items: Vec<FunctionItem> = serde_json::from_str(&body)?;
                Ok(items
                    .into_iter()
                    .map(|item| parse_function_item(item, namespace))
                    .collect())
            }
            _ => Err(ResolveError::HttpError(status, body)),
        }
    }
}

#[derive(serde::Deserialize)]
struct FunctionItem {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: Option<FunctionSpec>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    resource_version: String,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

#[derive(serde::Deserialize)]
struct FunctionSpec {
    #[serde(default)]
    environment: Option<EnvironmentReference>,
}

#[derive(serde::Deserialize)]
struct EnvironmentReference {
    name: String,
}

// 控制器有时省略 metadata.namespace，此时以请求的命名空间为准
fn parse_function_item(item: FunctionItem, namespace: &str) -> Function {
    let meta = item.metadata;
    Function {
        namespace: if meta.namespace.is_empty() {
            namespace.to_string()
        } else {
            meta.namespace
        },
        name: meta.name,
        resource_version: meta.resource_version,
        environment: item
            .spec
            .and_then(|spec| spec.environment)
            .map(|env| env.name)
            .unwrap_or_default(),
        labels: meta.labels.unwrap_or_default(),
    }
}

/// Refreshes `store` with the controller's current listing for its
/// namespace and returns the number of functions now held.
pub async fn sync_namespace(
    client: &ControllerClient,
    store: &InMemoryFunctionStore,
) -> Result<usize, ResolveError> {
    let start = std::time::Instant::now();
    let functions = client.list_functions(store.namespace()).await?;
    let count = store.replace_all(functions);
    log::info!(
        "Synced namespace [{}] with {} functions, took: {:.4}s",
        store.namespace(),
        count,
        start.elapsed().as_secs_f64()
    );
    Ok(count)
}
