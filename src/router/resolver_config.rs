use reqwest::Url;
use std::time::Duration;

use super::resolver_error::ResolveError;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8888";
const DEFAULT_CONTROLLER_URL: &str = "http://controller.fission";
const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub cache_ttl: Duration,
    /// `None` leaves expiry to lookups alone.
    pub purge_interval: Option<Duration>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            purge_interval: Some(DEFAULT_PURGE_INTERVAL),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub listen_addr: String,
    pub controller_url: Url,
    pub controller_token: Option<String>,
    pub namespaces: Vec<String>,
    pub resolver: ResolverConfig,
}

impl RouterConfig {
    pub fn from_env() -> Result<Self, ResolveError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source; unset variables fall back
    /// to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ResolveError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr =
            lookup("ROUTER_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

        let raw_url =
            lookup("ROUTER_CONTROLLER_URL").unwrap_or_else(|| DEFAULT_CONTROLLER_URL.to_string());
        let controller_url = Url::parse(&raw_url).map_err(|e| {
            ResolveError::InvalidConfig(format!("ROUTER_CONTROLLER_URL {}: {}", raw_url, e))
        })?;

        let controller_token = lookup("ROUTER_CONTROLLER_TOKEN").filter(|t| !t.is_empty());

        let namespaces: Vec<String> = lookup("ROUTER_NAMESPACES")
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(String::from)
            .collect();
        if namespaces.is_empty() {
            return Err(ResolveError::InvalidConfig(
                "ROUTER_NAMESPACES must name at least one namespace".to_string(),
            ));
        }

        let cache_ttl = match parse_secs(&lookup, "ROUTER_CACHE_TTL_SECS")? {
            Some(0) => {
                return Err(ResolveError::InvalidConfig(
                    "ROUTER_CACHE_TTL_SECS must be greater than 0".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_CACHE_TTL,
        };
        // 0 表示关闭后台清理
        let purge_interval = match parse_secs(&lookup, "ROUTER_CACHE_PURGE_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_PURGE_INTERVAL),
        };

        Ok(Self {
            listen_addr,
            controller_url,
            controller_token,
            namespaces,
            resolver: ResolverConfig {
                cache_ttl,
                purge_interval,
            },
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<u64>, ResolveError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| ResolveError::InvalidConfig(format!("invalid {} value: {}", key, v)))
        })
        .transpose()
}
