// src/config.rs
use anyhow::{Context, Result, bail};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory { capacity: usize },
    Redis { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub project_id: Option<String>,
    pub location: String,
    pub vto_model: String,
    /// Without a token the dry-run gateway is used.
    pub access_token: Option<String>,
    pub max_concurrent_generations: usize,
    pub store: StoreBackend,
    pub store_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project_id = get("PROJECT_ID").or_else(|| get("GOOGLE_CLOUD_PROJECT"));
        let access_token = get("VERTEX_ACCESS_TOKEN");
        if access_token.is_some() && project_id.is_none() {
            bail!("PROJECT_ID (or GOOGLE_CLOUD_PROJECT) must be set when VERTEX_ACCESS_TOKEN is set");
        }

        let max_concurrent_generations: usize =
            parse_or(get("MAX_CONCURRENT_GENERATIONS"), "MAX_CONCURRENT_GENERATIONS", 4)?;
        if max_concurrent_generations == 0 {
            bail!("MAX_CONCURRENT_GENERATIONS must be at least 1");
        }

        let store_ttl_secs: u64 = parse_or(get("STORE_TTL_SECS"), "STORE_TTL_SECS", 86_400)?;
        if store_ttl_secs == 0 {
            bail!("STORE_TTL_SECS must be at least 1");
        }

        let store = match get("STORE_BACKEND").as_deref().unwrap_or("memory") {
            "memory" => {
                let capacity: usize = parse_or(get("STORE_CAPACITY"), "STORE_CAPACITY", 1024)?;
                if capacity == 0 {
                    bail!("STORE_CAPACITY must be at least 1");
                }
                StoreBackend::Memory { capacity }
            }
            "redis" => StoreBackend::Redis {
                url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            },
            other => bail!("unknown STORE_BACKEND: {}", other),
        };

        Ok(Self {
            port: parse_or(get("PORT"), "PORT", 8080)?,
            project_id,
            location: get("LOCATION").unwrap_or_else(|| "us-central1".to_string()),
            vto_model: get("VTO_MODEL")
                .unwrap_or_else(|| "virtual-try-on-preview-08-04".to_string()),
            access_token,
            max_concurrent_generations,
            store,
            store_ttl: Duration::from_secs(store_ttl_secs),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_run_dry_with_memory_store() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.location, "us-central1");
        assert_eq!(cfg.vto_model, "virtual-try-on-preview-08-04");
        assert_eq!(cfg.access_token, None);
        assert_eq!(cfg.max_concurrent_generations, 4);
        assert_eq!(cfg.store, StoreBackend::Memory { capacity: 1024 });
        assert_eq!(cfg.store_ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn reads_overrides_and_project_fallback() {
        let cfg = config(&[
            ("GOOGLE_CLOUD_PROJECT", "fallback-project"),
            ("VERTEX_ACCESS_TOKEN", "ya29.token"),
            ("PORT", "9000"),
            ("MAX_CONCURRENT_GENERATIONS", "2"),
            ("STORE_BACKEND", "redis"),
            ("REDIS_URL", "redis://cache:6379"),
            ("STORE_TTL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(cfg.project_id.as_deref(), Some("fallback-project"));
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.max_concurrent_generations, 2);
        assert_eq!(
            cfg.store,
            StoreBackend::Redis {
                url: "redis://cache:6379".to_string()
            }
        );
        assert_eq!(cfg.store_ttl, Duration::from_secs(60));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config(&[("PORT", "eighty")]).is_err());
        assert!(config(&[("MAX_CONCURRENT_GENERATIONS", "0")]).is_err());
        assert!(config(&[("STORE_BACKEND", "sqlite")]).is_err());
        assert!(config(&[("VERTEX_ACCESS_TOKEN", "t")]).is_err());
        assert!(config(&[("STORE_TTL_SECS", "0")]).is_err());
        assert!(config(&[("STORE_CAPACITY", "0")]).is_err());
    }

    #[test]
    fn smallest_store_limits_are_accepted() {
        let cfg = config(&[("STORE_TTL_SECS", "1"), ("STORE_CAPACITY", "1")]).unwrap();
        assert_eq!(cfg.store_ttl, Duration::from_secs(1));
        assert_eq!(cfg.store, StoreBackend::Memory { capacity: 1 });
    }
}
