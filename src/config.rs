use std::{
    env,
    fmt::Display,
    net::{Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use tracing::{info, warn};
use url::Url;

use crate::error::AppError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/api/generate-thumbnails";
pub const DEFAULT_BIND: &str = "127.0.0.1:21296";
const DEFAULT_PORT: u16 = 21296;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    /// Where submissions are POSTed. Relative thumbnail references resolve against it.
    pub endpoint: Url,
    pub bind: SocketAddr,
    /// `None` waits forever, like the browser form did.
    pub timeout: Option<Duration>,
    pub fetch_concurrency: usize,
}

impl Config {
    /// Defaults for everything except the endpoint.
    pub fn with_endpoint(endpoint: Url) -> Self {
        Self {
            endpoint,
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            timeout: None,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint: Url = try_load(&lookup, "THUMBGEN_ENDPOINT", DEFAULT_ENDPOINT)?;
        let bind: SocketAddr = try_load(&lookup, "THUMBGEN_BIND", DEFAULT_BIND)?;
        let timeout_secs: u64 = try_load(&lookup, "THUMBGEN_TIMEOUT_SECS", "0")?;
        let fetch_concurrency: usize = try_load(
            &lookup,
            "THUMBGEN_FETCH_CONCURRENCY",
            &DEFAULT_FETCH_CONCURRENCY.to_string(),
        )?;

        let config = Self {
            endpoint,
            bind,
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            fetch_concurrency,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !matches!(self.endpoint.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "endpoint must be http(s), got {}",
                self.endpoint
            )));
        }
        if self.fetch_concurrency == 0 {
            return Err(AppError::Config("fetch concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        AppError::Config(format!("invalid {key} value {raw:?}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(config.bind.port(), 21296);
        assert!(config.timeout.is_none());
        assert_eq!(config.fetch_concurrency, DEFAULT_FETCH_CONCURRENCY);
    }

    #[test]
    fn explicit_endpoint_keeps_the_other_defaults() {
        let endpoint = Url::parse("http://127.0.0.1:9/api/generate-thumbnails").unwrap();
        let config = Config::with_endpoint(endpoint.clone());
        let loaded = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.endpoint, endpoint);
        assert_eq!(config.bind, loaded.bind);
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.timeout, loaded.timeout);
        assert_eq!(config.fetch_concurrency, loaded.fetch_concurrency);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("THUMBGEN_ENDPOINT", "https://thumbs.example/api/generate-thumbnails"),
            ("THUMBGEN_TIMEOUT_SECS", "30"),
            ("THUMBGEN_FETCH_CONCURRENCY", "1"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint.host_str(), Some("thumbs.example"));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.fetch_concurrency, 1);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("THUMBGEN_BIND", "nowhere")])).is_err());
        assert!(Config::from_lookup(lookup(&[("THUMBGEN_FETCH_CONCURRENCY", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("THUMBGEN_ENDPOINT", "ftp://x/y")])).is_err());
    }
}
