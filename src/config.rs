// Runtime configuration for resolvers, the job backend and polling

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::downloader::errors::ConfigError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 3;

/// Which resolution strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverMode {
    /// Fetch the page and scrape `<video>`/`<source>` tags
    Scrape,
    /// Ask the metadata service for the full format list
    Service,
    /// Service when a backend is configured, scrape otherwise
    #[default]
    Auto,
}

impl fmt::Display for ResolverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scrape => write!(f, "scrape"),
            Self::Service => write!(f, "service"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for ResolverMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scrape" => Ok(Self::Scrape),
            "service" => Ok(Self::Service),
            "auto" => Ok(Self::Auto),
            other => Err(ConfigError(format!(
                "unknown resolver mode '{}' (expected scrape, service or auto)",
                other
            ))),
        }
    }
}

/// Network configuration for every HTTP client
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Timeout in seconds
    pub timeout_secs: u64,

    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_secs: 30,
            user_agent: concat!("media-acquire/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquireConfig {
    pub resolver_mode: ResolverMode,
    /// Base endpoint of the metadata/job backend
    pub backend_url: Option<String>,
    pub network: NetworkConfig,
    pub poll_interval: Duration,
    /// Consecutive failed status checks before a job is forced to `Failed`
    pub max_poll_failures: u32,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            resolver_mode: ResolverMode::Auto,
            backend_url: None,
            network: NetworkConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

impl AcquireConfig {
    /// Defaults overridden by `MEDIA_ACQUIRE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("MEDIA_ACQUIRE_BACKEND_URL") {
            config = config.with_backend_url(Some(url));
        }
        if let Some(mode) = lookup("MEDIA_ACQUIRE_RESOLVER") {
            config.resolver_mode = mode.parse()?;
        }
        if let Some(proxy) = lookup("MEDIA_ACQUIRE_PROXY") {
            config = config.with_proxy(Some(proxy));
        }
        if let Some(secs) = lookup("MEDIA_ACQUIRE_TIMEOUT_SECS") {
            config.network.timeout_secs = parse_number("MEDIA_ACQUIRE_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("MEDIA_ACQUIRE_POLL_INTERVAL_SECS") {
            let secs: u64 = parse_number("MEDIA_ACQUIRE_POLL_INTERVAL_SECS", &secs)?;
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(n) = lookup("MEDIA_ACQUIRE_MAX_POLL_FAILURES") {
            config.max_poll_failures = parse_number("MEDIA_ACQUIRE_MAX_POLL_FAILURES", &n)?;
        }

        Ok(config)
    }

    pub fn with_backend_url(mut self, url: Option<String>) -> Self {
        self.backend_url = url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
        self
    }

    pub fn with_resolver_mode(mut self, mode: ResolverMode) -> Self {
        self.resolver_mode = mode;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.network.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.network.timeout_secs = seconds;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_failures(mut self, max: u32) -> Self {
        self.max_poll_failures = max;
        self
    }

    /// Resolver mode after applying the `Auto` rule
    pub fn effective_resolver_mode(&self) -> ResolverMode {
        match self.resolver_mode {
            ResolverMode::Auto if self.backend_url.is_some() => ResolverMode::Service,
            ResolverMode::Auto => ResolverMode::Scrape,
            mode => mode,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver_mode == ResolverMode::Service && self.backend_url.is_none() {
            return Err(ConfigError(
                "service resolver requires a backend URL".to_string(),
            ));
        }
        if let Some(url) = &self.backend_url {
            url::Url::parse(url)
                .map_err(|e| ConfigError(format!("backend URL '{}': {}", url, e)))?;
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError("poll interval must be positive".to_string()));
        }
        if self.max_poll_failures == 0 {
            return Err(ConfigError(
                "max poll failures must be at least 1".to_string(),
            ));
        }
        if self.network.timeout_secs == 0 {
            return Err(ConfigError("network timeout must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AcquireConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.max_poll_failures, 3);
        assert_eq!(config.effective_resolver_mode(), ResolverMode::Scrape);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = AcquireConfig::from_lookup(lookup(&[
            ("MEDIA_ACQUIRE_BACKEND_URL", "http://localhost:8000/"),
            ("MEDIA_ACQUIRE_POLL_INTERVAL_SECS", "5"),
            ("MEDIA_ACQUIRE_MAX_POLL_FAILURES", "7"),
            ("MEDIA_ACQUIRE_PROXY", "socks5://127.0.0.1:1080"),
        ]))
        .unwrap();

        assert_eq!(config.backend_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_poll_failures, 7);
        assert_eq!(config.network.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(config.effective_resolver_mode(), ResolverMode::Service);
    }

    #[test]
    fn test_bad_number_is_reported() {
        let err = AcquireConfig::from_lookup(lookup(&[("MEDIA_ACQUIRE_POLL_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("MEDIA_ACQUIRE_POLL_INTERVAL_SECS"));
    }

    #[test]
    fn test_service_mode_needs_backend() {
        let config = AcquireConfig::default().with_resolver_mode(ResolverMode::Service);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(AcquireConfig::default()
            .with_max_poll_failures(0)
            .validate()
            .is_err());
        assert!(AcquireConfig::default()
            .with_poll_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_resolver_mode_parsing() {
        assert_eq!("Scrape".parse::<ResolverMode>().unwrap(), ResolverMode::Scrape);
        assert_eq!(" service ".parse::<ResolverMode>().unwrap(), ResolverMode::Service);
        assert!("yt".parse::<ResolverMode>().is_err());
    }
}
