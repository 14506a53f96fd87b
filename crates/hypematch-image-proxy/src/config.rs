use image_file_cache::CacheConfig;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub cache: CacheConfig,
    pub retention_days: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            cache: CacheConfig::default(),
            retention_days: 7,
            sweep_interval_secs: 60 * 60,
        }
    }
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source; unset or unparsable values keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let port = lookup("PORT")
            .and_then(|v| u16::from_str(v.trim()).ok())
            .unwrap_or(defaults.port);

        let cache_dir = lookup("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache.cache_dir);

        let jpeg_quality = lookup("JPEG_QUALITY")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .filter(|q| (1..=100).contains(q))
            .unwrap_or(defaults.cache.jpeg_quality);

        let connect_timeout = parsed("CONNECT_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache.connect_timeout);

        let read_timeout = parsed("READ_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache.read_timeout);

        let max_image_bytes = parsed("MAX_IMAGE_BYTES").unwrap_or(defaults.cache.max_image_bytes);

        let retention_days = parsed("RETENTION_DAYS").unwrap_or(defaults.retention_days);

        let sweep_interval_secs = parsed("SWEEP_INTERVAL_SECS")
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.sweep_interval_secs);

        Self {
            port,
            cache: CacheConfig {
                cache_dir,
                jpeg_quality,
                connect_timeout,
                read_timeout,
                max_image_bytes,
                ..defaults.cache
            },
            retention_days,
            sweep_interval_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ProxyConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ProxyConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.cache.cache_dir, PathBuf::from("./cache/images"));
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.sweep_interval_secs, 3600);
        assert_eq!(config.cache.jpeg_quality, 90);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("CACHE_DIR", "/var/cache/hypematch"),
            ("RETENTION_DAYS", "14"),
            ("JPEG_QUALITY", "75"),
            ("READ_TIMEOUT_SECS", "3"),
            ("MAX_IMAGE_BYTES", "1024"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache.cache_dir, PathBuf::from("/var/cache/hypematch"));
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.cache.jpeg_quality, 75);
        assert_eq!(config.cache.read_timeout, Duration::from_secs(3));
        assert_eq!(config.cache.max_image_bytes, 1024);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("JPEG_QUALITY", "0"),
            ("SWEEP_INTERVAL_SECS", "0"),
            ("RETENTION_DAYS", "-3"),
        ]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.cache.jpeg_quality, 90);
        assert_eq!(config.sweep_interval_secs, 3600);
        assert_eq!(config.retention_days, 7);
    }
}
