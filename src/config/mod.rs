//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::logging::LogFormat;

pub const DEFAULT_ALBUM_PATH: &str = "/media/rock2_photo/onedrive";
pub const DEFAULT_INTERVAL_MINUTES: u64 = 30;
pub const DEFAULT_URI_PREFIX: &str = "media-source://media_source/local";
pub const DEFAULT_MEDIA_PREFIX: &str = "/media";
pub const DEFAULT_PORT: u16 = 8099;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Directory whose subfolders are the albums
    pub album_path: String,

    /// Minutes between automatic refreshes (always > 0)
    pub interval_minutes: u64,

    /// Media-source root substituted for `media_prefix` in album URIs
    pub uri_prefix: String,

    /// Local mount root of the media library
    pub media_prefix: String,

    /// Console log output format
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interval_minutes: u64 = match lookup("ALBUM_INTERVAL") {
            Some(value) => value.trim().parse().context("Invalid ALBUM_INTERVAL")?,
            None => DEFAULT_INTERVAL_MINUTES,
        };
        if interval_minutes == 0 {
            anyhow::bail!("ALBUM_INTERVAL must be a positive number of minutes");
        }
        interval_minutes
            .checked_mul(60)
            .context("ALBUM_INTERVAL is too large")?;

        let port = match lookup("PORT") {
            Some(value) => value.trim().parse().context("Invalid PORT")?,
            None => DEFAULT_PORT,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse().context("Invalid LOG_FORMAT")?,
            None => LogFormat::default(),
        };

        Ok(Self {
            port,

            album_path: lookup("ALBUM_PATH").unwrap_or_else(|| DEFAULT_ALBUM_PATH.to_string()),

            interval_minutes,

            uri_prefix: lookup("ALBUM_URI_PREFIX")
                .unwrap_or_else(|| DEFAULT_URI_PREFIX.to_string()),

            media_prefix: lookup("ALBUM_MEDIA_PREFIX")
                .unwrap_or_else(|| DEFAULT_MEDIA_PREFIX.to_string()),

            log_format,
        })
    }

    /// Time between scheduled refreshes
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.album_path, "/media/rock2_photo/onedrive");
        assert_eq!(config.interval_minutes, 30);
        assert_eq!(config.uri_prefix, "media-source://media_source/local");
        assert_eq!(config.media_prefix, "/media");
        assert_eq!(config.port, 8099);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.refresh_interval(), Duration::from_secs(1800));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ALBUM_PATH", "/srv/photos"),
            ("ALBUM_INTERVAL", "5"),
            ("ALBUM_URI_PREFIX", "media-source://other"),
            ("ALBUM_MEDIA_PREFIX", "/srv"),
            ("PORT", "9000"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();
        assert_eq!(config.album_path, "/srv/photos");
        assert_eq!(config.interval_minutes, 5);
        assert_eq!(config.uri_prefix, "media-source://other");
        assert_eq!(config.media_prefix, "/srv");
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        for bad in ["0", "-5", "ten", ""] {
            assert!(
                load(&[("ALBUM_INTERVAL", bad)]).is_err(),
                "interval {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_interval_overflowing_seconds() {
        let too_large = (u64::MAX / 60 + 1).to_string();
        let err = load(&[("ALBUM_INTERVAL", too_large.as_str())]).unwrap_err();
        assert!(err.to_string().contains("too large"));

        let largest = (u64::MAX / 60).to_string();
        let config = load(&[("ALBUM_INTERVAL", largest.as_str())]).unwrap();
        assert_eq!(config.refresh_interval().as_secs(), (u64::MAX / 60) * 60);
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
