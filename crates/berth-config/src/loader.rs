//! Environment parsing for [`BerthConfig`].
//!
//! # Design
//! - Every variable is optional; unset values fall back to `defaults.rs`.
//! - Lookups go through an injectable closure so tests never mutate the process environment.
//! - Parsed values are validated once, after all sections are assembled.

use std::path::PathBuf;
use std::time::Duration;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    BackupRootConfig, BerthConfig, GatewayConfig, LogSettings, RetryConfig, SandboxConfig,
    StoreConfig, SyncConfig,
};
use crate::validate::validate_config;

/// Environment variable naming the store directory.
pub const ENV_STORE_DIR: &str = "BERTH_STORE_DIR";
/// Environment variable naming the sandbox root directory.
pub const ENV_SANDBOX_ROOT: &str = "BERTH_SANDBOX_ROOT";
/// Environment variable listing `source=prefix` backup roots.
pub const ENV_BACKUP_ROOTS: &str = "BERTH_BACKUP_ROOTS";
/// Environment variable listing exclusion suffixes.
pub const ENV_EXCLUDE_SUFFIXES: &str = "BERTH_EXCLUDE_SUFFIXES";
/// Environment variable naming the freshness marker key.
pub const ENV_MARKER_KEY: &str = "BERTH_MARKER_KEY";
/// Environment variable naming the sanity-check file.
pub const ENV_CRITICAL_FILE: &str = "BERTH_CRITICAL_FILE";
/// Environment variable holding the gateway startup command.
pub const ENV_START_COMMAND: &str = "BERTH_START_COMMAND";
/// Environment variable listing gateway command signatures.
pub const ENV_START_SIGNATURES: &str = "BERTH_START_SIGNATURES";
/// Environment variable listing ignored utility command signatures.
pub const ENV_UTILITY_SIGNATURES: &str = "BERTH_UTILITY_SIGNATURES";
/// Environment variable holding the gateway service port.
pub const ENV_SERVICE_PORT: &str = "BERTH_SERVICE_PORT";
/// Environment variable holding the readiness timeout in seconds.
pub const ENV_STARTUP_TIMEOUT_SECS: &str = "BERTH_STARTUP_TIMEOUT_SECS";
/// Environment variable holding the retry attempt budget.
pub const ENV_RETRY_ATTEMPTS: &str = "BERTH_RETRY_ATTEMPTS";
/// Environment variable holding the retry delay in milliseconds.
pub const ENV_RETRY_DELAY_MS: &str = "BERTH_RETRY_DELAY_MS";
/// Environment variable holding the scheduled backup interval in seconds.
pub const ENV_SYNC_INTERVAL_SECS: &str = "BERTH_SYNC_INTERVAL_SECS";
/// Environment variable holding the default log level.
pub const ENV_LOG_LEVEL: &str = "BERTH_LOG_LEVEL";
/// Environment variable selecting the log format.
pub const ENV_LOG_FORMAT: &str = "BERTH_LOG_FORMAT";

impl BerthConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable fails to parse or the assembled
    /// configuration fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable fails to parse or the assembled
    /// configuration fails validation.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let store = StoreConfig {
            dir: var(ENV_STORE_DIR).map(PathBuf::from),
        };

        let sandbox = SandboxConfig {
            root: PathBuf::from(
                var(ENV_SANDBOX_ROOT).unwrap_or_else(|| defaults::SANDBOX_ROOT.to_string()),
            ),
        };

        let roots_raw =
            var(ENV_BACKUP_ROOTS).unwrap_or_else(|| defaults::BACKUP_ROOTS.to_string());
        let interval_secs = parse_u64(
            ENV_SYNC_INTERVAL_SECS,
            var(ENV_SYNC_INTERVAL_SECS),
            defaults::SYNC_INTERVAL_SECS,
        )?;
        let sync = SyncConfig {
            roots: parse_backup_roots(&roots_raw)?,
            exclude_suffixes: split_list(
                &var(ENV_EXCLUDE_SUFFIXES).unwrap_or_else(|| defaults::EXCLUDE_SUFFIXES.into()),
            ),
            marker_key: var(ENV_MARKER_KEY).unwrap_or_else(|| defaults::MARKER_KEY.into()),
            critical_file: var(ENV_CRITICAL_FILE)
                .unwrap_or_else(|| defaults::CRITICAL_FILE.into()),
            interval: (interval_secs > 0).then(|| Duration::from_secs(interval_secs)),
        };

        let gateway = GatewayConfig {
            start_command: var(ENV_START_COMMAND)
                .unwrap_or_else(|| defaults::START_COMMAND.into()),
            start_signatures: split_list(
                &var(ENV_START_SIGNATURES).unwrap_or_else(|| defaults::START_SIGNATURES.into()),
            ),
            utility_signatures: split_list(
                &var(ENV_UTILITY_SIGNATURES)
                    .unwrap_or_else(|| defaults::UTILITY_SIGNATURES.into()),
            ),
            service_port: parse_port(var(ENV_SERVICE_PORT))?,
            startup_timeout: Duration::from_secs(parse_u64(
                ENV_STARTUP_TIMEOUT_SECS,
                var(ENV_STARTUP_TIMEOUT_SECS),
                defaults::STARTUP_TIMEOUT_SECS,
            )?),
        };

        let retry = RetryConfig {
            max_attempts: parse_attempts(var(ENV_RETRY_ATTEMPTS))?,
            delay: Duration::from_millis(parse_u64(
                ENV_RETRY_DELAY_MS,
                var(ENV_RETRY_DELAY_MS),
                defaults::RETRY_DELAY_MS,
            )?),
        };

        let logging = LogSettings {
            level: var(ENV_LOG_LEVEL).unwrap_or_else(|| defaults::LOG_LEVEL.into()),
            format: var(ENV_LOG_FORMAT),
        };

        let config = Self {
            store,
            sandbox,
            sync,
            gateway,
            retry,
            logging,
        };
        validate_config(&config)?;
        Ok(config)
    }
}

/// Parse a comma separated `source=prefix` list into backup roots.
///
/// # Errors
///
/// Returns an error when an entry lacks the `=` separator or either side is empty.
pub fn parse_backup_roots(raw: &str) -> ConfigResult<Vec<BackupRootConfig>> {
    split_list(raw)
        .into_iter()
        .map(|entry| {
            let (source, prefix) = entry.split_once('=').ok_or_else(|| {
                ConfigError::invalid(ENV_BACKUP_ROOTS, "missing_separator", &entry)
            })?;
            let source = source.trim();
            let prefix = prefix.trim();
            if source.is_empty() || prefix.is_empty() {
                return Err(ConfigError::invalid(ENV_BACKUP_ROOTS, "empty_component", &entry));
            }
            Ok(BackupRootConfig {
                source: source.to_string(),
                prefix: prefix.to_string(),
            })
        })
        .collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u64(field: &'static str, value: Option<String>, default: u64) -> ConfigResult<u64> {
    value.map_or(Ok(default), |raw| {
        raw.parse::<u64>()
            .map_err(|_| ConfigError::invalid(field, "not_a_number", &raw))
    })
}

fn parse_port(value: Option<String>) -> ConfigResult<u16> {
    let Some(raw) = value else {
        return Ok(defaults::SERVICE_PORT);
    };
    let port = raw
        .parse::<u16>()
        .map_err(|_| ConfigError::invalid(ENV_SERVICE_PORT, "out_of_range", &raw))?;
    if port == 0 {
        return Err(ConfigError::invalid(ENV_SERVICE_PORT, "zero", &raw));
    }
    Ok(port)
}

fn parse_attempts(value: Option<String>) -> ConfigResult<u32> {
    let Some(raw) = value else {
        return Ok(defaults::RETRY_ATTEMPTS);
    };
    let attempts = raw
        .parse::<u32>()
        .map_err(|_| ConfigError::invalid(ENV_RETRY_ATTEMPTS, "not_a_number", &raw))?;
    if attempts == 0 {
        return Err(ConfigError::invalid(ENV_RETRY_ATTEMPTS, "zero", &raw));
    }
    Ok(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() -> ConfigResult<()> {
        let config = BerthConfig::from_lookup(lookup(&[]))?;
        assert!(!config.store.is_configured());
        assert_eq!(config.sync.marker_key, ".last-sync");
        assert_eq!(config.sync.roots.len(), 2);
        assert_eq!(config.sync.roots[0].source, "/data/config/");
        assert_eq!(config.sync.roots[0].prefix, "config/");
        assert_eq!(config.sync.exclude_suffixes, vec![".lock", ".log", ".tmp"]);
        assert_eq!(config.gateway.service_port, 18_789);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_secs(3));
        assert_eq!(config.sync.interval, Some(Duration::from_secs(300)));
        Ok(())
    }

    #[test]
    fn overrides_are_parsed() -> ConfigResult<()> {
        let config = BerthConfig::from_lookup(lookup(&[
            (ENV_STORE_DIR, "/var/lib/berth"),
            (ENV_BACKUP_ROOTS, "/srv/state/=state/"),
            (ENV_CRITICAL_FILE, "/srv/state/main.json"),
            (ENV_SERVICE_PORT, "8080"),
            (ENV_RETRY_ATTEMPTS, "2"),
            (ENV_RETRY_DELAY_MS, "10"),
            (ENV_SYNC_INTERVAL_SECS, "0"),
            (ENV_LOG_FORMAT, "json"),
        ]))?;
        assert_eq!(config.store.dir, Some(PathBuf::from("/var/lib/berth")));
        assert_eq!(
            config.sync.roots,
            vec![BackupRootConfig {
                source: "/srv/state/".into(),
                prefix: "state/".into(),
            }]
        );
        assert_eq!(config.gateway.service_port, 8080);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.delay, Duration::from_millis(10));
        assert_eq!(config.sync.interval, None);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        Ok(())
    }

    #[test]
    fn blank_values_fall_back_to_defaults() -> ConfigResult<()> {
        let config = BerthConfig::from_lookup(lookup(&[(ENV_MARKER_KEY, "   ")]))?;
        assert_eq!(config.sync.marker_key, defaults::MARKER_KEY);
        Ok(())
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = BerthConfig::from_lookup(lookup(&[(ENV_SERVICE_PORT, "70000")]))
            .expect_err("port should be rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: ENV_SERVICE_PORT,
                reason: "out_of_range",
                ..
            }
        ));

        let err = BerthConfig::from_lookup(lookup(&[(ENV_SERVICE_PORT, "0")]))
            .expect_err("zero port should be rejected");
        assert!(matches!(err, ConfigError::InvalidField { reason: "zero", .. }));
    }

    #[test]
    fn zero_retry_attempts_are_rejected() {
        let err = BerthConfig::from_lookup(lookup(&[(ENV_RETRY_ATTEMPTS, "0")]))
            .expect_err("zero attempts should be rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: ENV_RETRY_ATTEMPTS,
                ..
            }
        ));
    }

    #[test]
    fn malformed_backup_roots_are_rejected() {
        assert!(matches!(
            parse_backup_roots("/data/config/"),
            Err(ConfigError::InvalidField {
                reason: "missing_separator",
                ..
            })
        ));
        assert!(matches!(
            parse_backup_roots("/data/config/="),
            Err(ConfigError::InvalidField {
                reason: "empty_component",
                ..
            })
        ));
    }
}
