use berth_config::loader::{ENV_BACKUP_ROOTS, ENV_MARKER_KEY, ENV_STORE_DIR};
use berth_config::{BerthConfig, ConfigError};
use serial_test::serial;

struct EnvGuard {
    names: Vec<&'static str>,
}

impl EnvGuard {
    fn set(pairs: &[(&'static str, &str)]) -> Self {
        for (name, value) in pairs {
            // SAFETY: tests touching the environment are serialised with `#[serial]`.
            unsafe { std::env::set_var(name, value) };
        }
        Self {
            names: pairs.iter().map(|(name, _)| *name).collect(),
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for name in &self.names {
            // SAFETY: tests touching the environment are serialised with `#[serial]`.
            unsafe { std::env::remove_var(name) };
        }
    }
}

#[test]
#[serial]
fn from_env_reads_process_environment() -> Result<(), ConfigError> {
    let _guard = EnvGuard::set(&[
        (ENV_STORE_DIR, "/tmp/berth-store"),
        (ENV_BACKUP_ROOTS, "/srv/a/=a/,/srv/b/=b/"),
    ]);
    let config = BerthConfig::from_env()?;
    assert!(config.store.is_configured());
    assert_eq!(config.sync.roots.len(), 2);
    assert_eq!(config.sync.roots[1].prefix, "b/");
    Ok(())
}

#[test]
#[serial]
fn from_env_rejects_marker_inside_backup_prefix() {
    let _guard = EnvGuard::set(&[
        (ENV_BACKUP_ROOTS, "/data/config/=config/"),
        (ENV_MARKER_KEY, "config/.last-sync"),
    ]);
    let err = BerthConfig::from_env().expect_err("marker inside a prefix must be rejected");
    assert!(matches!(err, ConfigError::OverlappingPrefixes { .. }));
}

#[test]
#[serial]
fn serialised_config_round_trips_through_json() -> Result<(), Box<dyn std::error::Error>> {
    let config = BerthConfig::from_env()?;
    let encoded = serde_json::to_string(&config)?;
    let decoded: BerthConfig = serde_json::from_str(&encoded)?;
    assert_eq!(decoded, config);
    Ok(())
}
