//! Cross-field validation for assembled configuration.

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{
    ENV_BACKUP_ROOTS, ENV_CRITICAL_FILE, ENV_MARKER_KEY, ENV_START_COMMAND, ENV_START_SIGNATURES,
};
use crate::model::{BackupRootConfig, BerthConfig};

/// Validate a fully assembled configuration.
///
/// # Errors
///
/// Returns the first validation failure encountered.
pub fn validate_config(config: &BerthConfig) -> ConfigResult<()> {
    validate_backup_roots(&config.sync.roots)?;

    let marker = config.sync.marker_key.as_str();
    if marker.starts_with('/') || marker.ends_with('/') {
        return Err(ConfigError::invalid(ENV_MARKER_KEY, "not_a_key", marker));
    }
    if let Some(root) = config
        .sync
        .roots
        .iter()
        .find(|root| marker.starts_with(root.prefix.as_str()))
    {
        return Err(ConfigError::OverlappingPrefixes {
            first: root.prefix.clone(),
            second: marker.to_string(),
        });
    }

    if !config.sync.critical_file.starts_with('/') {
        return Err(ConfigError::invalid(
            ENV_CRITICAL_FILE,
            "not_absolute",
            &config.sync.critical_file,
        ));
    }
    if config.gateway.start_command.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            field: ENV_START_COMMAND,
            reason: "empty",
            value: None,
        });
    }
    if config.gateway.start_signatures.is_empty() {
        return Err(ConfigError::InvalidField {
            field: ENV_START_SIGNATURES,
            reason: "empty",
            value: None,
        });
    }
    Ok(())
}

/// Validate that backup roots produce a bijective path/key mapping.
///
/// # Errors
///
/// Returns an error when a root is malformed or two roots overlap.
pub fn validate_backup_roots(roots: &[BackupRootConfig]) -> ConfigResult<()> {
    for root in roots {
        if !root.source.starts_with('/') {
            return Err(ConfigError::invalid(ENV_BACKUP_ROOTS, "source_not_absolute", &root.source));
        }
        if !root.source.ends_with('/') {
            return Err(ConfigError::invalid(
                ENV_BACKUP_ROOTS,
                "source_missing_slash",
                &root.source,
            ));
        }
        if root.prefix.starts_with('/') {
            return Err(ConfigError::invalid(ENV_BACKUP_ROOTS, "prefix_absolute", &root.prefix));
        }
        if !root.prefix.ends_with('/') {
            return Err(ConfigError::invalid(
                ENV_BACKUP_ROOTS,
                "prefix_missing_slash",
                &root.prefix,
            ));
        }
    }

    for (index, first) in roots.iter().enumerate() {
        for second in &roots[index + 1..] {
            if first.prefix.starts_with(&second.prefix) || second.prefix.starts_with(&first.prefix)
            {
                return Err(ConfigError::OverlappingPrefixes {
                    first: first.prefix.clone(),
                    second: second.prefix.clone(),
                });
            }
            if first.source.starts_with(&second.source) || second.source.starts_with(&first.source)
            {
                return Err(ConfigError::OverlappingSources {
                    first: first.source.clone(),
                    second: second.source.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(source: &str, prefix: &str) -> BackupRootConfig {
        BackupRootConfig {
            source: source.to_string(),
            prefix: prefix.to_string(),
        }
    }

    #[test]
    fn disjoint_roots_are_accepted() -> ConfigResult<()> {
        validate_backup_roots(&[
            root("/data/config/", "config/"),
            root("/data/skills/", "skills/"),
        ])
    }

    #[test]
    fn nested_prefixes_are_rejected() {
        let err = validate_backup_roots(&[
            root("/data/config/", "state/"),
            root("/data/skills/", "state/skills/"),
        ])
        .expect_err("nested prefixes must be rejected");
        assert!(matches!(err, ConfigError::OverlappingPrefixes { .. }));
    }

    #[test]
    fn nested_sources_are_rejected() {
        let err = validate_backup_roots(&[
            root("/data/", "data/"),
            root("/data/skills/", "skills/"),
        ])
        .expect_err("nested sources must be rejected");
        assert!(matches!(err, ConfigError::OverlappingSources { .. }));
    }

    #[test]
    fn malformed_roots_are_rejected() {
        for (candidate, reason) in [
            (root("data/config/", "config/"), "source_not_absolute"),
            (root("/data/config", "config/"), "source_missing_slash"),
            (root("/data/config/", "/config/"), "prefix_absolute"),
            (root("/data/config/", "config"), "prefix_missing_slash"),
        ] {
            let err = validate_backup_roots(&[candidate]).expect_err("root must be rejected");
            assert!(
                matches!(err, ConfigError::InvalidField { reason: r, .. } if r == reason),
                "unexpected error for {reason}: {err:?}"
            );
        }
    }
}
