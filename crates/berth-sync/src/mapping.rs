//! Translation between sandbox paths and object keys.
//!
//! # Design
//! - Each backup root substitutes its source directory for a fixed key prefix, so the
//!   mapping is a bijection for every non-excluded file below a root.
//! - Exclusion applies to both directions: excluded files are never uploaded and
//!   excluded keys are never restored.

use berth_config::{BackupRootConfig, SyncConfig};

/// A source directory mirrored under a fixed key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRoot {
    source: String,
    prefix: String,
}

impl BackupRoot {
    /// Mirror `source` (ending in `/`) under `prefix` (ending in `/`).
    #[must_use]
    pub fn new(source: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            prefix: prefix.into(),
        }
    }

    /// Sandbox directory being mirrored.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Key prefix objects are stored under.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Object key for a sandbox path below this root.
    #[must_use]
    pub fn key_for(&self, path: &str) -> Option<String> {
        path.strip_prefix(&self.source)
            .filter(|relative| !relative.is_empty())
            .map(|relative| format!("{}{relative}", self.prefix))
    }

    /// Sandbox path for an object key below this prefix.
    #[must_use]
    pub fn path_for(&self, key: &str) -> Option<String> {
        key.strip_prefix(&self.prefix)
            .filter(|relative| !relative.is_empty())
            .map(|relative| format!("{}{relative}", self.source))
    }
}

impl From<&BackupRootConfig> for BackupRoot {
    fn from(config: &BackupRootConfig) -> Self {
        Self::new(config.source.clone(), config.prefix.clone())
    }
}

/// Suffix predicate hiding lock files, logs, and scratch files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRule {
    suffixes: Vec<String>,
}

impl ExclusionRule {
    /// Exclude names ending in any of `suffixes`.
    #[must_use]
    pub const fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    /// Whether `name` (a path or a key) is excluded.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && name.ends_with(suffix.as_str()))
    }
}

/// All backup roots plus the exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    roots: Vec<BackupRoot>,
    exclusions: ExclusionRule,
}

impl PathMapping {
    /// Combine roots and exclusions.
    #[must_use]
    pub const fn new(roots: Vec<BackupRoot>, exclusions: ExclusionRule) -> Self {
        Self { roots, exclusions }
    }

    /// Build the mapping from sync configuration.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.roots.iter().map(BackupRoot::from).collect(),
            ExclusionRule::new(config.exclude_suffixes.clone()),
        )
    }

    /// Configured roots in order.
    #[must_use]
    pub fn roots(&self) -> &[BackupRoot] {
        &self.roots
    }

    /// Whether `name` is hidden from sync.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.is_excluded(name)
    }

    /// Object key for a sandbox path; `None` for excluded paths or paths outside every root.
    #[must_use]
    pub fn key_for(&self, path: &str) -> Option<String> {
        if self.is_excluded(path) {
            return None;
        }
        self.roots.iter().find_map(|root| root.key_for(path))
    }

    /// Sandbox path for an object key; `None` for excluded keys or keys outside every prefix.
    #[must_use]
    pub fn path_for(&self, key: &str) -> Option<String> {
        if self.is_excluded(key) {
            return None;
        }
        self.roots.iter().find_map(|root| root.path_for(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> PathMapping {
        PathMapping::new(
            vec![
                BackupRoot::new("/data/config/", "config/"),
                BackupRoot::new("/data/skills/", "skills/"),
            ],
            ExclusionRule::new(vec![".lock".into(), ".log".into(), ".tmp".into()]),
        )
    }

    #[test]
    fn config_file_maps_to_prefixed_key_and_back() {
        let mapping = mapping();
        assert_eq!(
            mapping.key_for("/data/config/x.json").as_deref(),
            Some("config/x.json")
        );
        assert_eq!(
            mapping.path_for("config/x.json").as_deref(),
            Some("/data/config/x.json")
        );
    }

    #[test]
    fn nested_paths_round_trip_through_every_root() {
        let mapping = mapping();
        for path in ["/data/skills/a/b/tool.md", "/data/config/agents/main.json"] {
            let key = mapping.key_for(path);
            assert!(key.is_some(), "{path} should map");
            assert_eq!(key.and_then(|key| mapping.path_for(&key)).as_deref(), Some(path));
        }
    }

    #[test]
    fn excluded_and_foreign_names_do_not_map() {
        let mapping = mapping();
        assert_eq!(mapping.key_for("/data/config/gateway.lock"), None);
        assert_eq!(mapping.key_for("/data/config/run.log"), None);
        assert_eq!(mapping.key_for("/tmp/other.json"), None);
        assert_eq!(mapping.key_for("/data/config/"), None);
        assert_eq!(mapping.path_for("config/scratch.tmp"), None);
        assert_eq!(mapping.path_for("media/photo.png"), None);
        assert_eq!(mapping.path_for(".last-sync"), None);
    }

    #[test]
    fn empty_suffixes_exclude_nothing() {
        let rule = ExclusionRule::new(vec![String::new()]);
        assert!(!rule.is_excluded("/data/config/x.json"));
    }
}
