//! Centralized configuration for the snapshot subsystem.
//!
//! - SnapshotConfig::from_env() reads TSNAP_* variables.
//! - Fluent with_* setters override single fields.
//! - SnapshotConfigBuilder starts either from env or from clean defaults.
//!
//! Env:
//! - TSNAP_MANIFEST_ENRICH = 0|1 (default 1): create/enrich manifests when snapshots are loaded.
//! - TSNAP_CASE_INSENSITIVE_TAGS = 0|1 (default: 1 on macOS, 0 elsewhere).
//! - TSNAP_DATA_DIRS = list of data roots separated by the platform path separator.

use std::fmt;
use std::path::PathBuf;

fn parse_bool(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

/// Configuration of snapshot loading and comparison.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Create missing manifests and rewrite legacy ones (no created_at) on load.
    /// Env: TSNAP_MANIFEST_ENRICH (default true)
    pub manifest_enrich_enabled: bool,

    /// Compare snapshot tags ignoring case. Hard links on case-insensitive
    /// filesystems collide for "snap" and "Snap", so this is on for macOS hosts only.
    /// Env: TSNAP_CASE_INSENSITIVE_TAGS
    pub case_insensitive_tags: bool,

    /// Data roots backing the tables (one per physical volume).
    /// Env: TSNAP_DATA_DIRS
    pub data_dirs: Vec<PathBuf>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            manifest_enrich_enabled: true,
            case_insensitive_tags: cfg!(target_os = "macos"),
            data_dirs: Vec::new(),
        }
    }
}

impl SnapshotConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TSNAP_MANIFEST_ENRICH") {
            cfg.manifest_enrich_enabled = parse_bool(&v);
        }

        if let Ok(v) = std::env::var("TSNAP_CASE_INSENSITIVE_TAGS") {
            cfg.case_insensitive_tags = parse_bool(&v);
        }

        if let Some(v) = std::env::var_os("TSNAP_DATA_DIRS") {
            cfg.data_dirs = std::env::split_paths(&v)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }

        cfg
    }

    pub fn with_manifest_enrich(mut self, on: bool) -> Self {
        self.manifest_enrich_enabled = on;
        self
    }

    pub fn with_case_insensitive_tags(mut self, on: bool) -> Self {
        self.case_insensitive_tags = on;
        self
    }

    pub fn with_data_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.data_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Self {
        self
    }
}

impl fmt::Display for SnapshotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dirs: Vec<String> = self
            .data_dirs
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        write!(
            f,
            "SnapshotConfig {{ \
             manifest_enrich_enabled: {}, \
             case_insensitive_tags: {}, \
             data_dirs: [{}] \
             }}",
            self.manifest_enrich_enabled,
            self.case_insensitive_tags,
            dirs.join(", "),
        )
    }
}

/// Builder producing a SnapshotConfig.
#[derive(Clone, Debug)]
pub struct SnapshotConfigBuilder {
    cfg: SnapshotConfig,
}

impl Default for SnapshotConfigBuilder {
    fn default() -> Self {
        Self {
            cfg: SnapshotConfig::from_env(),
        }
    }
}

impl SnapshotConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: SnapshotConfig::default(),
        }
    }

    pub fn manifest_enrich(mut self, on: bool) -> Self {
        self.cfg.manifest_enrich_enabled = on;
        self
    }

    pub fn case_insensitive_tags(mut self, on: bool) -> Self {
        self.cfg.case_insensitive_tags = on;
        self
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.cfg.data_dirs.push(dir.into());
        self
    }

    pub fn build(self) -> SnapshotConfig {
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool(" TRUE "));
        assert!(parse_bool("on"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = SnapshotConfigBuilder::from_default()
            .manifest_enrich(false)
            .case_insensitive_tags(true)
            .data_dir("/d0")
            .data_dir("/d1")
            .build();
        assert!(!cfg.manifest_enrich_enabled);
        assert!(cfg.case_insensitive_tags);
        assert_eq!(cfg.data_dirs, vec![PathBuf::from("/d0"), PathBuf::from("/d1")]);
        assert!(cfg.to_string().contains("/d1"));
    }
}
