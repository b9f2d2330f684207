//! manifest.json codec.
//!
//! One manifest lives in every snapshot directory:
//! {
//!   "files": ["me-1-big-Data.db", ".tbl_idx/me-1-big-Data.db"],
//!   "created_at": "2024-05-01T10:00:00.123Z",   (absent in legacy manifests)
//!   "expires_at": "2024-05-02T10:00:00.123Z",   (absent when no TTL)
//!   "ephemeral": false
//! }
//!
//! Writes are atomic via tmp+rename; concurrent writers of the same directory: last wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::consts::{MANIFEST_FILE, TMP_SUFFIX};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ephemeral: bool,
}

impl SnapshotManifest {
    /// expires_at = created_at + ttl when a TTL is given.
    pub fn new(
        files: Vec<String>,
        created_at: Option<DateTime<Utc>>,
        ttl: Option<Duration>,
        ephemeral: bool,
    ) -> Self {
        let expires_at = match (created_at, ttl) {
            (Some(c), Some(t)) => c.checked_add_signed(t),
            _ => None,
        };
        Self {
            files,
            created_at,
            expires_at,
            ephemeral,
        }
    }

    /// Manifest written before timestamps were recorded.
    pub fn is_legacy(&self) -> bool {
        self.created_at.is_none()
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let m: SnapshotManifest = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(m)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp_name);

        let data = serde_json::to_vec_pretty(self).context("serialize manifest")?;
        {
            let mut f = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&tmp)
                .with_context(|| format!("open {}", tmp.display()))?;
            f.write_all(&data)
                .with_context(|| format!("write {}", tmp.display()))?;
            let _ = f.sync_all();
        }
        fs::rename(&tmp, path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }
}

/// <snapshot_dir>/manifest.json
pub fn manifest_path(snapshot_dir: &Path) -> PathBuf {
    snapshot_dir.join(MANIFEST_FILE)
}
