//! SSTable descriptors and component names.
//!
//! File name format: `<version>-<id>-<format>-<Component>`, e.g. `me-1-big-Data.db`
//! or `nb-3fw2_0vpx_2tw1c2c4ztjpmsk7kj-bti-Index.db`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::consts::INDEX_DIR_PREFIX;
use crate::manifest::is_secondary_index_folder;

/// On-disk identifier of an sstable (its generation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SSTableId {
    /// Legacy integer generation.
    Sequence(u64),
    /// Time-based unique identifier (opaque token).
    Unique(String),
}

impl SSTableId {
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s.parse::<u64>().ok().map(SSTableId::Sequence);
        }
        if s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Some(SSTableId::Unique(s.to_string()));
        }
        None
    }
}

impl fmt::Display for SSTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SSTableId::Sequence(n) => write!(f, "{}", n),
            SSTableId::Unique(s) => f.write_str(s),
        }
    }
}

/// One file of an sstable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Data,
    PrimaryIndex,
    Partitions,
    Rows,
    Summary,
    Filter,
    Statistics,
    CompressionInfo,
    Digest,
    Crc,
    Toc,
    Custom(String),
}

impl Component {
    pub fn parse(repr: &str) -> Option<Self> {
        let c = match repr {
            "Data.db" => Component::Data,
            "Index.db" => Component::PrimaryIndex,
            "Partitions.db" => Component::Partitions,
            "Rows.db" => Component::Rows,
            "Summary.db" => Component::Summary,
            "Filter.db" => Component::Filter,
            "Statistics.db" => Component::Statistics,
            "CompressionInfo.db" => Component::CompressionInfo,
            "Digest.crc32" => Component::Digest,
            "CRC.db" => Component::Crc,
            "TOC.txt" => Component::Toc,
            other if other.contains('.') && !other.contains('/') => {
                Component::Custom(other.to_string())
            }
            _ => return None,
        };
        Some(c)
    }

    pub fn repr(&self) -> &str {
        match self {
            Component::Data => "Data.db",
            Component::PrimaryIndex => "Index.db",
            Component::Partitions => "Partitions.db",
            Component::Rows => "Rows.db",
            Component::Summary => "Summary.db",
            Component::Filter => "Filter.db",
            Component::Statistics => "Statistics.db",
            Component::CompressionInfo => "CompressionInfo.db",
            Component::Digest => "Digest.crc32",
            Component::Crc => "CRC.db",
            Component::Toc => "TOC.txt",
            Component::Custom(s) => s,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.repr())
    }
}

/// Location and identity of an sstable: directory + version + id + format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor {
    pub directory: PathBuf,
    pub version: String,
    pub id: SSTableId,
    pub format: String,
}

impl Descriptor {
    pub fn new(directory: impl Into<PathBuf>, version: &str, id: SSTableId, format: &str) -> Self {
        Self {
            directory: directory.into(),
            version: version.to_string(),
            id,
            format: format.to_string(),
        }
    }

    /// Parse a component file path. Returns None for anything that is not an sstable file.
    pub fn from_file(path: &Path) -> Option<(Descriptor, Component)> {
        let name = path.file_name()?.to_str()?;
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_filename(directory, name)
    }

    /// Parse `<version>-<id>-<format>-<Component>` located in `directory`.
    pub fn from_filename(directory: PathBuf, name: &str) -> Option<(Descriptor, Component)> {
        let mut parts = name.splitn(4, '-');
        let version = parts.next()?;
        let id = parts.next()?;
        let format = parts.next()?;
        let component = parts.next()?;

        if version.len() != 2 || !version.bytes().all(|b| b.is_ascii_lowercase()) {
            return None;
        }
        if format.is_empty() || !format.bytes().all(|b| b.is_ascii_lowercase()) {
            return None;
        }
        let id = SSTableId::parse(id)?;
        let component = Component::parse(component)?;

        Some((
            Descriptor {
                directory,
                version: version.to_string(),
                id,
                format: format.to_string(),
            },
            component,
        ))
    }

    /// "<version>-<id>-<format>"
    pub fn base_name(&self) -> String {
        format!("{}-{}-{}", self.version, self.id, self.format)
    }

    pub fn filename_for(&self, component: &Component) -> PathBuf {
        self.directory
            .join(format!("{}-{}", self.base_name(), component.repr()))
    }

    /// File name relative to the table (or snapshot) directory: index sstables keep
    /// their `.{index}/` prefix.
    pub fn relative_filename_for(&self, component: &Component) -> String {
        let file = format!("{}-{}", self.base_name(), component.repr());
        match self.directory.file_name().and_then(|n| n.to_str()) {
            Some(dir) if is_secondary_index_folder(&self.directory) => {
                debug_assert!(dir.starts_with(INDEX_DIR_PREFIX));
                format!("{}/{}", dir, file)
            }
            _ => file,
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.directory.join(self.base_name()).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_legacy_data_file() {
        let (d, c) = Descriptor::from_file(Path::new("/d/ks/tbl-1/me-1-big-Data.db")).unwrap();
        assert_eq!(d.version, "me");
        assert_eq!(d.id, SSTableId::Sequence(1));
        assert_eq!(d.format, "big");
        assert_eq!(c, Component::Data);
        assert_eq!(d.directory, PathBuf::from("/d/ks/tbl-1"));
        assert_eq!(d.filename_for(&Component::Summary), PathBuf::from("/d/ks/tbl-1/me-1-big-Summary.db"));
    }

    #[test]
    fn parse_unique_id_and_custom_component() {
        let (d, c) = Descriptor::from_filename(
            PathBuf::from("/x"),
            "nb-3fw2_0vpx_2tw1c2c4ztjpmsk7kj-bti-SAI+aa+idx+Meta.db",
        )
        .unwrap();
        assert_eq!(d.id, SSTableId::Unique("3fw2_0vpx_2tw1c2c4ztjpmsk7kj".into()));
        assert_eq!(c, Component::Custom("SAI+aa+idx+Meta.db".into()));
    }

    #[test]
    fn rejects_non_sstable_names() {
        assert!(Descriptor::from_filename(PathBuf::new(), "manifest.json").is_none());
        assert!(Descriptor::from_filename(PathBuf::new(), "schema.cql").is_none());
        assert!(Descriptor::from_filename(PathBuf::new(), "ME-1-big-Data.db").is_none());
        assert!(Descriptor::from_filename(PathBuf::new(), "me-x!-big-Data.db").is_none());
        assert!(Descriptor::from_filename(PathBuf::new(), "me-1-big-Data").is_none());
    }

    #[test]
    fn relative_name_keeps_index_dir() {
        let d = Descriptor::new("/d/tbl-1/snapshots/t/.tbl_idx", "me", SSTableId::Sequence(2), "big");
        assert_eq!(d.relative_filename_for(&Component::Data), ".tbl_idx/me-2-big-Data.db");
        let d = Descriptor::new("/d/tbl-1/snapshots/t", "me", SSTableId::Sequence(2), "big");
        assert_eq!(d.relative_filename_for(&Component::Data), "me-2-big-Data.db");
    }

    #[test]
    fn ids_order_sequences_numerically() {
        assert!(SSTableId::Sequence(2) < SSTableId::Sequence(10));
    }
}
