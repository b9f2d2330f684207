//! util — small shared helpers.
//!
//! - stringify_file_size(): "#.##" human-readable sizes (bytes/KiB/MiB/GiB/TiB).
//! - timestamped_snapshot_name(): "<ts>[-name]" snapshot tags.
//! - last_modified(): mtime of a path as a UTC instant (None when missing or unknown).

use chrono::{DateTime, Utc};
use std::path::Path;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;
const TIB: f64 = GIB * 1024.0;

/// Format with at most two fractional digits, trailing zeros dropped ("#.##").
fn format_two_places(v: f64) -> String {
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

/// Human-readable size, e.g. "100 bytes", "1.5 KiB", "2 GiB".
pub fn stringify_file_size(bytes: u64) -> String {
    let v = bytes as f64;
    if v >= TIB {
        format!("{} TiB", format_two_places(v / TIB))
    } else if v >= GIB {
        format!("{} GiB", format_two_places(v / GIB))
    } else if v >= MIB {
        format!("{} MiB", format_two_places(v / MIB))
    } else if v >= KIB {
        format!("{} KiB", format_two_places(v / KIB))
    } else {
        format!("{} bytes", format_two_places(v))
    }
}

/// "<timestamp>" or "<timestamp>-<name>" when a non-empty name is supplied.
pub fn timestamped_snapshot_name(name: Option<&str>, timestamp_ms: i64) -> String {
    match name {
        Some(n) if !n.is_empty() => format!("{}-{}", timestamp_ms, n),
        _ => timestamp_ms.to_string(),
    }
}

/// "<prefix>-<timestamp>[-name]".
pub fn timestamped_snapshot_name_with_prefix(
    name: Option<&str>,
    timestamp_ms: i64,
    prefix: &str,
) -> String {
    format!("{}-{}", prefix, timestamped_snapshot_name(name, timestamp_ms))
}

/// Last-modified time of a path; None if the path is gone or reports epoch 0.
pub fn last_modified(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let dt: DateTime<Utc> = modified.into();
    if dt.timestamp_millis() <= 0 {
        return None;
    }
    Some(dt)
}

/// Current time truncated to millisecond precision (what manifests persist).
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

/// Drop sub-millisecond precision.
pub fn truncate_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(stringify_file_size(0), "0 bytes");
        assert_eq!(stringify_file_size(100), "100 bytes");
        assert_eq!(stringify_file_size(1024), "1 KiB");
        assert_eq!(stringify_file_size(1536), "1.5 KiB");
        assert_eq!(stringify_file_size(1024 * 1024 + 10 * 1024), "1.01 MiB");
        assert_eq!(stringify_file_size(3 * 1024 * 1024 * 1024), "3 GiB");
        assert_eq!(stringify_file_size(2 * 1024 * 1024 * 1024 * 1024), "2 TiB");
    }

    #[test]
    fn timestamped_names() {
        assert_eq!(timestamped_snapshot_name(None, 173000), "173000");
        assert_eq!(timestamped_snapshot_name(Some(""), 173000), "173000");
        assert_eq!(timestamped_snapshot_name(Some("tag"), 173000), "173000-tag");
        assert_eq!(
            timestamped_snapshot_name_with_prefix(Some("tag"), 5, "dropped"),
            "dropped-5-tag"
        );
    }

    #[test]
    fn truncate_drops_sub_millis() {
        let t = DateTime::from_timestamp(10, 123_456_789).unwrap();
        let tt = truncate_millis(t);
        assert_eq!(tt.timestamp_subsec_nanos(), 123_000_000);
    }
}
