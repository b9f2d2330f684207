use std::path::{Path, PathBuf};

use crate::manifest::is_secondary_index_folder;

/// Path of the live file a snapshot file was hard-linked from.
///
/// - `{data_dir}/snapshots/{tag}/{file}`          -> `{data_dir}/{file}`
/// - `{data_dir}/snapshots/{tag}/.{index}/{file}` -> `{data_dir}/.{index}/{file}`
///
/// Pure path arithmetic; None when the path is too shallow for the layout.
pub fn live_file_for_snapshot_file(snapshot_file: &Path) -> Option<PathBuf> {
    let file_name = snapshot_file.file_name()?;
    let parent = snapshot_file.parent()?;
    let mut live_dir = parent.parent()?.parent()?.to_path_buf();

    if is_secondary_index_folder(parent) {
        // parent^3 is {data_dir}/snapshots here
        live_dir = live_dir.parent()?.join(parent.file_name()?);
    }

    Some(live_dir.join(file_name))
}
