use super::{file_name, sorted_entries, sorted_subdirs, RenameOp};
use crate::error::{PrepError, Result};
use std::path::Path;
use tracing::warn;

/// Plan renames that give every file the period prefix of its folder.
///
/// A folder `202001-202012_3` yields the prefix `202001-202012_`; a file
/// `old_visitors.csv` inside it becomes `202001-202012_visitors.csv`. Files
/// without an underscore are left alone, as are folders without one.
pub fn plan_file_renames(root: &Path) -> Result<Vec<RenameOp>> {
    let mut ops = Vec::new();

    for folder in sorted_subdirs(root)? {
        let folder_name = file_name(&folder);
        let Some((period, _)) = folder_name.split_once('_') else {
            warn!("Skipping folder without expected suffix: {}", folder_name);
            continue;
        };
        let prefix = format!("{}_", period);

        for path in sorted_entries(&folder)? {
            if !path.is_file() {
                continue;
            }
            let name = file_name(&path);
            let Some((_, suffix)) = name.split_once('_') else {
                continue;
            };
            let new_name = format!("{}{}", prefix, suffix);
            if new_name == name {
                continue;
            }
            let target = path.with_file_name(&new_name);
            if target.exists() || ops.iter().any(|op: &RenameOp| op.to == target) {
                return Err(PrepError::TargetExists(target));
            }
            ops.push(RenameOp::new(path, target));
        }
    }
    Ok(ops)
}
