use super::{file_name, sorted_subdirs, RenameOp};
use crate::error::{PrepError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

static PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{6}-\d{6})").expect("valid period regex"));

/// Plan `<period>_<n>` names for every folder under `root`.
///
/// Folders sharing a period are numbered from 1 in name order. A folder with
/// no period in its name is an error, as is a target that would still exist
/// when its rename runs.
pub fn plan_folder_renames(root: &Path) -> Result<Vec<RenameOp>> {
    let folders = sorted_subdirs(root)?;

    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for folder in folders {
        let name = file_name(&folder);
        // index folders left by an earlier reorganize
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let period = PERIOD
            .captures(&name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                PrepError::Layout(format!("Unable to detect period in folder name: {}", name))
            })?;
        groups.entry(period).or_default().push(folder);
    }

    let mut ops: Vec<RenameOp> = Vec::new();
    for (period, mut paths) in groups {
        paths.sort_by_key(|p| file_name(p));
        for (index, path) in paths.into_iter().enumerate() {
            let new_name = format!("{}_{}", period, index + 1);
            if file_name(&path) == new_name {
                continue;
            }
            let target = root.join(&new_name);
            let vacated = ops.iter().any(|op| op.from == target);
            let claimed = ops.iter().any(|op| op.to == target);
            if claimed || (target.exists() && !vacated) {
                return Err(PrepError::TargetExists(target));
            }
            ops.push(RenameOp::new(path, target));
        }
    }
    Ok(ops)
}
