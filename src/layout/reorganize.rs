use super::{file_name, sorted_entries, sorted_subdirs, RenameOp};
use crate::error::{PrepError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

static PERIOD_FOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<period>\d{6}-\d{6})_(?P<index>\d+)$").expect("valid folder regex")
});

/// Moves from period folders into index folders, plus the folders left empty
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReorganizePlan {
    pub moves: Vec<RenameOp>,
    pub emptied: Vec<PathBuf>,
}

/// Result of applying a plan
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReorganizeOutcome {
    pub moved_files: usize,
    pub removed_folders: usize,
}

/// Plan moving each `<period>_<index>` folder's files into `root/<index>/`.
/// Index folders (`1..=max_index`) are expected and skipped.
pub fn plan_reorganize(root: &Path, max_index: u32) -> Result<ReorganizePlan> {
    let mut plan = ReorganizePlan::default();

    for entry in sorted_subdirs(root)? {
        let name = file_name(&entry);
        let Some(caps) = PERIOD_FOLDER.captures(&name) else {
            if is_index_name(&name, max_index) {
                continue;
            }
            return Err(PrepError::Layout(format!("Unexpected directory format: {}", name)));
        };

        let index_str = &caps["index"];
        if !is_index_name(index_str, max_index) {
            return Err(PrepError::Layout(format!(
                "Unsupported index '{}' in folder {}",
                index_str, name
            )));
        }
        let destination = root.join(index_str);

        for item in sorted_entries(&entry)? {
            if item.is_dir() {
                return Err(PrepError::Layout(format!(
                    "Nested directory found inside {}: {}",
                    entry.display(),
                    file_name(&item)
                )));
            }
            let target = destination.join(file_name(&item));
            let claimed = plan.moves.iter().any(|op| op.to == target);
            if claimed || target.exists() {
                return Err(PrepError::TargetExists(target));
            }
            plan.moves.push(RenameOp::new(item, target));
        }
        plan.emptied.push(entry);
    }
    Ok(plan)
}

/// Create the index folders, move files and remove the emptied period folders
pub fn apply_reorganize(root: &Path, max_index: u32, plan: &ReorganizePlan) -> Result<ReorganizeOutcome> {
    for index in 1..=max_index {
        fs::create_dir_all(root.join(index.to_string()))?;
    }

    let moved_files = super::apply_renames(&plan.moves)?;
    for folder in &plan.emptied {
        fs::remove_dir(folder)?;
    }

    info!(
        moved_files,
        removed_folders = plan.emptied.len(),
        "Moved files into index-based folders"
    );
    Ok(ReorganizeOutcome {
        moved_files,
        removed_folders: plan.emptied.len(),
    })
}

fn is_index_name(name: &str, max_index: u32) -> bool {
    // "01" is not an index folder name
    name.parse::<u32>()
        .map(|i| (1..=max_index).contains(&i) && i.to_string() == name)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let a = dir.path().join("202001-202012_1");
        let b = dir.path().join("202101-202112_1");
        let c = dir.path().join("202101-202112_2");
        for (folder, file) in [(&a, "202001-202012_x.csv"), (&b, "202101-202112_x.csv"), (&c, "202101-202112_y.csv")] {
            fs::create_dir(folder).unwrap();
            fs::write(folder.join(file), "a\n").unwrap();
        }
        dir
    }

    #[test]
    fn test_files_move_into_index_folders() {
        let dir = setup();
        let plan = plan_reorganize(dir.path(), 7).unwrap();
        assert_eq!(plan.moves.len(), 3);
        assert_eq!(plan.emptied.len(), 3);

        let outcome = apply_reorganize(dir.path(), 7, &plan).unwrap();
        assert_eq!(outcome.moved_files, 3);
        assert!(dir.path().join("1/202001-202012_x.csv").is_file());
        assert!(dir.path().join("1/202101-202112_x.csv").is_file());
        assert!(dir.path().join("2/202101-202112_y.csv").is_file());
        assert!(dir.path().join("7").is_dir());
        assert!(!dir.path().join("202001-202012_1").exists());

        // Second run sees only index folders
        let again = plan_reorganize(dir.path(), 7).unwrap();
        assert!(again.moves.is_empty());
    }

    #[test]
    fn test_index_out_of_range_is_rejected() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("202001-202012_8")).unwrap();
        assert!(matches!(plan_reorganize(dir.path(), 7), Err(PrepError::Layout(_))));
    }

    #[test]
    fn test_unexpected_directory_is_rejected() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("notes")).unwrap();
        assert!(plan_reorganize(dir.path(), 7).is_err());
    }

    #[test]
    fn test_nested_directory_is_rejected() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("202001-202012_1/inner")).unwrap();
        assert!(plan_reorganize(dir.path(), 7).is_err());
    }
}
