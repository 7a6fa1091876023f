use anyhow::Result;
use encoding_rs::EUC_KR;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tourism_prep::config::Config;
use tourism_prep::dates;
use tourism_prep::layout::{self, files, folders, reorganize};
use tourism_prep::pipeline::Pipeline;
use tourism_prep::profile;
use tourism_prep::table::{self, DetectionStrategy, SourceEncoding};

fn write_cp949(path: &Path, text: &str) -> Result<()> {
    let (bytes, _, had_errors) = EUC_KR.encode(text);
    assert!(!had_errors);
    fs::write(path, bytes)?;
    Ok(())
}

/// Two exports of the same period and one of another, as DataLab downloads them
fn datalab_tree(root: &Path) -> Result<()> {
    let visitors = root.join("202301-202312 지역별 방문자수");
    let spend = root.join("202301-202312 지역별 관광소비");
    let older = root.join("202201-202212 지역별 방문자수");
    for dir in [&visitors, &spend, &older] {
        fs::create_dir_all(dir)?;
    }
    write_cp949(
        &visitors.join("20240105_방문자수.csv"),
        "지역,기준년월,방문자수\n서울,202301,1200\n부산,202302,800\n",
    )?;
    write_cp949(
        &spend.join("20240105_관광소비.csv"),
        "지역,년도,월,소비액\n서울,2023,1,\"1,500\"\n서울,2023,2,1600\n",
    )?;
    fs::write(
        older.join("20230110_방문자수.csv"),
        "\u{feff}지역,방문자수\n서울,1100\n",
    )?;
    Ok(())
}

#[test]
fn test_layout_steps_then_date_steps() -> Result<()> {
    let temp = tempdir()?;
    let root = temp.path();
    datalab_tree(root)?;

    let renamed = layout::apply_renames(&folders::plan_folder_renames(root)?)?;
    assert_eq!(renamed, 3);
    // numbered in name order: 관광소비 sorts before 방문자수
    assert!(root.join("202301-202312_1").is_dir());
    assert!(root.join("202301-202312_2").is_dir());
    assert!(root.join("202201-202212_1").is_dir());

    layout::apply_renames(&files::plan_file_renames(root)?)?;
    assert!(root.join("202201-202212_1").join("202201-202212_방문자수.csv").is_file());

    let plan = reorganize::plan_reorganize(root, 7)?;
    assert_eq!(plan.moves.len(), 3);
    reorganize::apply_reorganize(root, 7, &plan)?;
    for index in 1..=7 {
        assert!(root.join(index.to_string()).is_dir());
    }
    assert!(!root.join("202301-202312_1").exists());

    let normalized = dates::normalize_all(root, 7)?;
    assert_eq!(normalized.processed, 3);
    assert!(normalized.errors.is_empty());

    // cp949 input comes back as UTF-8 with BOM
    let visitors = root.join("2").join("202301-202312_방문자수.csv");
    let bytes = fs::read(&visitors)?;
    assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]));
    let t = table::read_table(&visitors, DetectionStrategy::FirstMatch)?;
    assert_eq!(t.encoding, SourceEncoding::Utf8Sig);
    assert_eq!(t.headers, vec!["year", "month", "기준년월", "지역", "방문자수"]);
    assert_eq!(t.rows[1][..2], ["2023".to_string(), "2".to_string()]);

    // no date columns at all: the file name period fills in
    let older = table::read_table(&root.join("1").join("202201-202212_방문자수.csv"), DetectionStrategy::FirstMatch)?;
    assert_eq!(older.rows[0][..2], ["2022".to_string(), "1".to_string()]);

    let cleaned = dates::cleanup_all(root)?;
    assert_eq!(cleaned.processed, 3);
    let spend = table::read_table(&root.join("1").join("202301-202312_관광소비.csv"), DetectionStrategy::FirstMatch)?;
    assert_eq!(spend.headers, vec!["year", "month", "지역", "소비액"]);

    Ok(())
}

#[test]
fn test_dry_run_plan_leaves_tree_untouched() -> Result<()> {
    let temp = tempdir()?;
    datalab_tree(temp.path())?;

    let ops = folders::plan_folder_renames(temp.path())?;
    assert_eq!(ops.len(), 3);
    assert!(temp.path().join("202301-202312 지역별 방문자수").is_dir());
    assert!(!temp.path().join("202301-202312_1").exists());
    Ok(())
}

#[test]
fn test_pipeline_run_profiles_the_result() -> Result<()> {
    let temp = tempdir()?;
    let all_data = temp.path().join("데이터랩").join("all_data");
    fs::create_dir_all(&all_data)?;
    datalab_tree(&all_data)?;

    let config = Config {
        data_root: temp.path().to_path_buf(),
        ..Config::default()
    };
    let result = Pipeline::run(&config)?;
    assert!(result.aborted.is_none());
    assert_eq!(result.total_errors(), 0);

    let summary = config.profile_output_path();
    assert_eq!(profile::validate_summary_file(&summary)?, 3);
    let profiles: Vec<profile::FileProfile> = serde_json::from_str(&fs::read_to_string(&summary)?)?;
    assert!(profiles.iter().all(|p| p.file.starts_with("데이터랩/all_data/")));
    assert!(profiles.iter().all(|p| p.encoding == SourceEncoding::Utf8Sig));
    assert!(profiles.iter().all(|p| p.columns[..2] == ["year".to_string(), "month".to_string()]));

    // a second run finds nothing left to rename or move
    let again = Pipeline::run(&config)?;
    assert!(again.aborted.is_none(), "{:?}", again.aborted);
    assert_eq!(again.steps[0].processed, 0);
    assert_eq!(again.steps[2].processed, 0);
    Ok(())
}
