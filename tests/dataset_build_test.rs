use anyhow::Result;
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;
use tourism_prep::config::Config;
use tourism_prep::dataset::{self, manifest::sha256_hex, FillMethod, ScalerKind, WindowRecord};
use tourism_prep::profile;

fn panel_csv() -> String {
    let mut text = String::from("year,month,region_id,category_id,visitors,spend\n");
    for i in 0..36u32 {
        let (year, month) = (2021 + i / 12, i % 12 + 1);
        // March 2022 is missing for region 11
        if !region_gap(year, month) {
            text.push_str(&format!("{},{},11,A,{},{}\n", year, month, 1000 + 10 * i, 50 + i));
        }
        text.push_str(&format!("{},{},26,A,{},{}\n", year, month, 500 + 5 * i, 20 + i));
    }
    text
}

fn region_gap(year: u32, month: u32) -> bool {
    year == 2022 && month == 3
}

#[test]
fn test_build_dataset_writes_splits_scaler_and_manifest() -> Result<()> {
    let temp = tempdir()?;
    let input = temp.path().join("panel.csv");
    fs::write(&input, format!("\u{feff}{}", panel_csv()))?;
    let output = temp.path().join("out");

    let config = Config::from_toml(
        r#"
        [dataset]
        target = "visitors"
        lags = [1]
        window = 6
        horizon = 1
        fill = "ffill"
        scaler = "minmax"
        "#,
    )?;
    assert_eq!(config.dataset.fill, FillMethod::Ffill);
    assert_eq!(config.dataset.scaler, ScalerKind::Minmax);

    let outcome = dataset::build_dataset(&input, &output, &config.dataset)?;
    let counts = &outcome.manifest.counts;
    assert_eq!(counts.groups, 2);
    assert_eq!(counts.months, 36);
    // per group: 36 - 6 - 1 + 1 = 30 candidates, the first one lacks lag1
    assert_eq!(counts.train + counts.valid + counts.test, 58);
    assert_eq!(counts.dropped_windows, 2);

    for name in ["train.jsonl", "valid.jsonl", "test.jsonl", "scaler.json", "manifest.json"] {
        assert!(output.join(name).is_file(), "{} missing", name);
    }

    let manifest: Value = serde_json::from_str(&fs::read_to_string(output.join("manifest.json"))?)?;
    assert_eq!(manifest["config"]["target"], json!("visitors"));
    assert_eq!(manifest["counts"]["groups"], json!(2));
    let train_bytes = fs::read(output.join("train.jsonl"))?;
    assert_eq!(manifest["files"]["train.jsonl"], json!(sha256_hex(&train_bytes)));

    let train: Vec<WindowRecord> = String::from_utf8(train_bytes)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    let test: Vec<WindowRecord> = fs::read_to_string(output.join("test.jsonl"))?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(train.len(), counts.train);

    // splits never share a target month, and train comes first
    let last_train = train.iter().map(|r| r.target_month).max().unwrap();
    let first_test = test.iter().map(|r| r.target_month).min().unwrap();
    assert!(last_train < first_test);

    // each window: 6 months of [visitors, spend, visitors_lag1, spend_lag1]
    let record = &train[0];
    assert_eq!(record.inputs.len(), 6);
    assert!(record.inputs.iter().all(|row| row.len() == 4));
    assert_eq!(record.group.get("region_id").map(String::as_str), Some("11"));
    assert_eq!(record.group.get("category_id").map(String::as_str), Some("A"));

    // min-max fitted on train: training inputs stay within [0, 1]
    assert!(train
        .iter()
        .flat_map(|r| r.inputs.iter().flatten())
        .all(|v| (-1e-9..=1.0 + 1e-9).contains(v)));

    // the gap month was forward-filled rather than dropping its windows
    let valid: Vec<WindowRecord> = fs::read_to_string(output.join("valid.jsonl"))?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    let gap = train
        .iter()
        .chain(&valid)
        .chain(&test)
        .find(|r| r.group["region_id"] == "11" && r.target_month == 202203)
        .expect("window targeting the forward-filled month");
    assert_eq!(gap.target_raw, 1000.0 + 10.0 * 13.0);
    Ok(())
}

#[test]
fn test_build_dataset_requires_target() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("panel.csv");
    fs::write(&input, panel_csv()).unwrap();
    let config = dataset::DatasetConfig::default();
    assert!(dataset::build_dataset(&input, &temp.path().join("out"), &config).is_err());
}

#[test]
fn test_profile_summary_schema() -> Result<()> {
    let temp = tempdir()?;
    fs::create_dir_all(temp.path().join("sub"))?;
    fs::write(temp.path().join("sub").join("a.csv"), "x,y\n1,2\n3,4\n")?;

    let profiles = profile::profile_directory(temp.path(), 1)?;
    assert_eq!(profiles[0].file, "sub/a.csv");
    assert_eq!(profiles[0].sample_rows, 1);
    assert!((2..=3).contains(&profiles[0].total_rows_est));

    let summary = temp.path().join("data_profile_summary.json");
    profile::write_summary(&summary, &profiles)?;
    assert_eq!(profile::validate_summary_file(&summary)?, 1);

    let invalid = json!([{ "file": "a.csv", "encoding": "ascii", "total_rows_est": 1,
        "sample_rows": 1, "n_cols": 1, "columns": ["x"] }]);
    assert!(profile::validate_summary(&invalid).is_err());
    Ok(())
}
