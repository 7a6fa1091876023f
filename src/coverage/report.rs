use super::FileSummary;
use crate::constants::{COVERAGE_CSV_NAME, COVERAGE_MD_NAME, COVERAGE_RESULT_DIR};
use crate::error::Result;
use crate::table::encode_utf8_sig;
use crate::types::MonthRange;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct CoverageReportPaths {
    pub csv: PathBuf,
    pub markdown: PathBuf,
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// Markdown report, files with the most missing months first
pub fn render_markdown(summaries: &[FileSummary], base: &MonthRange) -> String {
    let mut lines = vec![
        format!("# 기간 누락 점검 ({} ~ {})", base.start.label(), base.end.label()),
        String::new(),
        format!(
            "- 기준 기간: {}년 {}월 ~ {}년 {}월 (총 {}개월)",
            base.start.year,
            base.start.month,
            base.end.year,
            base.end.month,
            base.len()
        ),
        format!("- 분석 대상 파일 수: {}개", summaries.len()),
        format!(
            "- `누락 개월수`가 {}이면 기준 기간 데이터를 포함하지 않는 파일입니다.",
            base.len()
        ),
        String::new(),
        "| 파일명 | 데이터 범위 | 확보 개월수 | 누락 개월수 | 주요 누락 구간 | 비고 |".to_string(),
        "| --- | --- | ---: | ---: | --- | --- |".to_string(),
    ];

    let mut ordered: Vec<&FileSummary> = summaries.iter().collect();
    ordered.sort_by(|a, b| b.missing_count.cmp(&a.missing_count));

    for s in ordered {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            s.file_name,
            or_dash(&s.data_range),
            s.present_count,
            s.missing_count,
            or_dash(&s.missing_ranges),
            or_dash(&s.notes)
        ));
    }

    lines.join("\n")
}

/// Write the CSV and Markdown reports into `<dir>/result/`
pub fn write_reports(dir: &Path, summaries: &[FileSummary], base: &MonthRange) -> Result<CoverageReportPaths> {
    let result_dir = dir.join(COVERAGE_RESULT_DIR);
    fs::create_dir_all(&result_dir)?;

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for summary in summaries {
        writer.serialize(summary)?;
    }
    // serialize() writes the header only alongside the first record
    if summaries.is_empty() {
        writer.write_record([
            "file_name",
            "folder",
            "data_range",
            "present_count",
            "missing_count",
            "missing_ranges",
            "notes",
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| crate::error::PrepError::Io(e.into_error()))?;

    let csv_path = result_dir.join(COVERAGE_CSV_NAME);
    fs::write(&csv_path, encode_utf8_sig(&String::from_utf8_lossy(&bytes)))?;

    let md_path = result_dir.join(COVERAGE_MD_NAME);
    fs::write(&md_path, encode_utf8_sig(&render_markdown(summaries, base)))?;

    Ok(CoverageReportPaths {
        csv: csv_path,
        markdown: md_path,
    })
}
