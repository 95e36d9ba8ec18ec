use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::eval::dataset::{ExpectedCall, ToolComposition};
use crate::eval::matcher::{CallMatch, PredictedCall};

/// Scoring outcome of one example.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRow {
    pub instruction: String,
    #[serde(rename = "type")]
    pub composition: ToolComposition,
    pub level: u8,
    pub score: f64,
    pub total_tools_expected: usize,
    pub total_tools_matched: usize,
    pub tools_called: String,
    pub expected_tools: String,
    pub matched: Vec<CallMatch>,
    pub unmatched: Vec<ExpectedCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl EvaluationRow {
    pub fn matched_predictions(&self) -> Vec<&PredictedCall> {
        self.matched.iter().map(|m| &m.predicted).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub total_examples: usize,
    pub average_score: f64,
    pub perfect_matches: usize,
    pub failed_matches: usize,
    pub partial_matches: usize,
    pub single_tool_accuracy: Option<f64>,
    pub multi_tool_accuracy: Option<f64>,
    pub by_level: BTreeMap<String, f64>,
}

/// Percentages are rounded to two decimals.
pub fn summarize(rows: &[EvaluationRow]) -> SummaryStatistics {
    let scores: Vec<f64> = rows.iter().map(|row| row.score).collect();

    let mut by_level: BTreeMap<u8, Vec<f64>> = BTreeMap::new();
    for row in rows {
        by_level.entry(row.level).or_default().push(row.score);
    }

    let accuracy_for = |composition: ToolComposition| {
        let scores: Vec<f64> = rows
            .iter()
            .filter(|row| row.composition == composition)
            .map(|row| row.score)
            .collect();
        mean(&scores).map(percent)
    };

    SummaryStatistics {
        total_examples: rows.len(),
        average_score: mean(&scores).map(percent).unwrap_or(0.0),
        perfect_matches: scores.iter().filter(|s| **s == 1.0).count(),
        failed_matches: scores.iter().filter(|s| **s == 0.0).count(),
        partial_matches: scores.iter().filter(|s| **s > 0.0 && **s < 1.0).count(),
        single_tool_accuracy: accuracy_for(ToolComposition::SingleTool),
        multi_tool_accuracy: accuracy_for(ToolComposition::MultiTool),
        by_level: by_level
            .into_iter()
            .filter_map(|(level, scores)| {
                mean(&scores).map(|m| (format!("level_{level}"), percent(m)))
            })
            .collect(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn percent(fraction: f64) -> f64 {
    (fraction * 10_000.0).round() / 100.0
}

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub results: PathBuf,
    pub summary: PathBuf,
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    instruction: &'a str,
    #[serde(rename = "type")]
    composition: &'static str,
    level: u8,
    score: f64,
    total_tools_expected: usize,
    total_tools_matched: usize,
    tools_called: &'a str,
    expected_tools: &'a str,
    matched_tools: String,
    unmatched_tools: String,
    timestamp: String,
}

impl<'a> CsvRow<'a> {
    fn from_row(row: &'a EvaluationRow) -> Result<Self, EvalError> {
        Ok(Self {
            instruction: &row.instruction,
            composition: row.composition.as_str(),
            level: row.level,
            score: row.score,
            total_tools_expected: row.total_tools_expected,
            total_tools_matched: row.total_tools_matched,
            tools_called: &row.tools_called,
            expected_tools: &row.expected_tools,
            matched_tools: serde_json::to_string(&row.matched_predictions())?,
            unmatched_tools: serde_json::to_string(&row.unmatched)?,
            timestamp: row.timestamp.to_rfc3339(),
        })
    }
}

/// Writes `<prefix>_evaluation_<ts>.csv` and `<prefix>_summary_<ts>.json` into `dir`.
pub fn persist(
    rows: &[EvaluationRow],
    summary: &SummaryStatistics,
    dir: &Path,
    prefix: &str,
    generated_at: DateTime<Local>,
) -> Result<ReportPaths, EvalError> {
    fs::create_dir_all(dir)?;
    let stamp = generated_at.format("%Y%m%d_%H%M%S");

    let results = dir.join(format!("{prefix}_evaluation_{stamp}.csv"));
    let mut writer = csv::Writer::from_path(&results)?;
    if rows.is_empty() {
        writer.write_record(CSV_HEADER)?;
    }
    for row in rows {
        writer.serialize(CsvRow::from_row(row)?)?;
    }
    writer.flush()?;

    let summary_path = dir.join(format!("{prefix}_summary_{stamp}.json"));
    fs::write(&summary_path, serde_json::to_string_pretty(summary)?)?;

    Ok(ReportPaths {
        results,
        summary: summary_path,
    })
}

const CSV_HEADER: [&str; 11] = [
    "instruction",
    "type",
    "level",
    "score",
    "total_tools_expected",
    "total_tools_matched",
    "tools_called",
    "expected_tools",
    "matched_tools",
    "unmatched_tools",
    "timestamp",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn row(composition: ToolComposition, level: u8, matched: usize, expected: usize) -> EvaluationRow {
        let call = ExpectedCall::new("A2B.apply_tool", "/x.xmi");
        let predicted = PredictedCall::new("apply_A2B_transformation_tool", "/x.xmi");
        EvaluationRow {
            instruction: format!("level {level} task"),
            composition,
            level,
            score: if expected == 0 { 0.0 } else { matched as f64 / expected as f64 },
            total_tools_expected: expected,
            total_tools_matched: matched,
            tools_called: "No tools called".into(),
            expected_tools: call.to_string(),
            matched: (0..matched)
                .map(|_| CallMatch { expected: call.clone(), predicted: predicted.clone() })
                .collect(),
            unmatched: (matched..expected).map(|_| call.clone()).collect(),
            error: None,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn match_categories_partition_the_rows() {
        let rows = vec![
            row(ToolComposition::SingleTool, 1, 1, 1),
            row(ToolComposition::SingleTool, 2, 0, 1),
            row(ToolComposition::MultiTool, 3, 1, 2),
            row(ToolComposition::MultiTool, 3, 2, 2),
            row(ToolComposition::MultiTool, 1, 1, 3),
        ];
        let summary = summarize(&rows);
        assert_eq!(summary.total_examples, 5);
        assert_eq!(summary.perfect_matches, 2);
        assert_eq!(summary.failed_matches, 1);
        assert_eq!(summary.partial_matches, 2);
        assert_eq!(
            summary.perfect_matches + summary.failed_matches + summary.partial_matches,
            summary.total_examples
        );
    }

    #[test]
    fn accuracy_is_split_by_type_and_level() {
        let rows = vec![
            row(ToolComposition::SingleTool, 1, 1, 1),
            row(ToolComposition::SingleTool, 2, 0, 1),
            row(ToolComposition::MultiTool, 2, 1, 2),
        ];
        let summary = summarize(&rows);
        assert_eq!(summary.average_score, 50.0);
        assert_eq!(summary.single_tool_accuracy, Some(50.0));
        assert_eq!(summary.multi_tool_accuracy, Some(50.0));
        assert_eq!(summary.by_level.get("level_1"), Some(&100.0));
        assert_eq!(summary.by_level.get("level_2"), Some(&25.0));
        assert!(!summary.by_level.contains_key("level_3"));
    }

    #[test]
    fn averages_are_rounded_to_two_decimals() {
        let rows = vec![
            row(ToolComposition::MultiTool, 1, 1, 3),
            row(ToolComposition::MultiTool, 1, 0, 3),
        ];
        assert_eq!(summarize(&rows).average_score, 16.67);
    }

    #[test]
    fn missing_type_has_no_accuracy() {
        let summary = summarize(&[row(ToolComposition::SingleTool, 1, 0, 1)]);
        assert_eq!(summary.single_tool_accuracy, Some(0.0));
        assert_eq!(summary.multi_tool_accuracy, None);
    }

    #[test]
    fn empty_run_summarizes_to_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_examples, 0);
        assert_eq!(summary.average_score, 0.0);
        assert!(summary.by_level.is_empty());
    }

    #[test]
    fn persist_writes_timestamped_table_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![row(ToolComposition::SingleTool, 1, 1, 1)];
        let summary = summarize(&rows);
        let generated_at = Local::now();

        let paths = persist(&rows, &summary, dir.path(), "atl", generated_at).unwrap();
        let stamp = generated_at.format("%Y%m%d_%H%M%S").to_string();
        assert!(paths.results.ends_with(format!("atl_evaluation_{stamp}.csv")));

        let table = fs::read_to_string(&paths.results).unwrap();
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER.join(",").as_str()));
        assert!(lines.next().unwrap().starts_with("level 1 task,single_tool,1,1.0,1,1,"));

        let written: SummaryStatistics =
            serde_json::from_str(&fs::read_to_string(&paths.summary).unwrap()).unwrap();
        assert_eq!(written, summary);
    }
}
