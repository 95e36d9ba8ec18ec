use std::path::PathBuf;

use chrono::Local;
use tracing::{info, warn};

use crate::{
    error::EvalError,
    eval::{
        dataset::{Dataset, Example},
        matcher::{match_calls, render_expected, render_predicted},
        naming::ToolNameMapper,
        report::{persist, summarize, EvaluationRow, ReportPaths, SummaryStatistics},
        runner::{extract_tool_calls, AgentRunner, AgentTrace},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    Loaded,
    Running,
    Aggregated,
    Persisted,
}

impl EvaluationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationState::Loaded => "loaded",
            EvaluationState::Running => "running",
            EvaluationState::Aggregated => "aggregated",
            EvaluationState::Persisted => "persisted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub output_dir: PathBuf,
    pub report_prefix: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("evaluation_results"),
            report_prefix: "atl".to_string(),
        }
    }
}

impl EvaluatorConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_report_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.report_prefix = prefix.into();
        self
    }
}

/// Runs a dataset through an agent and scores every example.
///
/// Each phase may run once and only after the one before it:
/// [`run`](Self::run), [`aggregate`](Self::aggregate), [`persist`](Self::persist).
pub struct Evaluator {
    dataset: Dataset,
    runner: AgentRunner,
    config: EvaluatorConfig,
    state: EvaluationState,
    rows: Vec<EvaluationRow>,
    summary: Option<SummaryStatistics>,
}

impl Evaluator {
    pub fn new(dataset: Dataset, runner: AgentRunner, config: EvaluatorConfig) -> Self {
        Self {
            dataset,
            runner,
            config,
            state: EvaluationState::Loaded,
            rows: Vec::new(),
            summary: None,
        }
    }

    pub fn state(&self) -> EvaluationState {
        self.state
    }

    pub fn rows(&self) -> &[EvaluationRow] {
        &self.rows
    }

    pub fn summary(&self) -> Option<&SummaryStatistics> {
        self.summary.as_ref()
    }

    fn expect_state(&self, expected: EvaluationState) -> Result<(), EvalError> {
        if self.state != expected {
            return Err(EvalError::State {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            });
        }
        Ok(())
    }

    /// Evaluates every example in order. Agent failures score zero and never
    /// stop the run.
    pub async fn run(&mut self) -> Result<&[EvaluationRow], EvalError> {
        self.expect_state(EvaluationState::Loaded)?;
        self.state = EvaluationState::Running;

        let total = self.dataset.len();
        info!(total, "starting evaluation");

        for (index, example) in self.dataset.examples.iter().enumerate() {
            let position = index + 1;
            info!(
                "[{position}/{total}] ({:.1}%) {} level {}: {}",
                position as f64 * 100.0 / total as f64,
                example.composition,
                example.level,
                example.instruction
            );

            let trace = self.runner.run(example).await;
            let row = evaluate_example(example, &trace, self.runner.mapper());
            if let Some(error) = &row.error {
                warn!(index = position, %error, "example scored without a trace");
            }

            info!("  called:   {}", row.tools_called);
            info!("  expected: {}", row.expected_tools);
            info!("  score:    {:.2}", row.score);
            self.rows.push(row);
        }

        Ok(&self.rows)
    }

    pub fn aggregate(&mut self) -> Result<&SummaryStatistics, EvalError> {
        self.expect_state(EvaluationState::Running)?;
        let summary = summarize(&self.rows);
        info!(
            total = summary.total_examples,
            average = summary.average_score,
            perfect = summary.perfect_matches,
            partial = summary.partial_matches,
            failed = summary.failed_matches,
            "evaluation aggregated"
        );
        self.state = EvaluationState::Aggregated;
        Ok(self.summary.insert(summary))
    }

    pub fn persist(&mut self) -> Result<ReportPaths, EvalError> {
        self.expect_state(EvaluationState::Aggregated)?;
        let summary = self.summary.as_ref().ok_or(EvalError::State {
            expected: EvaluationState::Aggregated.as_str(),
            actual: self.state.as_str(),
        })?;

        let paths = persist(
            &self.rows,
            summary,
            &self.config.output_dir,
            &self.config.report_prefix,
            Local::now(),
        )?;
        info!(
            results = %paths.results.display(),
            summary = %paths.summary.display(),
            "evaluation results saved"
        );
        self.state = EvaluationState::Persisted;
        Ok(paths)
    }

    /// Runs all phases and returns the summary with the written report paths.
    pub async fn evaluate_all(&mut self) -> Result<(SummaryStatistics, ReportPaths), EvalError> {
        self.run().await?;
        let summary = self.aggregate()?.clone();
        let paths = self.persist()?;
        Ok((summary, paths))
    }
}

/// Scores one agent trace against its example.
pub fn evaluate_example(
    example: &Example,
    trace: &AgentTrace,
    mapper: &dyn ToolNameMapper,
) -> EvaluationRow {
    let predicted = extract_tool_calls(&trace.messages, mapper);
    let result = match_calls(&example.relevant_apis, &predicted, mapper);

    EvaluationRow {
        instruction: example.instruction.clone(),
        composition: example.composition,
        level: example.level,
        score: result.score(),
        total_tools_expected: result.expected_total,
        total_tools_matched: result.matched_count(),
        tools_called: render_predicted(&predicted),
        expected_tools: render_expected(&example.relevant_apis),
        matched: result.matched,
        unmatched: result.unmatched,
        error: trace.error.clone(),
        timestamp: Local::now(),
    }
}
