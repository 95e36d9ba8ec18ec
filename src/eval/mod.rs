pub mod dataset;
pub mod evaluator;
pub mod matcher;
pub mod naming;
pub mod normalize;
pub mod report;
pub mod runner;

pub use dataset::{load_dataset, Dataset, Example, ExpectedCall, ToolComposition};
pub use evaluator::{evaluate_example, EvaluationState, Evaluator, EvaluatorConfig};
pub use matcher::{match_calls, MatchResult, PredictedCall};
pub use naming::{convert_corpus, refactor_tool_name, DedicatedToolNames, GenericToolNames, ToolNameMapper};
pub use normalize::{args_match, normalize, ArgumentPayload, Normalized};
pub use report::{summarize, EvaluationRow, ReportPaths, SummaryStatistics};
pub use runner::{extract_tool_calls, Agent, AgentRunner, AgentTrace};
