use std::fmt;

use serde::{Deserialize, Serialize};

use crate::eval::dataset::ExpectedCall;
use crate::eval::naming::ToolNameMapper;
use crate::eval::normalize::{args_match, ArgumentPayload};

/// A tool invocation the agent under test actually issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedCall {
    pub tool_name: String,
    pub arguments: ArgumentPayload,
}

impl PredictedCall {
    pub fn new(tool_name: impl Into<String>, arguments: impl Into<ArgumentPayload>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments: arguments.into(),
        }
    }
}

impl fmt::Display for PredictedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tool_name, self.arguments)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallMatch {
    pub expected: ExpectedCall,
    pub predicted: PredictedCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: Vec<CallMatch>,
    pub unmatched: Vec<ExpectedCall>,
    pub expected_total: usize,
}

impl MatchResult {
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    pub fn score(&self) -> f64 {
        if self.expected_total == 0 {
            return 0.0;
        }
        self.matched.len() as f64 / self.expected_total as f64
    }
}

/// Greedy first-fit matching: each expected call takes the first unconsumed
/// prediction with the same tool name and equal arguments. A prediction is
/// consumed at most once.
pub fn match_calls(
    expected: &[ExpectedCall],
    predicted: &[PredictedCall],
    mapper: &dyn ToolNameMapper,
) -> MatchResult {
    let mut consumed = vec![false; predicted.len()];
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();

    for call in expected {
        let mapped = mapper.map_call(call);
        let hit = (0..predicted.len()).find(|&i| {
            let candidate = &predicted[i];
            !consumed[i]
                && candidate.tool_name.eq_ignore_ascii_case(&mapped.api_name)
                && args_match(&mapped.arguments, &candidate.arguments)
        });

        match hit {
            Some(i) => {
                consumed[i] = true;
                matched.push(CallMatch {
                    expected: call.clone(),
                    predicted: predicted[i].clone(),
                });
            }
            None => unmatched.push(call.clone()),
        }
    }

    MatchResult {
        matched,
        unmatched,
        expected_total: expected.len(),
    }
}

pub fn render_predicted(calls: &[PredictedCall]) -> String {
    if calls.is_empty() {
        return "No tools called".to_string();
    }
    join_rendered(calls)
}

pub fn render_expected(calls: &[ExpectedCall]) -> String {
    join_rendered(calls)
}

fn join_rendered<T: fmt::Display>(calls: &[T]) -> String {
    calls
        .iter()
        .map(|call| call.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}
