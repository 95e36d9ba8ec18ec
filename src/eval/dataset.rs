use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::EvalError;
use crate::eval::normalize::ArgumentPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolComposition {
    SingleTool,
    MultiTool,
}

impl ToolComposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolComposition::SingleTool => "single_tool",
            ToolComposition::MultiTool => "multi_tool",
        }
    }
}

impl fmt::Display for ToolComposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedCall {
    pub api_name: String,
    #[serde(default)]
    pub arguments: ArgumentPayload,
}

impl ExpectedCall {
    pub fn new(api_name: impl Into<String>, arguments: impl Into<ArgumentPayload>) -> Self {
        Self {
            api_name: api_name.into(),
            arguments: arguments.into(),
        }
    }
}

impl fmt::Display for ExpectedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.api_name, self.arguments)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub instruction: String,
    #[serde(rename = "type")]
    pub composition: ToolComposition,
    pub level: u8,
    pub relevant_apis: Vec<ExpectedCall>,
}

/// The loaded corpus, multi-tool examples first.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub examples: Vec<Example>,
    /// Entries dropped at load time because they were malformed.
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct RawExample {
    instruction: String,
    level: Value,
    relevant_apis: Vec<ExpectedCall>,
}

#[derive(Debug, Serialize)]
struct CorpusEntry<'a> {
    instruction: &'a str,
    level: u8,
    relevant_apis: &'a [ExpectedCall],
}

const GROUPS: [ToolComposition; 2] = [ToolComposition::MultiTool, ToolComposition::SingleTool];

impl Dataset {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn count(&self, composition: ToolComposition) -> usize {
        self.examples
            .iter()
            .filter(|example| example.composition == composition)
            .count()
    }

    pub fn from_value(value: Value) -> Result<Self, EvalError> {
        let Value::Object(mut groups) = value else {
            return Err(EvalError::Dataset(
                "top level must be an object with single_tool and multi_tool keys".to_string(),
            ));
        };

        let mut dataset = Dataset::default();
        for composition in GROUPS {
            let entries = match groups.remove(composition.as_str()) {
                None => continue,
                Some(Value::Array(entries)) => entries,
                Some(_) => {
                    warn!(group = composition.as_str(), "dataset group is not a list, skipping it");
                    continue;
                }
            };

            for (index, entry) in entries.into_iter().enumerate() {
                match parse_example(entry, composition) {
                    Ok(example) => dataset.examples.push(example),
                    Err(reason) => {
                        warn!(group = composition.as_str(), index, %reason, "skipping malformed example");
                        dataset.skipped += 1;
                    }
                }
            }
        }

        Ok(dataset)
    }

    /// Serializes back to the `{"single_tool": [...], "multi_tool": [...]}` layout.
    pub fn to_value(&self) -> Result<Value, EvalError> {
        let mut groups = Map::new();
        for composition in GROUPS {
            let entries = self
                .examples
                .iter()
                .filter(|example| example.composition == composition)
                .map(|example| {
                    serde_json::to_value(CorpusEntry {
                        instruction: &example.instruction,
                        level: example.level,
                        relevant_apis: &example.relevant_apis,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            groups.insert(composition.as_str().to_string(), Value::Array(entries));
        }
        Ok(Value::Object(groups))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EvalError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let value = self.to_value()?;
        fs::write(path, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }
}

/// Reads a JSON (or YAML, by extension) corpus.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset, EvalError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let value: Value = if matches!(ext, "yaml" | "yml") {
        serde_yaml::from_slice(&bytes)?
    } else {
        serde_json::from_slice(&bytes)?
    };

    let dataset = Dataset::from_value(value)?;
    info!(
        total = dataset.len(),
        multi_tool = dataset.count(ToolComposition::MultiTool),
        single_tool = dataset.count(ToolComposition::SingleTool),
        skipped = dataset.skipped,
        "loaded dataset from {}",
        path.display()
    );
    Ok(dataset)
}

fn parse_example(entry: Value, composition: ToolComposition) -> Result<Example, String> {
    let raw: RawExample = serde_json::from_value(entry).map_err(|e| e.to_string())?;
    let level = parse_level(&raw.level)?;
    Ok(Example {
        instruction: raw.instruction,
        composition,
        level,
        relevant_apis: raw.relevant_apis,
    })
}

fn parse_level(value: &Value) -> Result<u8, String> {
    let level = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match level {
        Some(level @ 1..=3) => Ok(level as u8),
        _ => Err(format!("level must be 1, 2 or 3, got {value}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn corpus() -> Value {
        json!({
            "single_tool": [
                {
                    "instruction": "Transform '/a/b.xmi' using the Class2Relational transformation",
                    "level": 1,
                    "relevant_apis": [{ "api_name": "Class2Relational.apply_tool", "arguments": "/a/b.xmi" }]
                },
                { "instruction": "missing apis", "level": 2 },
                {
                    "instruction": "bad level",
                    "level": "high",
                    "relevant_apis": [{ "api_name": "X.get_tool", "arguments": "" }]
                }
            ],
            "multi_tool": [
                {
                    "instruction": "Show then apply KM32DOT to '/m.xmi'",
                    "level": "2",
                    "relevant_apis": [
                        { "api_name": "KM32DOT.get_tool", "arguments": "" },
                        { "api_name": "KM32DOT.apply_tool", "arguments": ["/m.xmi"] }
                    ]
                }
            ]
        })
    }

    #[test]
    fn multi_tool_examples_come_first() {
        let dataset = Dataset::from_value(corpus()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.examples[0].composition, ToolComposition::MultiTool);
        assert_eq!(dataset.examples[0].level, 2);
        assert_eq!(dataset.examples[1].composition, ToolComposition::SingleTool);
    }

    #[test]
    fn malformed_examples_are_skipped() {
        let dataset = Dataset::from_value(corpus()).unwrap();
        assert_eq!(dataset.skipped, 2);
    }

    #[test]
    fn arguments_keep_their_shape() {
        let dataset = Dataset::from_value(corpus()).unwrap();
        let apis = &dataset.examples[0].relevant_apis;
        assert_eq!(apis[0].arguments, ArgumentPayload::empty());
        assert_eq!(apis[1].arguments, ArgumentPayload::list(["/m.xmi"]));
    }

    #[test]
    fn non_object_top_level_is_fatal() {
        assert!(matches!(
            Dataset::from_value(json!([1, 2])),
            Err(EvalError::Dataset(_))
        ));
    }

    #[test]
    fn missing_groups_are_empty() {
        let dataset = Dataset::from_value(json!({ "single_tool": [] })).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn saved_corpus_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("corpus.json");
        let dataset = Dataset::from_value(corpus()).unwrap();
        dataset.save(&path).unwrap();

        let reloaded = load_dataset(&path).unwrap();
        assert_eq!(reloaded.examples, dataset.examples);
        assert_eq!(reloaded.skipped, 0);
    }

    #[test]
    fn yaml_corpora_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.yaml");
        fs::write(
            &path,
            "single_tool:\n  - instruction: apply it\n    level: 3\n    relevant_apis:\n      - api_name: A2B.apply_tool\n        arguments: /x.xmi\n",
        )
        .unwrap();

        let dataset = load_dataset(&path).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.examples[0].level, 3);
    }
}
