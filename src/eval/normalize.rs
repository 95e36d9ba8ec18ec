//! Canonical forms for tool-call arguments.
//!
//! Agents and corpora serialize the same `(transformation, path)` pair in many
//! shapes: `{"input_str": "name,path"}`, `["name", "path"]`, `"name, path"`,
//! `"['name', 'path']"`. [`normalize`] collapses all of them into a
//! [`Normalized`] value so that [`args_match`] can compare them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapping keys whose value packs the whole argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedKey {
    /// `{"input_str": "a,b"}`: comma separated values.
    InputStr,
    /// `{"query": "a"}`: a single value.
    Query,
}

impl PackedKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackedKey::InputStr => "input_str",
            PackedKey::Query => "query",
        }
    }
}

/// An argument payload as it crosses the agent boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ArgumentPayload {
    Text(String),
    List(Vec<Value>),
    Packed {
        key: PackedKey,
        fields: Map<String, Value>,
    },
    Mapping(Map<String, Value>),
    Other(Value),
}

impl ArgumentPayload {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    /// Value stored under the packing key, for [`ArgumentPayload::Packed`] only.
    pub fn packed_value(&self) -> Option<&Value> {
        match self {
            ArgumentPayload::Packed { key, fields } => fields.get(key.as_str()),
            _ => None,
        }
    }
}

impl Default for ArgumentPayload {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for ArgumentPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ArgumentPayload::Text(text),
            Value::Array(items) => ArgumentPayload::List(items),
            Value::Object(fields) => {
                if fields.contains_key(PackedKey::InputStr.as_str()) {
                    ArgumentPayload::Packed {
                        key: PackedKey::InputStr,
                        fields,
                    }
                } else if fields.contains_key(PackedKey::Query.as_str()) {
                    ArgumentPayload::Packed {
                        key: PackedKey::Query,
                        fields,
                    }
                } else {
                    ArgumentPayload::Mapping(fields)
                }
            }
            other => ArgumentPayload::Other(other),
        }
    }
}

impl From<ArgumentPayload> for Value {
    fn from(payload: ArgumentPayload) -> Self {
        match payload {
            ArgumentPayload::Text(text) => Value::String(text),
            ArgumentPayload::List(items) => Value::Array(items),
            ArgumentPayload::Packed { fields, .. } | ArgumentPayload::Mapping(fields) => {
                Value::Object(fields)
            }
            ArgumentPayload::Other(value) => value,
        }
    }
}

impl From<&str> for ArgumentPayload {
    fn from(value: &str) -> Self {
        ArgumentPayload::Text(value.to_string())
    }
}

impl fmt::Display for ArgumentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentPayload::Text(text) => f.write_str(text),
            other => {
                let value = Value::from(other.clone());
                write!(f, "{value}")
            }
        }
    }
}

/// Comparable form of an [`ArgumentPayload`].
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Scalar(String),
    Sequence(Vec<String>),
    Mapping(Map<String, Value>),
}

impl Normalized {
    fn into_sequence(self) -> Option<Vec<String>> {
        match self {
            Normalized::Scalar(value) => Some(vec![value]),
            Normalized::Sequence(values) => Some(values),
            Normalized::Mapping(_) => None,
        }
    }

    fn is_sequence(&self) -> bool {
        matches!(self, Normalized::Sequence(_))
    }
}

impl From<Normalized> for ArgumentPayload {
    fn from(normalized: Normalized) -> Self {
        match normalized {
            Normalized::Scalar(value) => ArgumentPayload::Text(value),
            Normalized::Sequence(values) => ArgumentPayload::list(values),
            Normalized::Mapping(fields) => ArgumentPayload::from(Value::Object(fields)),
        }
    }
}

pub fn normalize(payload: &ArgumentPayload) -> Normalized {
    match payload {
        ArgumentPayload::Packed {
            key: PackedKey::InputStr,
            ..
        } => {
            let packed = payload.packed_value().map(stringify).unwrap_or_default();
            Normalized::Sequence(split_and_clean(&packed))
        }
        ArgumentPayload::Packed {
            key: PackedKey::Query,
            ..
        } => Normalized::Scalar(clean(&payload.packed_value().map(stringify).unwrap_or_default())),
        ArgumentPayload::Mapping(fields) => Normalized::Mapping(fields.clone()),
        ArgumentPayload::List(items) => Normalized::Sequence(clean_all(items)),
        ArgumentPayload::Text(text) => normalize_text(text),
        ArgumentPayload::Other(value) => Normalized::Scalar(clean(&stringify(value))),
    }
}

/// Argument order carries no meaning, so sequences are compared as multisets.
pub fn args_match(expected: &ArgumentPayload, predicted: &ArgumentPayload) -> bool {
    let expected = normalize(expected);
    let predicted = normalize(predicted);

    if expected.is_sequence() || predicted.is_sequence() {
        let (Some(mut expected), Some(mut predicted)) =
            (expected.into_sequence(), predicted.into_sequence())
        else {
            return false;
        };
        expected.sort();
        predicted.sort();
        return expected == predicted;
    }

    expected == predicted
}

fn normalize_text(text: &str) -> Normalized {
    if text.starts_with('[') && text.ends_with(']') {
        if let Some(items) = parse_sequence_literal(text) {
            return Normalized::Sequence(items.iter().map(|item| clean(item)).collect());
        }
    }

    if text.contains(',') {
        return Normalized::Sequence(split_and_clean(text));
    }

    Normalized::Scalar(clean(text))
}

fn clean_all(items: &[Value]) -> Vec<String> {
    items.iter().map(|item| clean(&stringify(item))).collect()
}

fn split_and_clean(text: &str) -> Vec<String> {
    text.split(',').map(clean).collect()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn clean(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\'' || c == '"')
        .to_string()
}

/// Parses `[...]` text as a JSON array, or failing that as a Python-style list
/// literal of quoted strings, numbers and `True`/`False`/`None`.
fn parse_sequence_literal(text: &str) -> Option<Vec<String>> {
    if let Ok(items) = serde_json::from_str::<Vec<Value>>(text) {
        return Some(items.iter().map(stringify).collect());
    }
    parse_python_list(text)
}

fn parse_python_list(text: &str) -> Option<Vec<String>> {
    let mut chars = text.trim().chars().peekable();
    if chars.next()? != '[' {
        return None;
    }

    let mut items = Vec::new();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.peek()? {
            ']' => {
                chars.next();
                break;
            }
            '\'' | '"' => {
                let quote = chars.next()?;
                let mut item = String::new();
                loop {
                    match chars.next()? {
                        '\\' => item.push(chars.next()?),
                        c if c == quote => break,
                        c => item.push(c),
                    }
                }
                items.push(item);
            }
            _ => {
                let mut token = String::new();
                while let Some(c) = chars.next_if(|c| *c != ',' && *c != ']') {
                    token.push(c);
                }
                let token = token.trim();
                let literal = matches!(token, "True" | "False" | "None")
                    || token.parse::<f64>().is_ok();
                if !literal {
                    return None;
                }
                items.push(token.to_string());
            }
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next()? {
            ',' => continue,
            ']' => break,
            _ => return None,
        }
    }

    if chars.next().is_some() {
        return None;
    }
    Some(items)
}
