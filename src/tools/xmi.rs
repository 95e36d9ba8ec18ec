use std::{io::ErrorKind, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::functions::{FunctionParameter, FunctionParameters};
use crate::tools::{ToolDescriptor, ToolResult};

pub const EXTRACT_TOOL: &str = "extract_input_metamodel_name";

static DEFAULT_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"xmlns="([^"]*)""#).expect("valid default namespace regex"));
static PREFIXED_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"xmlns:(\w+)="([^"]*)""#).expect("valid prefixed namespace regex"));

const STANDARD_PREFIXES: [&str; 2] = ["xmi", "xsi"];

/// Metamodel name of an XMI document: the default `xmlns` value, or else the
/// first non-standard namespace prefix that is used by an element, upper-cased.
pub fn extract_metamodel_name(content: &str) -> Option<String> {
    if let Some(captures) = DEFAULT_NAMESPACE.captures(content) {
        return Some(captures[1].to_string());
    }

    let prefix = PREFIXED_NAMESPACE
        .captures_iter(content)
        .map(|captures| captures.get(1).map_or("", |m| m.as_str()))
        .find(|prefix| !STANDARD_PREFIXES.contains(prefix))?;

    let root_element = Regex::new(&format!(r"<{}:\w+", regex::escape(prefix))).ok()?;
    root_element
        .is_match(content)
        .then(|| prefix.to_uppercase())
}

pub fn extract_tool_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        EXTRACT_TOOL,
        "Extracts the metamodel name from an XMI file. The input should be exactly a file path to an XMI file. Returns the metamodel name (like 'Class', 'Grafcet', 'ECORE', or 'KM3').",
    )
    .with_input_schema(
        FunctionParameters::new()
            .with_parameter(FunctionParameter::string("file_path"))
            .into_schema(),
    )
}

/// Reads the model file and reports its metamodel as tool output text.
pub async fn extract_from_file(path: &Path) -> ToolResult {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => match extract_metamodel_name(&content) {
            Some(name) => ToolResult::text(format!("Input metamodel name: {name}")),
            None => ToolResult::text("Could not extract metamodel name from the file."),
        },
        Err(err) if err.kind() == ErrorKind::NotFound => {
            ToolResult::error_text(format!("Error: File not found at path: {}", path.display()))
        }
        Err(err) => ToolResult::error_text(format!("An error occurred while processing the file: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_namespace_wins() {
        let xmi = r#"<?xml version="1.0"?><Class xmlns="Class" xmlns:xmi="http://www.omg.org/XMI"/>"#;
        assert_eq!(extract_metamodel_name(xmi).as_deref(), Some("Class"));
    }

    #[test]
    fn prefixed_root_element_is_upper_cased() {
        let xmi = r#"<?xml version="1.0"?>
<km3:Metamodel xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:km3="http://km3">
  <contents/>
</km3:Metamodel>"#;
        assert_eq!(extract_metamodel_name(xmi).as_deref(), Some("KM3"));
    }

    #[tokio::test]
    async fn missing_files_are_reported_as_text() {
        let result = extract_from_file(Path::new("/definitely/not/here.xmi")).await;
        assert!(result.is_error);
        assert_eq!(result.render(), "Error: File not found at path: /definitely/not/here.xmi");
    }

    #[tokio::test]
    async fn reads_metamodel_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.xmi");
        std::fs::write(&path, r#"<Grafcet xmlns="Grafcet"/>"#).unwrap();
        assert_eq!(extract_from_file(&path).await.render(), "Input metamodel name: Grafcet");
    }

    #[test]
    fn unused_prefix_is_not_a_metamodel() {
        let xmi = r#"<root xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:ecore="http://ecore"/>"#;
        assert_eq!(extract_metamodel_name(xmi), None);
    }
}
