//! Mapping from a corpus's abstract API ids to the tool names an agent exposes.

use serde_json::Value;

use crate::eval::dataset::{Dataset, Example, ExpectedCall};
use crate::eval::normalize::ArgumentPayload;

const APPLY_SUFFIX: &str = ".apply_tool";
const GET_SUFFIX: &str = ".get_tool";

pub const GENERIC_APPLY_TOOL: &str = "curl_apply_transformation_tool";
pub const GENERIC_GET_TOOL: &str = "curl_transformation_by_Name_tool";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbstractApi<'a> {
    Apply(&'a str),
    Get(&'a str),
}

impl<'a> AbstractApi<'a> {
    /// Recognizes `<name>.apply_tool` / `<name>.get_tool`, case-insensitively.
    pub fn parse(api_name: &'a str) -> Option<Self> {
        let lower = api_name.to_ascii_lowercase();
        let name = api_name.split('.').next().unwrap_or(api_name);
        if lower.ends_with(APPLY_SUFFIX) {
            Some(AbstractApi::Apply(name))
        } else if lower.ends_with(GET_SUFFIX) {
            Some(AbstractApi::Get(name))
        } else {
            None
        }
    }
}

/// Concrete tool name of an agent that exposes one apply and one get tool per transformation.
pub fn refactor_tool_name(api_name: &str) -> String {
    match AbstractApi::parse(api_name) {
        Some(AbstractApi::Apply(name)) => format!("apply_{name}_transformation_tool"),
        Some(AbstractApi::Get(name)) => format!("list_transformation_{name}_tool"),
        None => api_name.to_string(),
    }
}

/// Per-agent-variant naming convention.
pub trait ToolNameMapper: Send + Sync {
    fn map_name(&self, api_name: &str) -> String;

    /// Rewrites reference arguments for variants that move the transformation name into them.
    fn map_arguments(&self, _api_name: &str, arguments: &ArgumentPayload) -> ArgumentPayload {
        arguments.clone()
    }

    /// Shapes a raw argument payload emitted by the agent before matching.
    fn predicted_arguments(&self, raw: Value) -> ArgumentPayload {
        ArgumentPayload::from(raw)
    }

    fn map_call(&self, call: &ExpectedCall) -> ExpectedCall {
        ExpectedCall {
            api_name: self.map_name(&call.api_name),
            arguments: self.map_arguments(&call.api_name, &call.arguments),
        }
    }
}

/// `apply_<Name>_transformation_tool(file_path)` and `list_transformation_<Name>_tool()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedicatedToolNames;

impl ToolNameMapper for DedicatedToolNames {
    fn map_name(&self, api_name: &str) -> String {
        refactor_tool_name(api_name)
    }

    /// Dedicated tools take a single parameter, so only the first emitted value
    /// is compared.
    fn predicted_arguments(&self, raw: Value) -> ArgumentPayload {
        match raw {
            Value::Object(fields) => fields
                .into_iter()
                .next()
                .map(|(_, value)| ArgumentPayload::from(value))
                .unwrap_or_default(),
            other => ArgumentPayload::from(other),
        }
    }
}

/// One `curl_apply_transformation_tool` taking `"name,path"` and one
/// `curl_transformation_by_Name_tool` taking the name.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericToolNames;

impl ToolNameMapper for GenericToolNames {
    fn map_name(&self, api_name: &str) -> String {
        match AbstractApi::parse(api_name) {
            Some(AbstractApi::Apply(_)) => GENERIC_APPLY_TOOL.to_string(),
            Some(AbstractApi::Get(_)) => GENERIC_GET_TOOL.to_string(),
            None => api_name.to_string(),
        }
    }

    fn map_arguments(&self, api_name: &str, arguments: &ArgumentPayload) -> ArgumentPayload {
        match AbstractApi::parse(api_name) {
            Some(AbstractApi::Apply(name)) => {
                let mut items = vec![Value::String(name.to_string())];
                match Value::from(arguments.clone()) {
                    Value::Array(rest) => items.extend(rest),
                    other => items.push(other),
                }
                ArgumentPayload::List(items)
            }
            Some(AbstractApi::Get(name)) => ArgumentPayload::text(name),
            None => arguments.clone(),
        }
    }
}

/// Freezes a corpus for one agent variant by mapping every expected call.
pub fn convert_corpus(dataset: &Dataset, mapper: &dyn ToolNameMapper) -> Dataset {
    let examples = dataset
        .examples
        .iter()
        .map(|example| Example {
            relevant_apis: example.relevant_apis.iter().map(|call| mapper.map_call(call)).collect(),
            ..example.clone()
        })
        .collect();

    Dataset {
        examples,
        skipped: dataset.skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::dataset::ToolComposition;
    use serde_json::json;

    #[test]
    fn dedicated_names_follow_the_suffix_convention() {
        assert_eq!(
            refactor_tool_name("Class2Relational.apply_tool"),
            "apply_Class2Relational_transformation_tool"
        );
        assert_eq!(
            refactor_tool_name("Class2Relational.get_tool"),
            "list_transformation_Class2Relational_tool"
        );
        assert_eq!(refactor_tool_name("already_concrete_tool"), "already_concrete_tool");
    }

    #[test]
    fn suffix_matching_ignores_case() {
        assert_eq!(
            refactor_tool_name("Families2Persons.Apply_Tool"),
            "apply_Families2Persons_transformation_tool"
        );
        assert_eq!(
            refactor_tool_name("KM32DOT.GET_TOOL"),
            "list_transformation_KM32DOT_tool"
        );
    }

    #[test]
    fn dedicated_variant_unwraps_single_parameter() {
        let mapper = DedicatedToolNames;
        assert_eq!(
            mapper.predicted_arguments(json!({ "file_path": "/a/b.xmi" })),
            ArgumentPayload::text("/a/b.xmi")
        );
        assert_eq!(mapper.predicted_arguments(json!({})), ArgumentPayload::empty());
        assert_eq!(
            mapper.predicted_arguments(json!("/a/b.xmi")),
            ArgumentPayload::text("/a/b.xmi")
        );
    }

    #[test]
    fn dedicated_variant_takes_the_first_emitted_value() {
        let raw: Value = serde_json::from_str(r#"{"file_path": "/a/b.xmi", "a_note": "x"}"#).unwrap();
        assert_eq!(
            DedicatedToolNames.predicted_arguments(raw),
            ArgumentPayload::text("/a/b.xmi")
        );
    }

    #[test]
    fn generic_variant_moves_the_name_into_arguments() {
        let mapper = GenericToolNames;
        let apply = mapper.map_call(&ExpectedCall::new("Class2Relational.apply_tool", "/a/b.xmi"));
        assert_eq!(apply.api_name, GENERIC_APPLY_TOOL);
        assert_eq!(apply.arguments, ArgumentPayload::list(["Class2Relational", "/a/b.xmi"]));

        let get = mapper.map_call(&ExpectedCall::new("Class2Relational.get_tool", ""));
        assert_eq!(get.api_name, GENERIC_GET_TOOL);
        assert_eq!(get.arguments, ArgumentPayload::text("Class2Relational"));

        let concrete = mapper.map_call(&ExpectedCall::new("curl_all_transformations_tool", ""));
        assert_eq!(concrete.api_name, "curl_all_transformations_tool");
        assert_eq!(concrete.arguments, ArgumentPayload::empty());
    }

    #[test]
    fn converted_corpus_keeps_examples_and_order() {
        let dataset = Dataset {
            examples: vec![Example {
                instruction: "Transform '/a/b.xmi' using Class2Relational".into(),
                composition: ToolComposition::MultiTool,
                level: 1,
                relevant_apis: vec![
                    ExpectedCall::new("Class2Relational.get_tool", ""),
                    ExpectedCall::new("Class2Relational.apply_tool", "/a/b.xmi"),
                ],
            }],
            skipped: 0,
        };

        let converted = convert_corpus(&dataset, &GenericToolNames);
        let apis = &converted.examples[0].relevant_apis;
        assert_eq!(apis[0].api_name, GENERIC_GET_TOOL);
        assert_eq!(apis[1].arguments, ArgumentPayload::from(json!(["Class2Relational", "/a/b.xmi"])));
        assert_eq!(converted.examples[0].instruction, dataset.examples[0].instruction);
    }
}
