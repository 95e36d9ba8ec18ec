use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: FunctionParameters::new().into_schema(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn to_tool(&self) -> Tool {
        Tool::from(self.clone())
    }
}

/// JSON-schema object builder for tool input schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParameters {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
}

impl Default for FunctionParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionParameters {
    pub fn new() -> Self {
        Self {
            kind: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: Some(false),
        }
    }

    pub fn with_parameter(mut self, parameter: FunctionParameter) -> Self {
        self.add_parameter(parameter);
        self
    }

    pub fn add_parameter(&mut self, parameter: FunctionParameter) {
        let FunctionParameter {
            name,
            mut schema,
            description,
        } = parameter;

        if let Some(description) = description {
            if let Some(object) = schema.as_object_mut() {
                object.insert("description".to_string(), Value::String(description));
            }
        }

        self.required.push(name.clone());

        self.properties.insert(name, schema);
    }

    pub fn into_schema(self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
    }
}

#[derive(Debug, Clone)]
pub struct FunctionParameter {
    pub name: String,
    pub schema: Value,
    pub description: Option<String>,
}

impl FunctionParameter {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, serde_json::json!({ "type": "string" }))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: ToolType,
    pub function: FunctionDefinition,
}

impl From<FunctionDefinition> for Tool {
    fn from(function: FunctionDefinition) -> Self {
        Self {
            kind: ToolType::Function,
            function,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Function,
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
    pub raw_arguments: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            raw_arguments: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: Option<String>,
    pub kind: ToolCallType,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(function: FunctionCall) -> Self {
        Self {
            id: None,
            kind: ToolCallType::Function,
            function,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ToolCallType {
    Function,
}

impl Serialize for ToolCall {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ToolCall", 3)?;
        if let Some(id) = &self.id {
            state.serialize_field("id", id)?;
        }
        state.serialize_field("type", &self.kind)?;
        state.serialize_field("function", &SerializableFunctionCall(&self.function))?;
        state.end()
    }
}

impl Serialize for ToolCallType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ToolCallType::Function => serializer.serialize_str("function"),
        }
    }
}

impl<'de> Deserialize<'de> for ToolCall {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawFunctionCall {
            name: String,
            #[serde(default)]
            arguments: String,
        }

        #[derive(Deserialize)]
        struct RawToolCall {
            id: Option<String>,
            #[serde(rename = "type")]
            kind: String,
            function: RawFunctionCall,
        }

        let raw = RawToolCall::deserialize(deserializer)?;
        let kind = match raw.kind.as_str() {
            "function" => ToolCallType::Function,
            other => {
                return Err(serde::de::Error::custom(format!(
                    "unsupported tool call type '{other}'"
                )))
            }
        };

        // Models occasionally emit bare strings instead of a JSON object; keep them as text.
        let arguments = if raw.function.arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&raw.function.arguments)
                .unwrap_or_else(|_| Value::String(raw.function.arguments.clone()))
        };

        Ok(Self {
            id: raw.id,
            kind,
            function: FunctionCall {
                name: raw.function.name,
                arguments,
                raw_arguments: Some(raw.function.arguments),
            },
        })
    }
}

struct SerializableFunctionCall<'a>(&'a FunctionCall);

impl<'a> Serialize for SerializableFunctionCall<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("function", 2)?;
        state.serialize_field("name", &self.0.name)?;
        let raw = if let Some(raw) = &self.0.raw_arguments {
            raw.clone()
        } else {
            serde_json::to_string(&self.0.arguments)
                .map_err(|error| serde::ser::Error::custom(error.to_string()))?
        };
        state.serialize_field("arguments", &raw)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_keeps_non_json_arguments_as_text() {
        let raw = json!({
            "id": "call_1",
            "type": "function",
            "function": { "name": "curl_transformation_by_Name_tool", "arguments": "Class2Relational" }
        });
        let call: ToolCall = serde_json::from_value(raw).unwrap();
        assert_eq!(call.function.arguments, json!("Class2Relational"));
    }

    #[test]
    fn tool_call_parses_object_arguments() {
        let raw = json!({
            "type": "function",
            "function": { "name": "apply", "arguments": "{\"file_path\":\"/a/b.xmi\"}" }
        });
        let call: ToolCall = serde_json::from_value(raw).unwrap();
        assert_eq!(call.function.arguments, json!({ "file_path": "/a/b.xmi" }));
        assert!(call.id.is_none());
    }

    #[test]
    fn parameters_schema_lists_required_fields() {
        let schema = FunctionParameters::new()
            .with_parameter(FunctionParameter::string("input_str").with_description("name,path"))
            .into_schema();
        assert_eq!(schema["required"], json!(["input_str"]));
        assert_eq!(schema["properties"]["input_str"]["description"], json!("name,path"));
        assert_eq!(schema["additionalProperties"], json!(false));
    }
}
