use std::collections::BTreeMap;

use crate::functions::{FunctionParameter, FunctionParameters};
use crate::tools::{engine::Transformation, ToolDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolKind {
    Apply,
    Get,
}

impl ToolKind {
    pub fn tool_name(&self, transformation: &str) -> String {
        match self {
            ToolKind::Apply => format!("apply_{transformation}_transformation_tool"),
            ToolKind::Get => format!("list_transformation_{transformation}_tool"),
        }
    }
}

/// What a registered tool dispatches to.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDescriptor {
    pub kind: ToolKind,
    pub transformation: String,
    pub tool_name: String,
    pub description: String,
}

impl HandlerDescriptor {
    pub fn descriptor(&self) -> ToolDescriptor {
        let descriptor = ToolDescriptor::new(&self.tool_name, &self.description);
        match self.kind {
            ToolKind::Apply => descriptor.with_input_schema(
                FunctionParameters::new()
                    .with_parameter(
                        FunctionParameter::string("file_path").with_description("Path to the input model file"),
                    )
                    .into_schema(),
            ),
            ToolKind::Get => descriptor,
        }
    }
}

/// Tools registered per transformation, keyed by `(kind, transformation name)`.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<(ToolKind, String), HandlerDescriptor>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One apply and one get tool per transformation.
    pub fn from_transformations(transformations: &[Transformation]) -> Self {
        let mut registry = Self::new();
        for transformation in transformations {
            registry.register_transformation(transformation);
        }
        registry
    }

    pub fn register_transformation(&mut self, transformation: &Transformation) {
        let name = &transformation.name;
        let (input, output) = match (transformation.input_model(), transformation.output_model()) {
            (Some(input), Some(output)) => (input, output),
            _ => {
                self.register(ToolKind::Apply, name, format!("Applies the transformation {name}."));
                self.register(ToolKind::Get, name, format!("Displays the details of the transformation {name}."));
                return;
            }
        };

        self.register(
            ToolKind::Apply,
            name,
            format!(
                "Input metamodel: {input}, Output metamodel: {output}. This tool takes: {input} model as input and produces {output} model."
            ),
        );
        self.register(
            ToolKind::Get,
            name,
            format!(
                "This tool displays the details of the transformation {name} that transforms: {input} model into {output} model."
            ),
        );
    }

    pub fn register(&mut self, kind: ToolKind, transformation: &str, description: impl Into<String>) {
        let descriptor = HandlerDescriptor {
            kind,
            transformation: transformation.to_string(),
            tool_name: kind.tool_name(transformation),
            description: description.into(),
        };
        self.handlers.insert((kind, transformation.to_string()), descriptor);
    }

    pub fn get(&self, kind: ToolKind, transformation: &str) -> Option<&HandlerDescriptor> {
        self.handlers.get(&(kind, transformation.to_string()))
    }

    /// Reverse lookup from an emitted tool name.
    pub fn resolve(&self, tool_name: &str) -> Option<&HandlerDescriptor> {
        self.handlers
            .values()
            .find(|handler| handler.tool_name.eq_ignore_ascii_case(tool_name))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.handlers.values().map(HandlerDescriptor::descriptor).collect()
    }
}
