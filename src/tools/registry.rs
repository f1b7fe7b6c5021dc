//! Name → tool lookup, plus the schema arrays advertised to providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::arguments::ToolArguments;
use super::tool::Tool;
use crate::error::{Result, StepError};
use crate::provider::SchemaStyle;

/// Tool schemas in both provider shapes, computed once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchemas {
    parameters: Vec<Value>,
    input_schema: Vec<Value>,
}

impl ToolSchemas {
    pub fn from_tools<'a>(tools: impl IntoIterator<Item = &'a Arc<dyn Tool>>) -> Self {
        let mut schemas = Self::default();
        for tool in tools {
            schemas.parameters.push(json!({
                "type": "function",
                "function": {
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters().schema,
                }
            }));
            schemas.input_schema.push(json!({
                "name": tool.name(),
                "description": tool.description(),
                "input_schema": tool.parameters().schema,
            }));
        }
        schemas
    }

    /// The array for a provider's schema style.
    pub fn for_style(&self, style: SchemaStyle) -> &[Value] {
        match style {
            SchemaStyle::Parameters => &self.parameters,
            SchemaStyle::InputSchema => &self.input_schema,
        }
    }
}

/// Tool dispatch as seen by the engine.
#[async_trait]
pub trait ToolDispatch: Send + Sync {
    /// Invoke `name`; unknown names fail with [`StepError::UnknownTool`].
    async fn invoke(&self, name: &str, args: &ToolArguments) -> Result<String>;

    fn schemas(&self) -> &ToolSchemas;
}

/// Registry of tools keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    schemas: ToolSchemas,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(tool = tool.name(), "registering tool");
        self.tools.insert(tool.name().to_string(), tool);
        self.schemas = ToolSchemas::from_tools(self.tools.values());
    }

    pub fn with_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolDispatch for ToolRegistry {
    async fn invoke(&self, name: &str, args: &ToolArguments) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| StepError::UnknownTool(name.to_string()))?;
        info!(tool = name, args = %args, "invoking tool");
        tool.execute(args).await
    }

    fn schemas(&self) -> &ToolSchemas {
        &self.schemas
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ToolParameters};

    fn echo() -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            "echo",
            "Echo the text argument",
            ToolParameters::object().string("text", "Text to echo", true).build(),
            |args: ToolArguments| async move { Ok(args.require("echo", "text")?.to_string()) },
        ))
    }

    #[tokio::test]
    async fn invokes_registered_tool() {
        let registry = ToolRegistry::with_tools([echo()]);
        let args: ToolArguments = [("text", "hello")].into_iter().collect();
        assert_eq!(registry.invoke("echo", &args).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::with_tools([echo()]);
        let err = registry.invoke("nope", &ToolArguments::new()).await.unwrap_err();
        assert!(matches!(err, StepError::UnknownTool(name) if name == "nope"));
    }

    #[test]
    fn schemas_follow_provider_style() {
        let registry = ToolRegistry::with_tools([echo()]);
        let openai = registry.schemas().for_style(SchemaStyle::Parameters);
        assert_eq!(openai[0]["function"]["name"], "echo");
        assert_eq!(openai[0]["function"]["parameters"]["required"][0], "text");

        let anthropic = registry.schemas().for_style(SchemaStyle::InputSchema);
        assert_eq!(anthropic[0]["name"], "echo");
        assert_eq!(anthropic[0]["input_schema"]["type"], "object");
    }
}
