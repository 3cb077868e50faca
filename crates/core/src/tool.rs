//! Tools: the capabilities a turn can use.
//!
//! A tool is either **local** (executed in-process by a [`LocalTool`]
//! handler) or **remote** (executed entirely by the hosted service and
//! described here only by its schema and opaque service configuration).
//! Both kinds live in one [`ToolRegistry`] and are declared together on
//! every request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{RegistryError, ToolError};

/// Where a tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Executed in the orchestrator's own process.
    Local,
    /// Executed by the hosted service.
    Remote,
}

/// A capability executed in-process.
///
/// Handlers are expected to be fast. A handler that needs long-running I/O
/// should enforce its own cancellation.
#[async_trait]
pub trait LocalTool: Send + Sync {
    /// The unique name of this tool (e.g., "calculate").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the service).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;
}

/// A capability executed by the service (hosted search, code execution, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool's parameters, informational for remote tools.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Service-specific configuration, passed through untouched.
    pub service_config: serde_json::Value,
}

impl RemoteTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        service_config: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
            service_config,
        }
    }
}

/// A registered capability. Remote tools carry no handler by construction.
pub enum Tool {
    Local(Box<dyn LocalTool>),
    Remote(RemoteTool),
}

impl Tool {
    /// Wrap a local handler.
    pub fn local(tool: impl LocalTool + 'static) -> Self {
        Self::Local(Box::new(tool))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Local(t) => t.name(),
            Self::Remote(t) => &t.name,
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::Local(_) => ToolKind::Local,
            Self::Remote(_) => ToolKind::Remote,
        }
    }

    /// Convert this tool into the declaration sent to the service.
    pub fn to_declaration(&self) -> ToolDeclaration {
        match self {
            Self::Local(t) => ToolDeclaration {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
                kind: ToolKind::Local,
                service_config: None,
            },
            Self::Remote(t) => ToolDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
                kind: ToolKind::Remote,
                service_config: Some(t.service_config.clone()),
            },
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// The public schema payload for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    pub kind: ToolKind,
    /// Opaque configuration for remote tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_config: Option<serde_json::Value>,
}

/// A registry of available tools.
///
/// Built once at startup and read-only afterwards, so one registry can be
/// shared across sessions behind an `Arc` without locking.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are unique within a registry.
    pub fn register(&mut self, tool: Tool) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        debug!(tool = %name, kind = ?tool.kind(), "Registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// The kind of a registered tool, if present.
    pub fn kind_of(&self, name: &str) -> Option<ToolKind> {
        self.get(name).map(Tool::kind)
    }

    /// Declarations for every registered tool, in registration order.
    pub fn declare_for_request(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(Tool::to_declaration).collect()
    }

    /// Run a local tool's handler.
    pub async fn invoke_local(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, RegistryError> {
        let tool = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;

        let Tool::Local(handler) = tool else {
            return Err(RegistryError::NotLocal(name.to_string()));
        };

        handler
            .execute(arguments)
            .await
            .map_err(|cause| RegistryError::ToolExecution {
                tool_name: name.to_string(),
                cause,
            })
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(Tool::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl LocalTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
            arguments["text"]
                .as_str()
                .map(String::from)
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))
        }
    }

    struct CountingTool(Arc<AtomicUsize>);

    #[async_trait]
    impl LocalTool for CountingTool {
        fn name(&self) -> &str {
            "search"
        }
        fn description(&self) -> &str {
            "Counts invocations"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("ran".into())
        }
    }

    fn web_search() -> Tool {
        Tool::Remote(RemoteTool::new(
            "web_search",
            "Search the web",
            serde_json::json!({ "type": "web_search_preview" }),
        ))
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::local(EchoTool)).unwrap();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.kind_of("echo"), Some(ToolKind::Local));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::local(EchoTool)).unwrap();
        let err = registry.register(Tool::local(EchoTool)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn declarations_cover_both_kinds_in_order() {
        let mut registry = ToolRegistry::new();
        registry.register(web_search()).unwrap();
        registry.register(Tool::local(EchoTool)).unwrap();

        let decls = registry.declare_for_request();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "web_search");
        assert_eq!(decls[0].kind, ToolKind::Remote);
        assert_eq!(
            decls[0].service_config,
            Some(serde_json::json!({ "type": "web_search_preview" }))
        );
        assert_eq!(decls[1].name, "echo");
        assert_eq!(decls[1].kind, ToolKind::Local);
        assert!(decls[1].service_config.is_none());
        assert_eq!(decls[1].parameters["required"][0], "text");
    }

    #[tokio::test]
    async fn invoke_local_runs_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::local(EchoTool)).unwrap();
        let output = registry
            .invoke_local("echo", serde_json::json!({"text": "hello world"}))
            .await
            .unwrap();
        assert_eq!(output, "hello world");
    }

    #[tokio::test]
    async fn invoke_local_missing_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke_local("nonexistent", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn invoke_local_on_remote_tool_never_runs_a_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(web_search()).unwrap();
        registry
            .register(Tool::local(CountingTool(calls.clone())))
            .unwrap();

        let err = registry
            .invoke_local("web_search", serde_json::json!({"query": "rust"}))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotLocal(name) if name == "web_search"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_errors_are_wrapped() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::local(EchoTool)).unwrap();
        let err = registry
            .invoke_local("echo", serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            RegistryError::ToolExecution { tool_name, cause } => {
                assert_eq!(tool_name, "echo");
                assert!(matches!(cause, ToolError::InvalidArguments(_)));
            }
            other => panic!("Expected ToolExecution, got {other:?}"),
        }
    }
}
