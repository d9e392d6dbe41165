//! Client tools the agent can ask this client to run.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The outcome of a client tool. `None` means the tool is fire-and-forget
/// and the agent expects no reply.
pub type ToolResult = Option<Value>;

/// A capability registered on the client and invoked by the agent by name.
#[async_trait]
pub trait ClientTool: Send + Sync {
    /// Runs the tool with the parameters the agent supplied.
    async fn execute(&self, parameters: Map<String, Value>) -> Result<ToolResult>;
}

/// Adapts an async closure into a [`ClientTool`].
pub struct FnTool<F> {
    f: F,
}

impl<F> FnTool<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ClientTool for FnTool<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolResult>> + Send + 'static,
{
    async fn execute(&self, parameters: Map<String, Value>) -> Result<ToolResult> {
        (self.f)(parameters).await
    }
}

/// Name-indexed set of client tools.
///
/// Built once by the caller and then shared read-only with the message
/// handler, so overlapping invocations may look tools up concurrently.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ClientTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool` under `name`, replacing any tool already registered there.
    pub fn register<T>(&mut self, name: impl Into<String>, tool: T) -> &mut Self
    where
        T: ClientTool + 'static,
    {
        self.tools.insert(name.into(), Arc::new(tool));
        self
    }

    /// Builder-style variant of [`ToolRegistry::register`].
    pub fn with_tool<T>(mut self, name: impl Into<String>, tool: T) -> Self
    where
        T: ClientTool + 'static,
    {
        self.register(name, tool);
        self
    }

    /// Registers an async closure as a tool.
    pub fn with_fn<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult>> + Send + 'static,
    {
        self.with_tool(name, FnTool::new(f))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ClientTool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
