//! Tool Registry
//!
//! Typed mapping from `ToolName` to a tool capability, resolved by name at
//! dispatch time.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use oracle_sdk::ToolSpec;
use serde::{Deserialize, Serialize};
use structured_store::{StoreError, StructuredStore};

use crate::error::ToolError;
use crate::tools::{GetSchemaTool, ListTablesTool, QuickActionTool, SqlAnalysisTool, ToolName};

/// Tool interface trait
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    /// Human-readable description, also offered to the oracle
    fn description(&self) -> &str;

    /// Execute the tool with its single string argument
    async fn execute(&self, arg: &str) -> Result<String, StoreError>;
}

/// Name and description of a registered tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: ToolName,
    pub description: String,
}

impl From<&ToolDescriptor> for ToolSpec {
    fn from(descriptor: &ToolDescriptor) -> Self {
        ToolSpec {
            name: descriptor.name.to_string(),
            description: descriptor.description.clone(),
        }
    }
}

/// Registry of the tools available to one engine
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full read-only tool set over `store`
    pub fn standard(store: Arc<dyn StructuredStore>) -> Self {
        let mut tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ListTablesTool::new(Arc::clone(&store))),
            Arc::new(GetSchemaTool::new(Arc::clone(&store))),
            Arc::new(SqlAnalysisTool::new(Arc::clone(&store))),
        ];
        tools.extend(
            ToolName::QUICK_ACTIONS
                .iter()
                .filter_map(|name| QuickActionTool::new(*name, Arc::clone(&store)))
                .map(|tool| Arc::new(tool) as Arc<dyn Tool>),
        );

        let mut registry = Self::new();
        for tool in tools {
            if let Err(e) = registry.register(tool) {
                warn!("Skipping tool during registry setup: {}", e);
            }
        }

        info!("Tool registry ready with {} tools", registry.len());
        registry
    }

    /// Register a tool; names are unique per registry
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }

        self.tools.insert(name, tool);
        debug!("Tool {} registered", name);
        Ok(())
    }

    pub fn get(&self, name: ToolName) -> Option<Arc<dyn Tool>> {
        self.tools.get(&name).cloned()
    }

    pub fn contains(&self, name: ToolName) -> bool {
        self.tools.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by its wire name
    pub async fn invoke(&self, name: &str, arg: &str) -> Result<String, ToolError> {
        let tool_name: ToolName = name.parse().map_err(ToolError::NotFound)?;
        let tool = self
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        debug!("Invoking tool {}", tool_name);
        tool.execute(arg).await.map_err(|source| ToolError::Execution {
            tool: tool_name,
            source,
        })
    }

    /// Registered tools in stable order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name(),
                description: tool.description().to_string(),
            })
            .collect()
    }

    /// Descriptors in the oracle's tool-calling form
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.descriptors().iter().map(ToolSpec::from).collect()
    }
}
