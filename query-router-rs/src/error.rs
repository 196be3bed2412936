use structured_store::StoreError;
use thiserror::Error;

use crate::tools::ToolName;

/// Tool registry error types
#[derive(Debug, Error)]
pub enum ToolError {
    /// Rendered verbatim to the user
    #[error("Tool '{0}' is not available.")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    AlreadyRegistered(ToolName),

    #[error("Error executing {tool}: {source}")]
    Execution {
        tool: ToolName,
        #[source]
        source: StoreError,
    },
}
