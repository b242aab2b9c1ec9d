use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Value object representing a Node identifier
///
/// Rules:
/// - Must be non-empty
/// - Must contain only alphanumeric, underscore, hyphen and dot
/// - Max length 64 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Create a new NodeId with validation
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(DomainError::InvalidNodeId(
                "Node ID cannot be empty".to_string(),
            ));
        }

        if id.len() > 64 {
            return Err(DomainError::InvalidNodeId(format!(
                "Node ID too long: {} chars (max 64)",
                id.len()
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(DomainError::InvalidNodeId(format!(
                "Node ID {id} must contain only alphanumeric, underscore, hyphen, and dot"
            )));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
