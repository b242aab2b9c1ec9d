use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid node ID: {0}")]
    InvalidNodeId(String),

    #[error("Invalid node configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Field '{field}' does not apply to a {kind} node")]
    FieldNotApplicable { field: &'static str, kind: &'static str },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
