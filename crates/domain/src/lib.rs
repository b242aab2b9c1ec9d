//! Domain layer - Pure fleet model with no I/O
//!
//! This crate contains:
//! - Entities (Node, Rule)
//! - Value Objects (NodeId, NodeUpdate, Command, Frame)
//! - The wire frame codec
//! - Domain Events
//! - The transport seam (`FrameTransport`)

pub mod automation;
pub mod error;
pub mod event;
pub mod frame;
pub mod node;
pub mod transport;

// Re-export commonly used types
pub use automation::{Action, Condition, RepeatPolicy, Rule, RuleId, TriggerKind};
pub use error::DomainError;
pub use event::DomainEvent;
pub use frame::{Command, Frame, FrameError};
pub use node::{Node, NodeId, NodeKind, NodeUpdate};
pub use transport::{ConnectionState, FrameTransport};
