//! Application layer - registry, command pipeline and automation

pub mod automation;
pub mod command;
pub mod event_bus;
pub mod fleet;
pub mod inbound;
pub mod ports;
pub mod registry;
pub mod timer;

pub use automation::{AutomationEngine, FiredRule, RuleBook, SharedRuleBook};
pub use command::{CommandDispatcher, DispatchError, IssueOutcome};
pub use event_bus::EventBus;
pub use fleet::Fleet;
pub use inbound::InboundHandler;
pub use ports::RuleSnapshotStore;
pub use registry::{DeviceRegistry, SharedRegistry};
pub use timer::AutoOffTimer;
