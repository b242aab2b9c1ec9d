mod dispatcher;

pub use dispatcher::{CommandDispatcher, DispatchError, IssueOutcome};
