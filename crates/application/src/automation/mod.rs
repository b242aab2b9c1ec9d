mod engine;
mod rule_book;

pub use engine::{AutomationEngine, FiredRule, DEBOUNCE_SECS, HOLD_TICKS};
pub use rule_book::{RuleBook, SharedRuleBook};
