use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::info;

use domain::automation::{Condition, RepeatPolicy, Rule, RuleId};
use domain::node::NodeId;
use domain::DomainError;

pub type SharedRuleBook = Arc<Mutex<RuleBook>>;

/// Admitted automation rules.
///
/// Admission is where rule preconditions are enforced; the engine trusts
/// everything stored here.
#[derive(Debug, Default, Clone)]
pub struct RuleBook {
    rules: Vec<Rule>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Result<Self, DomainError> {
        let mut book = Self::new();
        for rule in rules {
            book.add(rule)?;
        }
        Ok(book)
    }

    pub fn into_shared(self) -> SharedRuleBook {
        Arc::new(Mutex::new(self))
    }

    pub fn add(&mut self, rule: Rule) -> Result<RuleId, DomainError> {
        rule.validate()?;

        if self.get(&rule.id).is_some() {
            return Err(DomainError::InvalidRule(format!(
                "Rule {} already exists",
                rule.id
            )));
        }
        if rule.enabled {
            self.check_input_trigger_free(&rule, None)?;
        }

        let id = rule.id;
        info!(rule_id = %id, kind = rule.condition.kind(), target = %rule.target, "⚙️ Rule admitted");
        self.rules.push(rule);
        Ok(id)
    }

    pub fn remove(&mut self, id: &RuleId) -> Option<Rule> {
        let index = self.rules.iter().position(|rule| &rule.id == id)?;
        Some(self.rules.remove(index))
    }

    /// Flips `enabled` and returns the new value. Re-enabling a countdown
    /// re-arms it from `now`.
    pub fn toggle(&mut self, id: &RuleId, now: DateTime<Utc>) -> Result<bool, DomainError> {
        let rule = self
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::RuleNotFound(id.to_string()))?;

        if !rule.enabled {
            if matches!(rule.repeat, RepeatPolicy::Count(0)) {
                return Err(DomainError::InvalidRule(format!(
                    "Rule {id} has no repeats left"
                )));
            }
            self.check_input_trigger_free(&rule, Some(id))?;
        }

        let Some(rule) = self.get_mut(id) else {
            return Err(DomainError::RuleNotFound(id.to_string()));
        };
        rule.enabled = !rule.enabled;
        if rule.enabled {
            if let Condition::Countdown { armed_at, .. } = &mut rule.condition {
                *armed_at = now;
                rule.last_fired_at = None;
            }
        }
        Ok(rule.enabled)
    }

    pub fn get(&self, id: &RuleId) -> Option<&Rule> {
        self.rules.iter().find(|rule| &rule.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &RuleId) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|rule| &rule.id == id)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|rule| rule.enabled)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Drops rules that target or read from `node`. When `input_address` is
    /// given, input rules watching that address go too.
    pub fn remove_referencing(&mut self, node: &NodeId, input_address: Option<u8>) -> Vec<RuleId> {
        let mut removed = Vec::new();
        self.rules.retain(|rule| {
            let watches_address = matches!(
                (&rule.condition, input_address),
                (Condition::InputEdge { source_address, .. }, Some(address)) if *source_address == address
            );
            if rule.references_node(node) || watches_address {
                removed.push(rule.id);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Records a firing at `now` and applies the repeat policy. Returns
    /// whether the rule is still enabled. Never re-enables a rule switched
    /// off while its command was in flight.
    pub(crate) fn record_fire(&mut self, id: &RuleId, now: DateTime<Utc>) -> Option<bool> {
        let rule = self.get_mut(id)?;
        rule.last_fired_at = Some(now);

        let keep = rule.repeat.consume();
        rule.enabled = rule.enabled && keep && !matches!(rule.condition, Condition::Countdown { .. });
        Some(rule.enabled)
    }

    fn check_input_trigger_free(&self, rule: &Rule, ignore: Option<&RuleId>) -> Result<(), DomainError> {
        let Condition::InputEdge {
            source_address,
            trigger,
        } = &rule.condition
        else {
            return Ok(());
        };

        let clash = self.enabled().any(|other| {
            Some(&other.id) != ignore
                && matches!(
                    &other.condition,
                    Condition::InputEdge { source_address: a, trigger: t }
                        if a == source_address && t == trigger
                )
        });

        if clash {
            return Err(DomainError::InvalidRule(format!(
                "An enabled {trigger:?} rule already watches address {source_address}"
            )));
        }
        Ok(())
    }
}
