use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use domain::automation::{Action, Condition, Rule, RuleId, TriggerKind};
use domain::frame::Command;
use domain::node::{Node, NodeId};
use domain::DomainEvent;

use super::rule_book::SharedRuleBook;
use crate::command::CommandDispatcher;
use crate::event_bus::EventBus;
use crate::ports::RuleSnapshotStore;
use crate::registry::DeviceRegistry;

/// Minimum spacing between two firings of a level-style rule
pub const DEBOUNCE_SECS: i64 = 60;

/// Consecutive high evaluations before a `Hold` trigger fires
pub const HOLD_TICKS: u32 = 3;

/// Tracks what the engine saw for an input rule on previous ticks
#[derive(Debug, Default, Clone, Copy)]
struct TriggerState {
    last_level: Option<bool>,
    high_ticks: u32,
}

impl TriggerState {
    fn observe(&mut self, level: bool, trigger: TriggerKind) -> bool {
        let previous = self.last_level.replace(level);
        self.high_ticks = if level { self.high_ticks.saturating_add(1) } else { 0 };

        match trigger {
            TriggerKind::High => level,
            TriggerKind::Low => !level,
            TriggerKind::Toggle => previous.is_some_and(|prev| prev != level),
            TriggerKind::Hold => self.high_ticks >= HOLD_TICKS,
        }
    }
}

/// One rule that fired during an evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredRule {
    pub rule_id: RuleId,
    pub target: NodeId,
    pub delivered: bool,
}

/// Polling evaluator that turns rule conditions into dispatcher commands
pub struct AutomationEngine {
    rules: SharedRuleBook,
    dispatcher: Arc<CommandDispatcher>,
    events: EventBus,
    trigger_states: Mutex<HashMap<RuleId, TriggerState>>,
    store: Option<Arc<dyn RuleSnapshotStore>>,
}

impl AutomationEngine {
    pub fn new(rules: SharedRuleBook, dispatcher: Arc<CommandDispatcher>, events: EventBus) -> Self {
        Self {
            rules,
            dispatcher,
            events,
            trigger_states: Mutex::new(HashMap::new()),
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RuleSnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn rules(&self) -> &SharedRuleBook {
        &self.rules
    }

    /// Runs one pass over the enabled rules.
    ///
    /// `now` is read in its own time zone for `Daily` rules, so callers pass
    /// local time in production and fixed instants in tests.
    pub fn evaluate<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<FiredRule> {
        let instant = now.with_timezone(&Utc);
        let candidates: Vec<Rule> = self.rules.lock().enabled().cloned().collect();
        debug!(rules = candidates.len(), "🔄 Evaluating automation rules");
        self.trigger_states
            .lock()
            .retain(|id, _| candidates.iter().any(|rule| &rule.id == id));

        let mut fired = Vec::new();
        for rule in candidates {
            if !self.condition_met(&rule, now, instant) {
                continue;
            }

            let Some(target) = self.dispatcher.registry().lock().get(&rule.target).cloned() else {
                warn!(rule_id = %rule.id, target = %rule.target, "⚠️ Rule target missing - skipped");
                continue;
            };

            let (command, value) = resolve_action(rule.action, &target);
            let delivered = match self
                .dispatcher
                .issue_at(command, target.address, value, &target.id, instant)
            {
                Ok(outcome) => outcome.is_delivered(),
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "❌ Rule action rejected");
                    false
                }
            };

            let still_enabled = self.rules.lock().record_fire(&rule.id, instant);
            if still_enabled == Some(false) {
                self.trigger_states.lock().remove(&rule.id);
                info!(rule_id = %rule.id, "🏁 Rule finished and disabled");
            }

            info!(
                rule_id = %rule.id,
                target = %target.id,
                command = %command,
                delivered,
                "⚡ Rule fired"
            );
            self.events
                .publish(DomainEvent::rule_fired(rule.id, target.id.clone(), delivered));
            fired.push(FiredRule {
                rule_id: rule.id,
                target: target.id,
                delivered,
            });
        }

        if !fired.is_empty() {
            self.persist();
        }
        fired
    }

    /// Writes the rule book to the snapshot store, if one is attached
    pub fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let rules = self.rules.lock().rules().to_vec();
        if let Err(e) = store.save(&rules) {
            warn!(error = %e, "⚠️ Failed to persist rule snapshot");
        }
    }

    pub fn spawn(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_ms = period.as_millis() as u64, "⚙️ Automation engine started");
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        self.persist();
                        info!("🛑 Automation engine stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.evaluate(&chrono::Local::now());
                    }
                }
            }
        })
    }

    fn condition_met<Tz: TimeZone>(&self, rule: &Rule, now: &DateTime<Tz>, instant: DateTime<Utc>) -> bool {
        match &rule.condition {
            Condition::Daily { at } => {
                now.hour() == at.hour() && now.minute() == at.minute() && debounced(rule, instant)
            }
            Condition::Countdown {
                duration_secs,
                armed_at,
            } => {
                let elapsed = instant.signed_duration_since(*armed_at).num_seconds();
                elapsed >= 0 && elapsed as u64 >= *duration_secs
            }
            Condition::InputEdge {
                source_address,
                trigger,
            } => {
                let Some(level) = input_level(&self.dispatcher.registry().lock(), *source_address) else {
                    return false;
                };
                // The level is recorded before the debounce check: an edge
                // seen inside the window is consumed, not replayed later.
                let triggered = self
                    .trigger_states
                    .lock()
                    .entry(rule.id)
                    .or_default()
                    .observe(level, *trigger);
                triggered && debounced(rule, instant)
            }
            Condition::SensorThreshold {
                source,
                metric,
                operator,
                threshold,
            } => {
                let reading = self
                    .dispatcher
                    .registry()
                    .lock()
                    .get(source)
                    .and_then(|node| node.sensor.get(*metric));
                match reading {
                    Some(reading) => operator.compare(reading, *threshold) && debounced(rule, instant),
                    None => false,
                }
            }
        }
    }
}

fn debounced(rule: &Rule, now: DateTime<Utc>) -> bool {
    rule.last_fired_at
        .map_or(true, |last| now.signed_duration_since(last).num_seconds() >= DEBOUNCE_SECS)
}

/// Level of the binary inputs at `address`, high if any reads high.
/// `None` when no input lives there.
fn input_level(registry: &DeviceRegistry, address: u8) -> Option<bool> {
    let inputs: Vec<&Node> = registry
        .get_by_address(address)
        .into_iter()
        .filter(|node| node.kind.is_input())
        .collect();
    if inputs.is_empty() {
        return None;
    }
    Some(inputs.iter().any(|node| node.input_level))
}

fn resolve_action(action: Action, target: &Node) -> (Command, u16) {
    match action {
        Action::SetOn => (Command::OutputOn, 1),
        Action::SetOff => (Command::OutputOff, 0),
        Action::Toggle if target.on_state => (Command::OutputOff, 0),
        Action::Toggle => (Command::OutputOn, 1),
        Action::SetAnalog(level) => (Command::AnalogSet, u16::from(level)),
    }
}
