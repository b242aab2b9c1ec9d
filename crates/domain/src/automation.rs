use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::node::{Metric, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum Operator {
    Greater,
    Less,
    Equal,
}

impl Operator {
    /// Compares at tenths precision, the resolution of sensor frames
    pub fn compare(&self, reading: f32, threshold: f32) -> bool {
        let lhs = (reading * 10.0).round() as i64;
        let rhs = (threshold * 10.0).round() as i64;
        match self {
            Self::Greater => lhs > rhs,
            Self::Less => lhs < rhs,
            Self::Equal => lhs == rhs,
        }
    }
}

/// How an input rule reads the level of its source
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum TriggerKind {
    /// Input reads high
    High,
    /// Input reads low
    Low,
    /// Input changed since the previous evaluation
    Toggle,
    /// Input has read high for several consecutive evaluations
    Hold,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum Condition {
    /// Fires when wall-clock HH:MM equals `at`
    Daily {
        #[serde(with = "hhmm")]
        at: NaiveTime,
    },
    /// One-shot timer armed at creation
    Countdown {
        duration_secs: u64,
        #[serde(default = "Utc::now")]
        armed_at: DateTime<Utc>,
    },
    /// Level check of the binary input(s) at `source_address`
    InputEdge {
        source_address: u8,
        trigger: TriggerKind,
    },
    SensorThreshold {
        source: NodeId,
        metric: Metric,
        operator: Operator,
        threshold: f32,
    },
}

impl Condition {
    pub fn daily(hour: u32, minute: u32) -> Result<Self> {
        let at = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| DomainError::InvalidRule(format!("invalid time {hour}:{minute}")))?;
        Ok(Self::Daily { at })
    }

    pub fn countdown(duration_secs: u64, armed_at: DateTime<Utc>) -> Self {
        Self::Countdown {
            duration_secs,
            armed_at,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Daily { .. } => "daily",
            Self::Countdown { .. } => "countdown",
            Self::InputEdge { .. } => "input_edge",
            Self::SensorThreshold { .. } => "sensor_threshold",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", content = "value")]
pub enum Action {
    SetOn,
    SetOff,
    Toggle,
    SetAnalog(u8),
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "type", content = "remaining")]
pub enum RepeatPolicy {
    #[default]
    Forever,
    Once,
    Count(u32),
}

impl RepeatPolicy {
    /// Consumes one firing. Returns `true` while the rule stays enabled.
    pub fn consume(&mut self) -> bool {
        match self {
            Self::Forever => true,
            Self::Once => false,
            Self::Count(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining > 0
            }
        }
    }
}

/// A persisted condition → action binding
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Rule {
    #[serde(default)]
    pub id: RuleId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub condition: Condition,
    pub action: Action,
    pub target: NodeId,
    #[serde(default)]
    pub repeat: RepeatPolicy,
    #[serde(default)]
    pub last_fired_at: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(condition: Condition, action: Action, target: NodeId) -> Self {
        Self {
            id: RuleId::new(),
            name: String::new(),
            enabled: true,
            condition,
            action,
            target,
            repeat: RepeatPolicy::Forever,
            last_fired_at: None,
        }
    }

    pub fn with_repeat(mut self, repeat: RepeatPolicy) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled && matches!(self.repeat, RepeatPolicy::Count(0)) {
            return Err(DomainError::InvalidRule(format!(
                "Rule {} is enabled with an exhausted repeat count",
                self.id
            )));
        }
        if let Condition::SensorThreshold { threshold, .. } = &self.condition {
            if !threshold.is_finite() {
                return Err(DomainError::InvalidRule(format!(
                    "Rule {} threshold must be finite",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Whether this rule draws on `node` as target or sensor source
    pub fn references_node(&self, node: &NodeId) -> bool {
        if &self.target == node {
            return true;
        }
        matches!(&self.condition, Condition::SensorThreshold { source, .. } if source == node)
    }
}

/// `HH:MM` representation of daily trigger times
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lamp() -> NodeId {
        NodeId::new("lamp").unwrap()
    }

    #[test]
    fn test_repeat_policy_consume() {
        let mut forever = RepeatPolicy::Forever;
        assert!(forever.consume());

        let mut once = RepeatPolicy::Once;
        assert!(!once.consume());

        let mut count = RepeatPolicy::Count(2);
        assert!(count.consume());
        assert_eq!(count, RepeatPolicy::Count(1));
        assert!(!count.consume());
        assert_eq!(count, RepeatPolicy::Count(0));
    }

    #[test]
    fn test_operator_compare_tenths() {
        assert!(Operator::Greater.compare(25.1, 25.0));
        assert!(!Operator::Greater.compare(25.0, 25.0));
        assert!(Operator::Less.compare(-1.0, 0.0));
        assert!(Operator::Equal.compare(21.04, 21.0));
        assert!(!Operator::Equal.compare(21.1, 21.0));
    }

    #[test]
    fn test_daily_condition_from_json() {
        let rule: Rule = serde_json::from_value(json!({
            "condition": { "type": "Daily", "at": "07:30" },
            "action": { "type": "SetAnalog", "value": 120 },
            "target": "lamp",
            "repeat": { "type": "Count", "remaining": 3 }
        }))
        .unwrap();

        assert!(rule.enabled);
        assert_eq!(rule.condition, Condition::daily(7, 30).unwrap());
        assert_eq!(rule.action, Action::SetAnalog(120));
        assert_eq!(rule.repeat, RepeatPolicy::Count(3));
        assert!(rule.last_fired_at.is_none());
    }

    #[test]
    fn test_invalid_daily_time_rejected() {
        assert!(Condition::daily(24, 0).is_err());
        let parsed = serde_json::from_value::<Condition>(json!({ "type": "Daily", "at": "7h" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validate_rejects_exhausted_count() {
        let rule = Rule::new(Condition::daily(8, 0).unwrap(), Action::SetOn, lamp())
            .with_repeat(RepeatPolicy::Count(0));
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_exhausted_count_when_disabled() {
        let mut rule = Rule::new(Condition::daily(8, 0).unwrap(), Action::SetOn, lamp())
            .with_repeat(RepeatPolicy::Count(0));
        rule.enabled = false;
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_references_node() {
        let sensor = NodeId::new("dht").unwrap();
        let rule = Rule::new(
            Condition::SensorThreshold {
                source: sensor.clone(),
                metric: Metric::Temperature,
                operator: Operator::Greater,
                threshold: 28.0,
            },
            Action::SetOn,
            lamp(),
        );
        assert!(rule.references_node(&lamp()));
        assert!(rule.references_node(&sensor));
        assert!(!rule.references_node(&NodeId::new("other").unwrap()));
    }
}
