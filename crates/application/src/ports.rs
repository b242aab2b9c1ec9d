use domain::automation::Rule;

/// Durable home for rule state between restarts
pub trait RuleSnapshotStore: Send + Sync {
    /// Returns `None` when no snapshot has been written yet
    fn load(&self) -> anyhow::Result<Option<Vec<Rule>>>;

    fn save(&self, rules: &[Rule]) -> anyhow::Result<()>;
}
