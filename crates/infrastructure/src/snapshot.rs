use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use application::RuleSnapshotStore;
use domain::automation::Rule;

/// Keeps the rule book in a JSON file so schedules survive restarts
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<Option<Vec<Rule>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read rule snapshot {}", self.path.display()))?;
        let rules = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid rule snapshot {}", self.path.display()))?;
        Ok(Some(rules))
    }

    fn save(&self, rules: &[Rule]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Atomic replace
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(rules)?;
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), rules = rules.len(), "💾 Rule snapshot saved");
        Ok(())
    }
}
