use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use domain::node::NodeId;

use crate::command::{CommandDispatcher, IssueOutcome};

/// Periodic sweep that switches off nodes whose auto-off timer ran out
pub struct AutoOffTimer {
    dispatcher: Arc<CommandDispatcher>,
}

impl AutoOffTimer {
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Issues output-off for every expired timer at `now`
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<(NodeId, IssueOutcome)> {
        let due = self.dispatcher.registry().lock().due_timers(now);

        due.into_iter()
            .filter_map(|id| match self.dispatcher.expire_timer(&id, now) {
                Ok(outcome) => Some((id, outcome)),
                Err(e) => {
                    warn!(node_id = %id, error = %e, "Failed to expire auto-off timer");
                    None
                }
            })
            .collect()
    }

    pub fn spawn(self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_ms = period.as_millis() as u64, "Starting auto-off sweep");
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Auto-off sweep stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep(Utc::now());
                    }
                }
            }
        })
    }
}
