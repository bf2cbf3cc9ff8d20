//! Plan lifecycle sweep — trial accounts past expiry drop to the free plan.
//!
//! Structurally the reminder sweep's little sibling: poll, mutate
//! idempotently, log, swallow failures. The demotion itself is one batched
//! UPDATE, so a partially-applied sweep is not possible.

use std::sync::Arc;

use agendum_core::error::Result;
use agendum_store::AgendumDb;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// The trial-expiry sweeper.
pub struct TrialSweeper {
    store: Arc<Mutex<AgendumDb>>,
}

impl TrialSweeper {
    pub fn new(store: Arc<Mutex<AgendumDb>>) -> Self {
        Self { store }
    }

    /// One timer tick. Data-access errors are logged and dropped; the
    /// reminder schedule is never affected.
    pub async fn run_cycle(&self) {
        match self.sweep(Utc::now()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("[accounts] demoted {n} expired trial(s) to the free plan"),
            Err(e) => tracing::error!("[accounts] trial sweep failed: {e}"),
        }
    }

    /// Run one sweep at the given instant. Returns how many accounts were
    /// demoted. Running it again without the clock advancing is a no-op.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let db = self.store.lock().await;
        let expired = db.find_expired_trials(now)?;
        if expired.is_empty() {
            tracing::debug!("[accounts] no expired trial accounts");
            return Ok(0);
        }
        tracing::info!("[accounts] found {} expired trial account(s)", expired.len());
        db.bulk_demote(&expired)
    }
}
