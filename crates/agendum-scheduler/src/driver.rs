//! Scheduler driver — owns the two periodic timers.
//!
//! Two independent tokio interval loops, no coupling between them. Each loop
//! awaits its cycle body in-line, so consecutive ticks of the same timer
//! cannot overlap even when a sweep runs longer than its period.

use std::time::Duration;

use agendum_core::config::SchedulerConfig;
use tokio::task::JoinHandle;

use crate::accounts::TrialSweeper;
use crate::reminders::ReminderDispatcher;

/// Handles to the two running timer tasks. Dropping them leaves the timers
/// running for the process lifetime; call [`SchedulerHandles::shutdown`] to
/// cancel both.
pub struct SchedulerHandles {
    reminders: JoinHandle<()>,
    accounts: JoinHandle<()>,
}

impl SchedulerHandles {
    /// Cancel both timers.
    pub fn shutdown(self) {
        self.reminders.abort();
        self.accounts.abort();
    }
}

/// Spawn both periodic jobs.
pub fn spawn(
    dispatcher: ReminderDispatcher,
    sweeper: TrialSweeper,
    config: &SchedulerConfig,
) -> SchedulerHandles {
    tracing::info!(
        "⏰ Scheduler started (reminders every {}s, trial sweep every {}s)",
        config.reminder_interval_secs,
        config.account_interval_secs
    );

    let reminder_period = Duration::from_secs(config.reminder_interval_secs.max(1));
    let reminders = tokio::spawn(async move {
        let mut interval = tokio::time::interval(reminder_period);
        loop {
            interval.tick().await;
            dispatcher.run_cycle().await;
        }
    });

    let account_period = Duration::from_secs(config.account_interval_secs.max(1));
    let accounts = tokio::spawn(async move {
        let mut interval = tokio::time::interval(account_period);
        loop {
            interval.tick().await;
            sweeper.run_cycle().await;
        }
    });

    SchedulerHandles {
        reminders,
        accounts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendum_channels::LiveEventHub;
    use agendum_core::error::Result;
    use agendum_core::traits::{Mailer, PushSender};
    use agendum_core::types::{Appointment, ReminderNote, SendOutcome, User, WebPushEndpoint};
    use agendum_store::AgendumDb;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct NoopPush;

    #[async_trait]
    impl PushSender for NoopPush {
        async fn send_native(&self, _t: &str, _n: &ReminderNote) -> SendOutcome {
            SendOutcome::Delivered
        }
        async fn send_web(&self, _e: &WebPushEndpoint, _n: &ReminderNote) -> SendOutcome {
            SendOutcome::Delivered
        }
    }

    struct NoopMailer;

    #[async_trait]
    impl Mailer for NoopMailer {
        async fn send_reminder(&self, _u: &User, _a: &Appointment) -> Result<()> {
            Ok(())
        }
        async fn send_confirmation(&self, _u: &User, _a: &Appointment) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_first_tick_fires_immediately() {
        let store = Arc::new(Mutex::new(AgendumDb::open(&PathBuf::from(":memory:")).unwrap()));
        {
            let db = store.lock().await;
            let u = db.create_user("Ana", "ana@example.com", None).unwrap();
            db.set_subscription(&u.id, "ExponentPushToken[t]").unwrap();
            db.create_appointment(&u.id, "call", Utc::now() + ChronoDuration::minutes(5), None)
                .unwrap();
        }

        let dispatcher = ReminderDispatcher::new(
            store.clone(),
            Arc::new(NoopPush),
            Arc::new(NoopMailer),
            LiveEventHub::new(8),
        );
        let sweeper = TrialSweeper::new(store.clone());
        let config = SchedulerConfig {
            reminder_interval_secs: 3600,
            account_interval_secs: 3600,
        };

        let handles = spawn(dispatcher, sweeper, &config);
        // The interval's first tick completes at once; give the cycle a moment
        tokio::time::sleep(Duration::from_millis(200)).await;
        handles.shutdown();

        let db = store.lock().await;
        let due = db
            .find_due_appointments(Utc::now(), ChronoDuration::minutes(15))
            .unwrap();
        assert!(due.is_empty(), "startup sweep should have marked the appointment");
    }
}
