//! Reminder dispatch — the per-cycle state machine.
//!
//! Each cycle: fetch appointments due inside the lookahead window, then walk
//! the batch strictly sequentially. Per appointment the channels run in
//! fallback order: exactly one push attempt (native token or web endpoint,
//! decided by the stored subscription's shape), then a best-effort email,
//! then a fire-and-forget live event. The appointment is marked notified at
//! the end of the attempt no matter what the channels reported — one attempt
//! per appointment, success or hard failure both terminate the item.
//!
//! A push target reported permanently gone clears the owner's subscription so
//! later cycles stop hammering a dead endpoint.

use std::sync::Arc;

use agendum_channels::{LiveEvent, LiveEventHub};
use agendum_core::error::Result;
use agendum_core::traits::{Mailer, PushSender};
use agendum_core::types::{Appointment, PushSubscription, ReminderNote, SendOutcome, User};
use agendum_store::AgendumDb;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Lookahead window in minutes. An appointment becomes eligible for its
/// reminder this long before it starts.
pub const REMINDER_WINDOW_MINS: i64 = 15;

/// The reminder dispatch engine.
pub struct ReminderDispatcher {
    store: Arc<Mutex<AgendumDb>>,
    push: Arc<dyn PushSender>,
    mailer: Arc<dyn Mailer>,
    live: LiveEventHub,
}

impl ReminderDispatcher {
    pub fn new(
        store: Arc<Mutex<AgendumDb>>,
        push: Arc<dyn PushSender>,
        mailer: Arc<dyn Mailer>,
        live: LiveEventHub,
    ) -> Self {
        Self {
            store,
            push,
            mailer,
            live,
        }
    }

    /// One timer tick. A failure to even fetch the candidate list aborts only
    /// this cycle; the next tick retries from scratch.
    pub async fn run_cycle(&self) {
        match self.sweep(Utc::now()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("[dispatch] processed {n} appointment(s)"),
            Err(e) => tracing::error!("[dispatch] cycle aborted: {e}"),
        }
    }

    /// Run one sweep at the given instant. Returns how many candidates were
    /// processed to completion.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let window = Duration::minutes(REMINDER_WINDOW_MINS);
        let due = self.store.lock().await.find_due_appointments(now, window)?;
        if due.is_empty() {
            tracing::debug!("[dispatch] no appointments due for notification");
            return Ok(0);
        }
        tracing::info!("[dispatch] found {} appointment(s) to notify", due.len());

        let mut processed = 0;
        for (appt, owner) in &due {
            // One bad candidate must never take the batch down
            if let Err(e) = self.process_candidate(appt, owner).await {
                tracing::error!("[dispatch] appointment {}: {e}", appt.id);
                continue;
            }
            processed += 1;
        }
        Ok(processed)
    }

    /// The per-appointment pipeline.
    async fn process_candidate(&self, appt: &Appointment, owner: &User) -> Result<()> {
        let note = ReminderNote::for_appointment(appt);

        let mut push_ok = false;
        let mut email_ok = false;

        // The stored subscription is a single discriminated value — exactly
        // one push shape is attempted, never both.
        match owner.subscription() {
            Some(PushSubscription::NativeToken(token)) => {
                let outcome = self.push.send_native(&token, &note).await;
                push_ok = self.resolve_push_outcome(outcome, owner).await?;
            }
            Some(PushSubscription::WebEndpoint(endpoint)) => {
                let outcome = self.push.send_web(&endpoint, &note).await;
                push_ok = self.resolve_push_outcome(outcome, owner).await?;
            }
            None => {
                tracing::debug!("[push] user {} has no usable push target", owner.id);
            }
        }

        // Email is best-effort regardless of the push outcome
        match self.mailer.send_reminder(owner, appt).await {
            Ok(()) => email_ok = true,
            Err(e) => tracing::warn!("[email] user {}: {e}", owner.id),
        }

        // Live event goes out to whoever is connected right now
        let observers = self.live.broadcast(LiveEvent::reminder(&note));
        let live_ok = true;

        // Single-attempt policy: the item terminates as notified whether the
        // channels succeeded or hard-failed. Only an external reschedule can
        // re-arm it.
        self.store.lock().await.mark_notified(&appt.id)?;
        tracing::info!(
            "[dispatch] appointment {} notified (push={push_ok} email={email_ok} live={live_ok} observers={observers})",
            appt.id
        );
        Ok(())
    }

    /// Fold a push outcome into the cycle: permanent failures invalidate the
    /// subscription, transient ones are logged and forgotten.
    async fn resolve_push_outcome(&self, outcome: SendOutcome, owner: &User) -> Result<bool> {
        match outcome {
            SendOutcome::Delivered => {
                tracing::info!("[push] delivered to user {}", owner.id);
                Ok(true)
            }
            SendOutcome::Gone(reason) => {
                tracing::warn!(
                    "[push] user {}: target permanently gone ({reason}), dropping subscription",
                    owner.id
                );
                self.store.lock().await.clear_subscription(&owner.id)?;
                Ok(false)
            }
            SendOutcome::Transient(reason) => {
                tracing::warn!("[push] user {}: delivery failed ({reason})", owner.id);
                Ok(false)
            }
        }
    }
}
