//! Outbound channel traits — the seams between the dispatcher and the
//! concrete senders, so sweeps can run against in-process fakes in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Appointment, ReminderNote, SendOutcome, User, WebPushEndpoint};

/// Push delivery across both native and web targets. Implementations map
/// provider responses onto the [`SendOutcome`] tri-state; they never return
/// a hard error — an unreachable provider is a transient outcome.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver to a native device token.
    async fn send_native(&self, token: &str, note: &ReminderNote) -> SendOutcome;

    /// Deliver to a web-push endpoint.
    async fn send_web(&self, endpoint: &WebPushEndpoint, note: &ReminderNote) -> SendOutcome;
}

/// Transactional email. Failures are returned to the caller, which logs and
/// moves on — email is best-effort everywhere it is used.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Appointment reminder, sent by the dispatcher inside the lookahead window.
    async fn send_reminder(&self, user: &User, appt: &Appointment) -> Result<()>;

    /// Booking confirmation, sent when an appointment is created.
    async fn send_confirmation(&self, user: &User, appt: &Appointment) -> Result<()>;
}
