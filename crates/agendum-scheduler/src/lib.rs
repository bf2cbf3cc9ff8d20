//! # Agendum Scheduler
//!
//! The two periodic jobs at the heart of the service:
//!
//! ```text
//! Driver (tokio intervals)
//!   ├── every 60s   → ReminderDispatcher
//!   │                   query due window → per-appointment channel fallback
//!   │                   (native push | web push) → email → live event
//!   │                   → mark notified, drop dead subscriptions
//!   └── every 3600s → TrialSweeper
//!                       expired trials → bulk demote to free
//! ```
//!
//! Both jobs swallow their own failures: a bad cycle is logged and the next
//! tick starts clean. Nothing here can take the process down.

pub mod accounts;
pub mod driver;
pub mod reminders;

pub use accounts::TrialSweeper;
pub use driver::{SchedulerHandles, spawn};
pub use reminders::ReminderDispatcher;
