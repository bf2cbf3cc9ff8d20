//! # Agendum Core
//!
//! Shared foundation for the Agendum appointment reminder service:
//! error type, configuration, domain types, and the outbound channel traits
//! the dispatcher is written against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AgendumConfig;
pub use error::{AgendumError, Result};
pub use traits::{Mailer, PushSender};
pub use types::{
    Appointment, Plan, PushSubscription, ReminderNote, SendOutcome, User, WebPushEndpoint,
    appointment_limit,
};
