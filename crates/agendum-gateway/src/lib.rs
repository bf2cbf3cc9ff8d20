//! # Agendum Gateway
//!
//! The collaborator-facing HTTP/WebSocket surface: push-subscription
//! registration, appointment booking with plan limits, billing upgrade, and
//! the live in-app event stream. Authentication and credential handling are
//! an upstream concern — handlers address users by id.

pub mod routes;
pub mod server;
pub mod ws;

pub use server::{AppState, serve};
