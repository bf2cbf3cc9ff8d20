//! # Agendum Channels
//! Delivery channel implementations for reminder dispatch.
//!
//! Push (native + web) resolves every attempt to a [`SendOutcome`]; email is
//! best-effort `Result`; live events are fire-and-forget broadcast.

pub mod email;
pub mod expo;
pub mod live;
pub mod webpush;

pub use email::SmtpMailer;
pub use expo::ExpoClient;
pub use live::{LiveEvent, LiveEventHub};
pub use webpush::WebPushClient;

use agendum_core::traits::PushSender;
use agendum_core::types::{ReminderNote, SendOutcome, WebPushEndpoint};
use async_trait::async_trait;

/// The production [`PushSender`]: routes native tokens to the Expo API and
/// web-push endpoints to their push service.
pub struct PushGateway {
    expo: ExpoClient,
    web: WebPushClient,
}

impl PushGateway {
    pub fn new(expo: ExpoClient, web: WebPushClient) -> Self {
        Self { expo, web }
    }
}

#[async_trait]
impl PushSender for PushGateway {
    async fn send_native(&self, token: &str, note: &ReminderNote) -> SendOutcome {
        self.expo.send(token, note).await
    }

    async fn send_web(&self, endpoint: &WebPushEndpoint, note: &ReminderNote) -> SendOutcome {
        self.web.send(endpoint, note).await
    }
}
