//! Web push delivery.
//!
//! Sends a payload-less "tickle" POST to the subscription endpoint; the
//! service worker fetches fresh data on the push event. Payload encryption
//! and VAPID signing live in the push-service configuration, outside this
//! adapter. What matters here is the status mapping: 404/410 mean the
//! subscription no longer exists and must be invalidated.

use agendum_core::config::PushConfig;
use agendum_core::types::{ReminderNote, SendOutcome, WebPushEndpoint};

/// Seconds a push service may hold an undelivered message. The reminder is
/// stale once the appointment starts, so match the lookahead window.
const PUSH_TTL_SECS: u64 = 900;

/// Web push client.
pub struct WebPushClient {
    client: reqwest::Client,
    contact: String,
}

impl WebPushClient {
    pub fn new(config: &PushConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            contact: config.vapid_contact.clone(),
        }
    }

    /// Deliver to a web-push endpoint.
    pub async fn send(&self, endpoint: &WebPushEndpoint, _note: &ReminderNote) -> SendOutcome {
        let response = match self
            .client
            .post(&endpoint.endpoint)
            .header("TTL", PUSH_TTL_SECS)
            .header("Urgency", "high")
            .header("X-Push-Contact", &self.contact)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return SendOutcome::Transient(format!("Web push request failed: {e}")),
        };

        classify_status(response.status().as_u16())
    }
}

/// Map a push-service HTTP status onto the send outcome tri-state.
fn classify_status(status: u16) -> SendOutcome {
    match status {
        200..=299 => SendOutcome::Delivered,
        // The subscription has been unsubscribed or expired
        404 | 410 => SendOutcome::Gone(format!("endpoint gone ({status})")),
        _ => SendOutcome::Transient(format!("push service error ({status})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_is_delivered() {
        assert_eq!(classify_status(201), SendOutcome::Delivered);
    }

    #[test]
    fn test_gone_statuses_invalidate() {
        assert!(matches!(classify_status(404), SendOutcome::Gone(_)));
        assert!(matches!(classify_status(410), SendOutcome::Gone(_)));
    }

    #[test]
    fn test_everything_else_is_transient() {
        for status in [400, 413, 429, 500, 503] {
            assert!(
                matches!(classify_status(status), SendOutcome::Transient(_)),
                "status {status} should be transient"
            );
        }
    }
}
