//! Native push via the Expo push HTTP API.
//!
//! One POST per message. The interesting part is outcome classification:
//! Expo acknowledges with a per-message ticket whose `details.error` field
//! carries `DeviceNotRegistered` when the token is dead — that is the one
//! condition that must be treated as permanent.

use agendum_core::config::PushConfig;
use agendum_core::types::{ReminderNote, SendOutcome};
use serde::Deserialize;

/// Expo push client.
pub struct ExpoClient {
    client: reqwest::Client,
    api_url: String,
}

/// Expo ticket envelope: `{"data": {...}}` for a single-message request.
#[derive(Debug, Deserialize)]
struct ExpoResponse {
    data: Option<ExpoTicket>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    message: Option<String>,
    details: Option<ExpoTicketDetails>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicketDetails {
    error: Option<String>,
}

impl ExpoClient {
    pub fn new(config: &PushConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.expo_api_url.clone(),
        }
    }

    /// Deliver a note to a native device token.
    pub async fn send(&self, token: &str, note: &ReminderNote) -> SendOutcome {
        let body = serde_json::json!({
            "to": token,
            "title": note.title,
            "body": note.message,
            "sound": "default",
        });

        let response = match self
            .client
            .post(&self.api_url)
            .json(&body)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return SendOutcome::Transient(format!("Expo request failed: {e}")),
        };

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return SendOutcome::Transient(format!("Expo API unavailable: {status}"));
        }

        match response.json::<ExpoResponse>().await {
            Ok(parsed) => classify_ticket(&parsed),
            Err(e) => SendOutcome::Transient(format!("Invalid Expo response: {e}")),
        }
    }
}

/// Map an Expo ticket onto the send outcome tri-state.
fn classify_ticket(response: &ExpoResponse) -> SendOutcome {
    let Some(ticket) = &response.data else {
        return SendOutcome::Transient(format!(
            "Expo returned no ticket ({} request error(s))",
            response.errors.len()
        ));
    };
    if ticket.status == "ok" {
        return SendOutcome::Delivered;
    }
    let detail = ticket
        .details
        .as_ref()
        .and_then(|d| d.error.as_deref())
        .unwrap_or("");
    let reason = ticket.message.clone().unwrap_or_else(|| detail.to_string());
    if detail == "DeviceNotRegistered" {
        SendOutcome::Gone(reason)
    } else {
        SendOutcome::Transient(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ExpoResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_ok_ticket_is_delivered() {
        let r = parse(r#"{"data":{"status":"ok","id":"xxx"}}"#);
        assert_eq!(classify_ticket(&r), SendOutcome::Delivered);
    }

    #[test]
    fn test_device_not_registered_is_gone() {
        let r = parse(
            r#"{"data":{"status":"error","message":"not a registered push notification recipient","details":{"error":"DeviceNotRegistered"}}}"#,
        );
        assert!(matches!(classify_ticket(&r), SendOutcome::Gone(_)));
    }

    #[test]
    fn test_other_ticket_errors_are_transient() {
        let r = parse(
            r#"{"data":{"status":"error","message":"rate limited","details":{"error":"MessageRateExceeded"}}}"#,
        );
        assert!(matches!(classify_ticket(&r), SendOutcome::Transient(_)));
    }

    #[test]
    fn test_missing_ticket_is_transient() {
        let r = parse(r#"{"errors":[{"code":"VALIDATION_ERROR"}]}"#);
        assert!(matches!(classify_ticket(&r), SendOutcome::Transient(_)));
    }
}
