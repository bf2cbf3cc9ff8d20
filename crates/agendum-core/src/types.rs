//! Domain types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account plan. Stored as a lowercase string column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Trial,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Trial => "trial",
        }
    }

    /// Parse a stored plan value. Unknown values fall back to `Free` — the
    /// most restrictive plan — rather than failing the whole row read.
    pub fn parse(s: &str) -> Self {
        match s {
            "pro" => Plan::Pro,
            "trial" => Plan::Trial,
            _ => Plan::Free,
        }
    }
}

/// How many appointments a plan may hold. `None` = unlimited.
pub fn appointment_limit(plan: Plan) -> Option<u32> {
    match plan {
        Plan::Pro => None,
        Plan::Free | Plan::Trial => Some(5),
    }
}

/// Web-push endpoint object as delivered by the browser's Push API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPushEndpoint {
    pub endpoint: String,
    #[serde(default)]
    pub keys: WebPushKeys,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebPushKeys {
    #[serde(default)]
    pub p256dh: String,
    #[serde(default)]
    pub auth: String,
}

/// A user's push target. One storage slot, two possible shapes — decided by a
/// structural discriminator at read time, never by separate columns.
#[derive(Debug, Clone)]
pub enum PushSubscription {
    /// Native device token (Expo push token, recognizable by prefix).
    NativeToken(String),
    /// Web-push subscription (JSON object with an `endpoint` field).
    WebEndpoint(WebPushEndpoint),
}

const NATIVE_TOKEN_PREFIX: &str = "ExponentPushToken[";

impl PushSubscription {
    /// Discriminate the raw stored value. Malformed values yield `None` and
    /// are treated as "no usable channel", not as an error.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with(NATIVE_TOKEN_PREFIX) && raw.ends_with(']') {
            return Some(PushSubscription::NativeToken(raw.to_string()));
        }
        match serde_json::from_str::<WebPushEndpoint>(raw) {
            Ok(ep) if !ep.endpoint.is_empty() => Some(PushSubscription::WebEndpoint(ep)),
            _ => None,
        }
    }
}

/// Outcome of a single push delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Accepted by the provider.
    Delivered,
    /// The target is permanently invalid (device unregistered, endpoint 410).
    /// Future attempts can never succeed — the subscription must be dropped.
    Gone(String),
    /// Temporary inability to deliver (network, rate limit, 5xx).
    Transient(String),
}

/// The cross-channel reminder payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderNote {
    pub title: String,
    pub message: String,
}

impl ReminderNote {
    /// Build the reminder note for an appointment.
    pub fn for_appointment(appt: &Appointment) -> Self {
        Self {
            title: format!("🔔 Reminder: {}", appt.title),
            message: format!(
                "Your appointment is at {}.",
                appt.scheduled_at.format("%H:%M")
            ),
        }
    }
}

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub plan: Plan,
    pub trial_ends_at: Option<DateTime<Utc>>,
    /// Raw stored subscription value — discriminated via [`User::subscription`].
    pub push_subscription: Option<String>,
    pub created_at: String,
}

impl User {
    /// The user's usable push target, if any.
    pub fn subscription(&self) -> Option<PushSubscription> {
        self.push_subscription
            .as_deref()
            .and_then(PushSubscription::parse)
    }
}

/// Appointment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub description: Option<String>,
    pub reminder_sent: bool,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_token_shape() {
        let sub = PushSubscription::parse("ExponentPushToken[abc123XYZ]").unwrap();
        assert!(matches!(sub, PushSubscription::NativeToken(t) if t.contains("abc123XYZ")));
    }

    #[test]
    fn test_web_endpoint_shape() {
        let raw = r#"{"endpoint":"https://fcm.googleapis.com/fcm/send/xyz","keys":{"p256dh":"pk","auth":"ak"}}"#;
        let sub = PushSubscription::parse(raw).unwrap();
        match sub {
            PushSubscription::WebEndpoint(ep) => {
                assert_eq!(ep.endpoint, "https://fcm.googleapis.com/fcm/send/xyz");
                assert_eq!(ep.keys.p256dh, "pk");
            }
            _ => panic!("expected web endpoint"),
        }
    }

    #[test]
    fn test_endpoint_without_keys_still_parses() {
        let sub = PushSubscription::parse(r#"{"endpoint":"https://push.example/e1"}"#);
        assert!(matches!(sub, Some(PushSubscription::WebEndpoint(_))));
    }

    #[test]
    fn test_malformed_values_are_no_channel() {
        assert!(PushSubscription::parse("").is_none());
        assert!(PushSubscription::parse("   ").is_none());
        assert!(PushSubscription::parse("not json, not a token").is_none());
        assert!(PushSubscription::parse(r#"{"foo":"bar"}"#).is_none());
        assert!(PushSubscription::parse(r#"{"endpoint":""}"#).is_none());
        // Truncated native token (missing closing bracket)
        assert!(PushSubscription::parse("ExponentPushToken[abc").is_none());
    }

    #[test]
    fn test_plan_round_trip() {
        for plan in [Plan::Free, Plan::Pro, Plan::Trial] {
            assert_eq!(Plan::parse(plan.as_str()), plan);
        }
        assert_eq!(Plan::parse("enterprise"), Plan::Free);
    }

    #[test]
    fn test_appointment_limits() {
        assert_eq!(appointment_limit(Plan::Free), Some(5));
        assert_eq!(appointment_limit(Plan::Trial), Some(5));
        assert_eq!(appointment_limit(Plan::Pro), None);
    }
}
