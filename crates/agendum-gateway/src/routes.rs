//! API route handlers for the gateway.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use agendum_core::types::{Plan, PushSubscription, ReminderNote, appointment_limit};

use super::server::AppState;

type ApiResponse = (StatusCode, Json<serde_json::Value>);

fn err(status: StatusCode, message: &str) -> ApiResponse {
    (status, Json(serde_json::json!({ "message": message })))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "agendum-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Public VAPID key handed to web clients so they can subscribe.
pub async fn vapid_public_key(State(state): State<Arc<AppState>>) -> String {
    state.push_config.vapid_public_key.clone()
}

/// Create a user. New accounts start a trial.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> ApiResponse {
    let display_name = body["display_name"].as_str().unwrap_or("").trim().to_string();
    let email = body["email"].as_str().unwrap_or("").trim().to_string();
    if display_name.is_empty() || email.is_empty() {
        return err(StatusCode::BAD_REQUEST, "display_name and email are required");
    }
    let trial_days = body["trial_days"].as_i64().unwrap_or(14);
    let trial_ends_at = Utc::now() + Duration::days(trial_days);

    let db = state.db.lock().await;
    match db.create_user(&display_name, &email, Some(trial_ends_at)) {
        Ok(user) => (StatusCode::CREATED, Json(serde_json::json!(user))),
        Err(e) => {
            tracing::error!("create user: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "could not create user")
        }
    }
}

/// Fetch a user.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResponse {
    let db = state.db.lock().await;
    match db.get_user(&id) {
        Ok(Some(user)) => (StatusCode::OK, Json(serde_json::json!(user))),
        Ok(None) => err(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => {
            tracing::error!("get user: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "lookup failed")
        }
    }
}

/// Save the caller's push subscription. The body is either a bare token
/// string (native app) or a subscription object (web client); the raw value
/// goes into the single subscription slot verbatim.
pub async fn save_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> ApiResponse {
    let raw = match &body {
        serde_json::Value::String(token) => token.clone(),
        other => other.to_string(),
    };

    {
        let db = state.db.lock().await;
        match db.get_user(&id) {
            Ok(Some(_)) => {}
            Ok(None) => return err(StatusCode::NOT_FOUND, "user not found"),
            Err(e) => {
                tracing::error!("subscription lookup: {e}");
                return err(StatusCode::INTERNAL_SERVER_ERROR, "lookup failed");
            }
        }
        if let Err(e) = db.set_subscription(&id, &raw) {
            tracing::error!("save subscription: {e}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "could not save subscription");
        }
    }

    // Welcome push, best-effort — confirms the channel works end to end
    if let Some(sub) = PushSubscription::parse(&raw) {
        let note = ReminderNote {
            title: "Subscription confirmed!".into(),
            message: "You will now receive appointment reminders.".into(),
        };
        let outcome = match &sub {
            PushSubscription::NativeToken(token) => state.push.send_native(token, &note).await,
            PushSubscription::WebEndpoint(endpoint) => state.push.send_web(endpoint, &note).await,
        };
        tracing::debug!("welcome push for user {id}: {outcome:?}");
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "subscription saved" })),
    )
}

/// Book an appointment. Free and trial plans are capped; pro is not.
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> ApiResponse {
    let title = body["title"].as_str().unwrap_or("").trim().to_string();
    let Some(scheduled_at) = parse_rfc3339(&body["scheduled_at"]) else {
        return err(StatusCode::BAD_REQUEST, "scheduled_at must be an RFC 3339 timestamp");
    };
    if title.is_empty() {
        return err(StatusCode::BAD_REQUEST, "title is required");
    }
    let description = body["description"].as_str().map(str::to_string);

    let created = {
        let db = state.db.lock().await;
        let user = match db.get_user(&id) {
            Ok(Some(user)) => user,
            Ok(None) => return err(StatusCode::NOT_FOUND, "user not found"),
            Err(e) => {
                tracing::error!("booking lookup: {e}");
                return err(StatusCode::INTERNAL_SERVER_ERROR, "lookup failed");
            }
        };

        if let Some(limit) = appointment_limit(user.plan) {
            match db.count_appointments(&id) {
                Ok(count) if count >= limit => {
                    return (
                        StatusCode::FORBIDDEN,
                        Json(serde_json::json!({
                            "message": format!("You have reached the limit of {limit} appointments allowed on your plan."),
                            "reason": "limit_reached",
                        })),
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("appointment count: {e}");
                    return err(StatusCode::INTERNAL_SERVER_ERROR, "booking failed");
                }
            }
        }

        match db.create_appointment(&id, &title, scheduled_at, description.as_deref()) {
            Ok(appt) => (user, appt),
            Err(e) => {
                tracing::error!("create appointment: {e}");
                return err(StatusCode::INTERNAL_SERVER_ERROR, "booking failed");
            }
        }
    };

    // Confirmation email is a nice-to-have, never a booking blocker
    let (user, appt) = created;
    if let Err(e) = state.mailer.send_confirmation(&user, &appt).await {
        tracing::warn!("[email] confirmation for user {}: {e}", user.id);
    }

    (StatusCode::CREATED, Json(serde_json::json!(appt)))
}

/// List a user's appointments.
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResponse {
    let db = state.db.lock().await;
    match db.appointments_for_user(&id) {
        Ok(list) => (StatusCode::OK, Json(serde_json::json!(list))),
        Err(e) => {
            tracing::error!("list appointments: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "lookup failed")
        }
    }
}

/// Edit an appointment. Moving it to a new time re-arms its reminder.
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> ApiResponse {
    let title = body["title"].as_str().unwrap_or("").trim().to_string();
    let Some(scheduled_at) = parse_rfc3339(&body["scheduled_at"]) else {
        return err(StatusCode::BAD_REQUEST, "scheduled_at must be an RFC 3339 timestamp");
    };
    if title.is_empty() {
        return err(StatusCode::BAD_REQUEST, "title is required");
    }
    let description = body["description"].as_str().map(str::to_string);

    let db = state.db.lock().await;
    match db.reschedule_appointment(&id, &title, scheduled_at, description.as_deref()) {
        Ok(Some(appt)) => (StatusCode::OK, Json(serde_json::json!(appt))),
        Ok(None) => err(StatusCode::NOT_FOUND, "appointment not found"),
        Err(e) => {
            tracing::error!("reschedule: {e}");
            err(StatusCode::INTERNAL_SERVER_ERROR, "update failed")
        }
    }
}

/// Upgrade to the pro plan (billing confirmation happens upstream).
pub async fn subscribe_pro(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResponse {
    let db = state.db.lock().await;
    let user = match db.get_user(&id) {
        Ok(Some(user)) => user,
        Ok(None) => return err(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => {
            tracing::error!("billing lookup: {e}");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "lookup failed");
        }
    };
    if user.plan == Plan::Pro {
        return err(StatusCode::BAD_REQUEST, "You already have an active Pro subscription.");
    }
    if let Err(e) = db.upgrade_to_pro(&id) {
        tracing::error!("upgrade: {e}");
        return err(StatusCode::INTERNAL_SERVER_ERROR, "upgrade failed");
    }
    tracing::info!("[billing] user {id} subscribed to the Pro plan");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Congratulations! You now have a Pro subscription." })),
    )
}

fn parse_rfc3339(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_accepts_offsets() {
        let t = parse_rfc3339(&serde_json::json!("2026-08-08T10:30:00+02:00")).unwrap();
        assert_eq!(t.format("%H:%M").to_string(), "08:30");
        assert!(parse_rfc3339(&serde_json::json!("next tuesday")).is_none());
        assert!(parse_rfc3339(&serde_json::json!(42)).is_none());
    }
}
