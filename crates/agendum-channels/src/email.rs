//! Outbound email via SMTP (async lettre).
//!
//! One transport built at startup, reused for every send. Two message kinds:
//! the appointment reminder (sent by the dispatcher) and the booking
//! confirmation (sent when an appointment is created). Both are best-effort
//! from the caller's point of view.

use agendum_core::config::EmailConfig;
use agendum_core::error::{AgendumError, Result};
use agendum_core::traits::Mailer;
use agendum_core::types::{Appointment, User};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

/// SMTP mailer.
pub struct SmtpMailer {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the relay once from config.
    pub fn new(config: EmailConfig) -> Result<Self> {
        let creds = Credentials::new(config.email.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AgendumError::Channel(format!("SMTP relay: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();
        Ok(Self { config, transport })
    }

    async fn send_html(&self, to: &str, subject: &str, html: String) -> Result<()> {
        let from_mailbox: Mailbox = format!("{} <{}>", self.config.from_name, self.config.email)
            .parse()
            .map_err(|e| AgendumError::Channel(format!("Invalid from: {e}")))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| AgendumError::Channel(format!("Invalid to: {e}")))?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| AgendumError::Channel(format!("Build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AgendumError::Channel(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {to}");
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_reminder(&self, user: &User, appt: &Appointment) -> Result<()> {
        let subject = format!("🔔 Reminder for your appointment: {}", appt.title);
        self.send_html(&user.email, &subject, reminder_html(user, appt))
            .await
    }

    async fn send_confirmation(&self, user: &User, appt: &Appointment) -> Result<()> {
        let subject = format!("✅ Appointment confirmed: {}", appt.title);
        self.send_html(&user.email, &subject, confirmation_html(user, appt))
            .await
    }
}

fn details_list(appt: &Appointment) -> String {
    format!(
        "<ul>\
         <li><strong>Title:</strong> {}</li>\
         <li><strong>Date and time:</strong> {}</li>\
         <li><strong>Description:</strong> {}</li>\
         </ul>",
        appt.title,
        appt.scheduled_at.format("%A, %B %-d at %H:%M"),
        appt.description.as_deref().unwrap_or("No description."),
    )
}

fn reminder_html(user: &User, appt: &Appointment) -> String {
    format!(
        "<h1>Hi, {}!</h1>\
         <p>This is a reminder for your upcoming appointment, which is about to start.</p>\
         <h3>Appointment details:</h3>{}\
         <p>Have a great day!</p>",
        user.display_name,
        details_list(appt)
    )
}

fn confirmation_html(user: &User, appt: &Appointment) -> String {
    format!(
        "<h1>Hi, {}!</h1>\
         <p>Your appointment has been booked successfully.</p>\
         <h3>Appointment details:</h3>{}\
         <p>You will receive a reminder 15 minutes before it starts. Thanks for using Agendum!</p>",
        user.display_name,
        details_list(appt)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendum_core::types::Plan;
    use chrono::Utc;

    fn fixture() -> (User, Appointment) {
        let user = User {
            id: "u1".into(),
            display_name: "Ana".into(),
            email: "ana@example.com".into(),
            plan: Plan::Trial,
            trial_ends_at: None,
            push_subscription: None,
            created_at: String::new(),
        };
        let appt = Appointment {
            id: "a1".into(),
            user_id: "u1".into(),
            title: "Dentist".into(),
            scheduled_at: Utc::now(),
            description: None,
            reminder_sent: false,
            created_at: String::new(),
        };
        (user, appt)
    }

    #[test]
    fn test_reminder_body_mentions_user_and_title() {
        let (user, appt) = fixture();
        let html = reminder_html(&user, &appt);
        assert!(html.contains("Ana"));
        assert!(html.contains("Dentist"));
        assert!(html.contains("No description."));
    }

    #[test]
    fn test_confirmation_body_mentions_reminder_lead_time() {
        let (user, appt) = fixture();
        let html = confirmation_html(&user, &appt);
        assert!(html.contains("15 minutes"));
    }
}
