//! SQLite schema and queries for users and appointments.

use agendum_core::error::{AgendumError, Result};
use agendum_core::types::{Appointment, Plan, User};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};
use std::path::Path;

/// Database handle. One connection, WAL mode, migrations run at open.
pub struct AgendumDb {
    conn: Connection,
}

/// Shared SELECT column list for user queries — single source of truth.
const USER_SELECT: &str =
    "SELECT id,display_name,email,plan,trial_ends_at,push_subscription,created_at FROM users";

/// Map a database row to a User struct.
fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        plan: Plan::parse(&row.get::<_, String>(3)?),
        trial_ends_at: row
            .get::<_, Option<i64>>(4)?
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        push_subscription: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const APPOINTMENT_SELECT: &str =
    "SELECT id,user_id,title,scheduled_at,description,reminder_sent,created_at FROM appointments";

fn row_to_appointment(row: &rusqlite::Row) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        scheduled_at: DateTime::from_timestamp(row.get::<_, i64>(3)?, 0).unwrap_or_default(),
        description: row.get(4)?,
        reminder_sent: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

impl AgendumDb {
    /// Open or create the database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| AgendumError::Store(format!("DB open error: {e}")))?;

        // WAL for concurrent readers, foreign keys for user→appointment cascade
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| AgendumError::Store(format!("DB pragma error: {e}")))?;

        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                plan TEXT NOT NULL DEFAULT 'trial',
                trial_ends_at INTEGER,
                push_subscription TEXT,
                created_at TEXT DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS appointments (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                scheduled_at INTEGER NOT NULL,
                description TEXT,
                reminder_sent INTEGER NOT NULL DEFAULT 0,
                created_at TEXT DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_appointments_due
                ON appointments (reminder_sent, scheduled_at);
            CREATE INDEX IF NOT EXISTS idx_users_plan
                ON users (plan, trial_ends_at);
        ",
            )
            .map_err(|e| AgendumError::Store(format!("Migration error: {e}")))?;
        Ok(())
    }

    // ── Users ────────────────────────────────────

    /// Create a new user. New accounts start on the trial plan.
    pub fn create_user(
        &self,
        display_name: &str,
        email: &str,
        trial_ends_at: Option<DateTime<Utc>>,
    ) -> Result<User> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO users (id, display_name, email, plan, trial_ends_at) VALUES (?1,?2,?3,'trial',?4)",
                params![id, display_name, email, trial_ends_at.map(|t| t.timestamp())],
            )
            .map_err(|e| AgendumError::Store(format!("Create user: {e}")))?;
        self.get_user(&id)?
            .ok_or_else(|| AgendumError::store("user vanished after insert"))
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        match self.conn.query_row(
            &format!("{USER_SELECT} WHERE id=?1"),
            params![id],
            row_to_user,
        ) {
            Ok(u) => Ok(Some(u)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AgendumError::Store(format!("Get user: {e}"))),
        }
    }

    /// Overwrite the user's push subscription slot (last write wins).
    /// The raw value is stored verbatim — shape is decided at read time.
    pub fn set_subscription(&self, user_id: &str, raw: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE users SET push_subscription=?1 WHERE id=?2",
                params![raw, user_id],
            )
            .map_err(|e| AgendumError::Store(format!("Set subscription: {e}")))?;
        Ok(())
    }

    /// Null out the push subscription. Called when a channel reports the
    /// target permanently gone, so later sweeps stop retrying a dead endpoint.
    pub fn clear_subscription(&self, user_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE users SET push_subscription=NULL WHERE id=?1",
                params![user_id],
            )
            .map_err(|e| AgendumError::Store(format!("Clear subscription: {e}")))?;
        Ok(())
    }

    /// Upgrade to the pro plan. Ends any running trial.
    pub fn upgrade_to_pro(&self, user_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE users SET plan='pro', trial_ends_at=NULL WHERE id=?1",
                params![user_id],
            )
            .map_err(|e| AgendumError::Store(format!("Upgrade plan: {e}")))?;
        Ok(())
    }

    /// Delete a user. Appointments cascade.
    pub fn delete_user(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM users WHERE id=?1", params![id])
            .map_err(|e| AgendumError::Store(format!("Delete user: {e}")))?;
        Ok(())
    }

    // ── Appointments ────────────────────────────────────

    /// Create an appointment.
    pub fn create_appointment(
        &self,
        user_id: &str,
        title: &str,
        scheduled_at: DateTime<Utc>,
        description: Option<&str>,
    ) -> Result<Appointment> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO appointments (id, user_id, title, scheduled_at, description) VALUES (?1,?2,?3,?4,?5)",
                params![id, user_id, title, scheduled_at.timestamp(), description],
            )
            .map_err(|e| AgendumError::Store(format!("Create appointment: {e}")))?;
        self.get_appointment(&id)?
            .ok_or_else(|| AgendumError::store("appointment vanished after insert"))
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, id: &str) -> Result<Option<Appointment>> {
        match self.conn.query_row(
            &format!("{APPOINTMENT_SELECT} WHERE id=?1"),
            params![id],
            row_to_appointment,
        ) {
            Ok(a) => Ok(Some(a)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AgendumError::Store(format!("Get appointment: {e}"))),
        }
    }

    /// List a user's appointments, soonest first.
    pub fn appointments_for_user(&self, user_id: &str) -> Result<Vec<Appointment>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{APPOINTMENT_SELECT} WHERE user_id=?1 ORDER BY scheduled_at"
            ))
            .map_err(|e| AgendumError::Store(format!("Prepare: {e}")))?;

        let appointments = stmt
            .query_map(params![user_id], row_to_appointment)
            .map_err(|e| AgendumError::Store(format!("Query: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(appointments)
    }

    /// How many appointments a user currently holds (plan-limit input).
    pub fn count_appointments(&self, user_id: &str) -> Result<u32> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM appointments WHERE user_id=?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(|e| AgendumError::Store(format!("Count appointments: {e}")))
    }

    /// Update an appointment. Moving it to a different time re-arms the
    /// reminder — the only path that takes `reminder_sent` back to false.
    pub fn reschedule_appointment(
        &self,
        id: &str,
        title: &str,
        scheduled_at: DateTime<Utc>,
        description: Option<&str>,
    ) -> Result<Option<Appointment>> {
        let Some(existing) = self.get_appointment(id)? else {
            return Ok(None);
        };
        let time_changed = existing.scheduled_at != scheduled_at;
        self.conn
            .execute(
                "UPDATE appointments SET title=?1, scheduled_at=?2, description=?3,
                 reminder_sent=CASE WHEN ?4 THEN 0 ELSE reminder_sent END
                 WHERE id=?5",
                params![title, scheduled_at.timestamp(), description, time_changed, id],
            )
            .map_err(|e| AgendumError::Store(format!("Reschedule: {e}")))?;
        self.get_appointment(id)
    }

    // ── Reminder dispatch queries ────────────────────────────────────

    /// Appointments due inside `[now, now + window]` that have not been
    /// notified yet and whose owner has a subscription slot set, each paired
    /// with its owner. Read-only; no ordering guarantee, no pagination.
    pub fn find_due_appointments(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<(Appointment, User)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.id,a.user_id,a.title,a.scheduled_at,a.description,a.reminder_sent,a.created_at,
                        u.id,u.display_name,u.email,u.plan,u.trial_ends_at,u.push_subscription,u.created_at
                 FROM appointments a
                 JOIN users u ON u.id = a.user_id
                 WHERE a.scheduled_at BETWEEN ?1 AND ?2
                   AND a.reminder_sent = 0
                   AND u.push_subscription IS NOT NULL",
            )
            .map_err(|e| AgendumError::Store(format!("Prepare: {e}")))?;

        let upper = now + window;
        let rows = stmt
            .query_map(params![now.timestamp(), upper.timestamp()], |row| {
                let appt = Appointment {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    title: row.get(2)?,
                    scheduled_at: DateTime::from_timestamp(row.get::<_, i64>(3)?, 0)
                        .unwrap_or_default(),
                    description: row.get(4)?,
                    reminder_sent: row.get::<_, i64>(5)? != 0,
                    created_at: row.get(6)?,
                };
                let owner = User {
                    id: row.get(7)?,
                    display_name: row.get(8)?,
                    email: row.get(9)?,
                    plan: Plan::parse(&row.get::<_, String>(10)?),
                    trial_ends_at: row
                        .get::<_, Option<i64>>(11)?
                        .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                    push_subscription: row.get(12)?,
                    created_at: row.get(13)?,
                };
                Ok((appt, owner))
            })
            .map_err(|e| AgendumError::Store(format!("Query: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Flip the reminder flag. Sticky — only `reschedule_appointment` resets it.
    pub fn mark_notified(&self, appointment_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE appointments SET reminder_sent=1 WHERE id=?1",
                params![appointment_id],
            )
            .map_err(|e| AgendumError::Store(format!("Mark notified: {e}")))?;
        Ok(())
    }

    // ── Plan lifecycle queries ────────────────────────────────────

    /// IDs of trial users whose trial has ended as of `now`.
    pub fn find_expired_trials(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM users WHERE plan='trial' AND trial_ends_at <= ?1")
            .map_err(|e| AgendumError::Store(format!("Prepare: {e}")))?;
        let ids = stmt
            .query_map(params![now.timestamp()], |row| row.get::<_, String>(0))
            .map_err(|e| AgendumError::Store(format!("Query: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }

    /// Demote the given users to the free plan in one batched UPDATE.
    /// Returns the number of rows changed.
    pub fn bulk_demote(&self, user_ids: &[String]) -> Result<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; user_ids.len()].join(",");
        let sql = format!("UPDATE users SET plan='free' WHERE id IN ({placeholders})");
        let changed = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(user_ids.iter()))
            .map_err(|e| AgendumError::Store(format!("Bulk demote: {e}")))?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_db() -> AgendumDb {
        AgendumDb::open(&PathBuf::from(":memory:")).unwrap()
    }

    fn minutes(n: i64) -> Duration {
        Duration::minutes(n)
    }

    #[test]
    fn test_create_user_starts_on_trial() {
        let db = temp_db();
        let ends = Utc::now() + Duration::days(14);
        let u = db.create_user("Ana", "ana@example.com", Some(ends)).unwrap();
        assert_eq!(u.plan, Plan::Trial);
        assert_eq!(u.trial_ends_at.unwrap().timestamp(), ends.timestamp());
        assert!(u.push_subscription.is_none());
    }

    #[test]
    fn test_subscription_slot_last_write_wins() {
        let db = temp_db();
        let u = db.create_user("Ana", "ana@example.com", None).unwrap();

        db.set_subscription(&u.id, "ExponentPushToken[tok1]").unwrap();
        let raw = db.get_user(&u.id).unwrap().unwrap().push_subscription;
        assert_eq!(raw.as_deref(), Some("ExponentPushToken[tok1]"));

        db.set_subscription(&u.id, r#"{"endpoint":"https://push.example/e"}"#)
            .unwrap();
        let raw = db.get_user(&u.id).unwrap().unwrap().push_subscription;
        assert!(raw.unwrap().contains("endpoint"));

        db.clear_subscription(&u.id).unwrap();
        assert!(db.get_user(&u.id).unwrap().unwrap().push_subscription.is_none());
    }

    #[test]
    fn test_due_window_selection() {
        let db = temp_db();
        let now = Utc::now();
        let u = db.create_user("Ana", "ana@example.com", None).unwrap();
        db.set_subscription(&u.id, "ExponentPushToken[tok]").unwrap();

        // In window, on both edges, and outside it
        db.create_appointment(&u.id, "in-10", now + minutes(10), None).unwrap();
        db.create_appointment(&u.id, "edge-0", now, None).unwrap();
        db.create_appointment(&u.id, "edge-15", now + minutes(15), None).unwrap();
        db.create_appointment(&u.id, "out-20", now + minutes(20), None).unwrap();
        db.create_appointment(&u.id, "past-5", now - minutes(5), None).unwrap();

        let due = db.find_due_appointments(now, minutes(15)).unwrap();
        let titles: Vec<_> = due.iter().map(|(a, _)| a.title.as_str()).collect();
        assert_eq!(due.len(), 3);
        assert!(titles.contains(&"in-10"));
        assert!(titles.contains(&"edge-0"));
        assert!(titles.contains(&"edge-15"));
        assert!(!titles.contains(&"out-20"));
        assert!(!titles.contains(&"past-5"));
    }

    #[test]
    fn test_due_skips_notified_and_unsubscribed() {
        let db = temp_db();
        let now = Utc::now();

        let subscribed = db.create_user("A", "a@example.com", None).unwrap();
        db.set_subscription(&subscribed.id, "ExponentPushToken[t]").unwrap();
        let unsubscribed = db.create_user("B", "b@example.com", None).unwrap();

        let sent = db
            .create_appointment(&subscribed.id, "already-sent", now + minutes(5), None)
            .unwrap();
        db.mark_notified(&sent.id).unwrap();
        db.create_appointment(&subscribed.id, "fresh", now + minutes(5), None).unwrap();
        db.create_appointment(&unsubscribed.id, "no-channel", now + minutes(5), None)
            .unwrap();

        let due = db.find_due_appointments(now, minutes(15)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0.title, "fresh");
        assert_eq!(due[0].1.id, subscribed.id);
    }

    #[test]
    fn test_mark_notified_is_sticky() {
        let db = temp_db();
        let now = Utc::now();
        let u = db.create_user("Ana", "ana@example.com", None).unwrap();
        db.set_subscription(&u.id, "ExponentPushToken[t]").unwrap();
        let a = db.create_appointment(&u.id, "call", now + minutes(5), None).unwrap();

        db.mark_notified(&a.id).unwrap();
        assert!(db.get_appointment(&a.id).unwrap().unwrap().reminder_sent);
        // A second sweep must not see it again
        assert!(db.find_due_appointments(now, minutes(15)).unwrap().is_empty());
    }

    #[test]
    fn test_reschedule_rearms_reminder() {
        let db = temp_db();
        let now = Utc::now();
        let u = db.create_user("Ana", "ana@example.com", None).unwrap();
        let a = db.create_appointment(&u.id, "call", now + minutes(5), None).unwrap();
        db.mark_notified(&a.id).unwrap();

        // Title-only edit keeps the flag
        let same_time = db
            .reschedule_appointment(&a.id, "call (renamed)", a.scheduled_at, None)
            .unwrap()
            .unwrap();
        assert!(same_time.reminder_sent);

        // Moving the time resets it
        let moved = db
            .reschedule_appointment(&a.id, "call (renamed)", now + minutes(45), None)
            .unwrap()
            .unwrap();
        assert!(!moved.reminder_sent);
        assert_eq!(moved.scheduled_at.timestamp(), (now + minutes(45)).timestamp());
    }

    #[test]
    fn test_expired_trials_and_bulk_demote() {
        let db = temp_db();
        let now = Utc::now();

        let expired1 = db
            .create_user("E1", "e1@example.com", Some(now - Duration::days(1)))
            .unwrap();
        let expired2 = db
            .create_user("E2", "e2@example.com", Some(now - Duration::hours(2)))
            .unwrap();
        let active = db
            .create_user("A", "a@example.com", Some(now + Duration::days(3)))
            .unwrap();
        let no_end = db.create_user("N", "n@example.com", None).unwrap();

        let ids = db.find_expired_trials(now).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&expired1.id));
        assert!(ids.contains(&expired2.id));

        let changed = db.bulk_demote(&ids).unwrap();
        assert_eq!(changed, 2);
        assert_eq!(db.get_user(&expired1.id).unwrap().unwrap().plan, Plan::Free);
        assert_eq!(db.get_user(&expired2.id).unwrap().unwrap().plan, Plan::Free);
        assert_eq!(db.get_user(&active.id).unwrap().unwrap().plan, Plan::Trial);
        assert_eq!(db.get_user(&no_end.id).unwrap().unwrap().plan, Plan::Trial);

        // Second run with no clock advance is a no-op
        let ids = db.find_expired_trials(now).unwrap();
        assert!(ids.is_empty());
        assert_eq!(db.bulk_demote(&ids).unwrap(), 0);
    }

    #[test]
    fn test_upgrade_to_pro_ends_trial() {
        let db = temp_db();
        let u = db
            .create_user("Ana", "ana@example.com", Some(Utc::now() + Duration::days(5)))
            .unwrap();
        db.upgrade_to_pro(&u.id).unwrap();
        let u = db.get_user(&u.id).unwrap().unwrap();
        assert_eq!(u.plan, Plan::Pro);
        assert!(u.trial_ends_at.is_none());
    }

    #[test]
    fn test_delete_user_cascades_appointments() {
        let db = temp_db();
        let u = db.create_user("Ana", "ana@example.com", None).unwrap();
        let a = db
            .create_appointment(&u.id, "call", Utc::now() + minutes(10), Some("notes"))
            .unwrap();
        assert_eq!(db.count_appointments(&u.id).unwrap(), 1);

        db.delete_user(&u.id).unwrap();
        assert!(db.get_appointment(&a.id).unwrap().is_none());
    }

    #[test]
    fn test_count_appointments() {
        let db = temp_db();
        let u = db.create_user("Ana", "ana@example.com", None).unwrap();
        for i in 0..3 {
            db.create_appointment(&u.id, &format!("a{i}"), Utc::now() + minutes(i), None)
                .unwrap();
        }
        assert_eq!(db.count_appointments(&u.id).unwrap(), 3);
        let list = db.appointments_for_user(&u.id).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].title, "a0");
    }
}
