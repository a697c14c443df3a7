use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Failed sign-in attempts for one (email, ip) pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LogonFailure {
    pub id: Uuid,
    pub email: String,
    pub ip: String,
    pub attempts: i32,
    pub date: DateTime<Utc>,
}

/// Emails are compared case-insensitively and unknown addresses collapse to "".
pub fn normalize_key(email: &str, ip: Option<&str>) -> (String, String) {
    (email.trim().to_lowercase(), ip.unwrap_or_default().to_string())
}
