use uuid::Uuid;

pub const CURRENT_SETTINGS_NAME: &str = "Current";

/// Process-wide values stored in the single `Current` settings row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Settings {
    pub id: Uuid,
    pub name: String,
    pub password_reset_ticket_expiry_minutes: i32,
    pub cache_version: i32,
}
