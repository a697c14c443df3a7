use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::settings::{CURRENT_SETTINGS_NAME, Settings};

#[async_trait::async_trait]
pub trait SettingsRepository {
    /// The `Current` settings row, if it has been seeded.
    async fn get_settings(&self) -> Result<Option<Settings>, AppError>;
}

#[async_trait::async_trait]
impl SettingsRepository for PostgresRepository {
    async fn get_settings(&self) -> Result<Option<Settings>, AppError> {
        let settings = sqlx::query_as::<_, Settings>(
            r#"
            SELECT id, name, password_reset_ticket_expiry_minutes, cache_version
            FROM settings
            WHERE name = $1
            "#,
        )
        .bind(CURRENT_SETTINGS_NAME)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings)
    }
}
