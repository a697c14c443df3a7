use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::logon_failure::{LogonFailure, normalize_key};

/// Bookkeeping of failed sign-ins per (email, ip). Nothing is gated on it yet.
#[async_trait::async_trait]
pub trait LogonFailureRepository {
    async fn record_logon_failure(&self, email: &str, ip: Option<&str>) -> Result<LogonFailure, AppError>;
    async fn clear_logon_failures(&self, email: &str, ip: Option<&str>) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl LogonFailureRepository for PostgresRepository {
    async fn record_logon_failure(&self, email: &str, ip: Option<&str>) -> Result<LogonFailure, AppError> {
        let (email, ip) = normalize_key(email, ip);

        let failure = sqlx::query_as::<_, LogonFailure>(
            r#"
            INSERT INTO logon_failures (email, ip, attempts, date)
            VALUES ($1, $2, 1, now())
            ON CONFLICT (email, ip)
            DO UPDATE SET attempts = logon_failures.attempts + 1, date = now()
            RETURNING id, email, ip, attempts, date
            "#,
        )
        .bind(&email)
        .bind(&ip)
        .fetch_one(&self.pool)
        .await?;

        Ok(failure)
    }

    async fn clear_logon_failures(&self, email: &str, ip: Option<&str>) -> Result<(), AppError> {
        let (email, ip) = normalize_key(email, ip);

        sqlx::query("DELETE FROM logon_failures WHERE email = $1 AND ip = $2")
            .bind(&email)
            .bind(&ip)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
