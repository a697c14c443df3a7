use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::audit_event::NewAuditEvent;

#[async_trait::async_trait]
pub trait AuditEventRepository {
    async fn record_audit_event(&self, event: NewAuditEvent) -> Result<(), AppError>;
}

/// Mirror an audit entry to tracing so it shows up in operational logs too.
pub(crate) fn trace_audit_event(event: &NewAuditEvent) {
    let user_id = event.user_id.map(|id| id.to_string());
    let item_id = event.item_id.map(|id| id.to_string());

    if event.success {
        tracing::info!(
            category = "audit",
            event = event.event,
            user_id = user_id.as_deref().unwrap_or("-"),
            item_type = event.item_type.unwrap_or("-"),
            item_id = item_id.as_deref().unwrap_or("-"),
            ip = event.user_ip.as_deref().unwrap_or("-"),
            "security audit event"
        );
    } else {
        tracing::warn!(
            category = "audit",
            event = event.event,
            user_id = user_id.as_deref().unwrap_or("-"),
            item_type = event.item_type.unwrap_or("-"),
            item_id = item_id.as_deref().unwrap_or("-"),
            ip = event.user_ip.as_deref().unwrap_or("-"),
            "security audit event (failure)"
        );
    }
}

#[async_trait::async_trait]
impl AuditEventRepository for PostgresRepository {
    async fn record_audit_event(&self, event: NewAuditEvent) -> Result<(), AppError> {
        trace_audit_event(&event);

        sqlx::query(
            r#"
            INSERT INTO audit_events (user_id, event, success, item_type, item_id, item_data, user_ip)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.user_id)
        .bind(event.event)
        .bind(event.success)
        .bind(event.item_type)
        .bind(event.item_id)
        .bind(event.item_data)
        .bind(event.user_ip)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
