use crate::Config;
use crate::cache::InMemoryEntityCache;
use crate::database::password_reset_ticket::PasswordResetTicketRepository;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::settings::SettingsRepository;
use crate::db::init_pool;
use crate::models::password_reset_ticket::PasswordResetTicket;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct PurgeTicketsResult {
    pub expiry_minutes: i32,
    pub tickets_deleted: u64,
}

/// Delete password reset tickets that can no longer be redeemed.
pub async fn purge_expired_tickets(config: &Config) -> Result<PurgeTicketsResult, String> {
    let pool = init_pool(&config.database)
        .await
        .map_err(|err| format!("Failed to initialize database pool: {err}"))?;

    let repo = PostgresRepository::new(pool.clone(), Arc::new(InMemoryEntityCache::<PasswordResetTicket>::new(config.cache.max_entries)));

    let expiry_minutes = repo
        .get_settings()
        .await
        .map_err(|err| format!("Failed to read settings: {err:?}"))?
        .map(|settings| settings.password_reset_ticket_expiry_minutes)
        .unwrap_or(config.password_reset.default_ticket_expiry_minutes);

    let tickets_deleted = repo
        .delete_expired_tickets(Utc::now(), expiry_minutes)
        .await
        .map_err(|err| format!("Failed to purge expired tickets: {err:?}"))?;

    pool.close().await;

    Ok(PurgeTicketsResult {
        expiry_minutes,
        tickets_deleted,
    })
}
