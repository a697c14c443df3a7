use crate::cache::SharedCache;
use crate::models::password_reset_ticket::PasswordResetTicket;
use sqlx::PgPool;

/// Postgres-backed implementation of every repository trait.
///
/// Managed as Rocket state; cloning is cheap since the pool and cache are shared.
#[derive(Clone)]
pub struct PostgresRepository {
    pub pool: PgPool,
    pub ticket_cache: SharedCache<PasswordResetTicket>,
}

impl PostgresRepository {
    pub fn new(pool: PgPool, ticket_cache: SharedCache<PasswordResetTicket>) -> Self {
        Self { pool, ticket_cache }
    }
}
