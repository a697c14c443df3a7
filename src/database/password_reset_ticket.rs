use crate::cache::EntityCache;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::user::UserRepository;
use crate::error::app_error::AppError;
use crate::models::password_reset_ticket::{ENTITY_NAME, PasswordResetTicket, TABLE_NAME};
use crate::models::user::User;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Persistence for reset tickets.
///
/// An update that touches no row is reported as [`AppError::ConcurrencyConflict`]
/// and evicts the cached copy. Burning a ticket only succeeds against a row that
/// is still unused, so two holders of the same ticket cannot both redeem it.
#[async_trait::async_trait]
pub trait PasswordResetTicketRepository: Sync {
    async fn insert_ticket(&self, ticket: &PasswordResetTicket) -> Result<(), AppError>;
    async fn get_ticket(&self, id: &Uuid) -> Result<Option<PasswordResetTicket>, AppError>;
    async fn list_tickets_for_user(&self, user_id: &Uuid) -> Result<Vec<PasswordResetTicket>, AppError>;
    async fn update_ticket(&self, ticket: &PasswordResetTicket) -> Result<(), AppError>;
    /// Flip `is_used` on a row that is still unused.
    async fn mark_ticket_used(&self, ticket: &PasswordResetTicket) -> Result<PasswordResetTicket, AppError>;
    async fn delete_ticket(&self, id: &Uuid) -> Result<(), AppError>;
    /// Inserts all tickets in one transaction, `batch_size` rows per statement.
    async fn bulk_insert_tickets(&self, tickets: &[PasswordResetTicket], batch_size: usize) -> Result<u64, AppError>;
    async fn delete_expired_tickets(&self, now: DateTime<Utc>, expiry_minutes: i32) -> Result<u64, AppError>;
    /// Resolve the ticket's `User` reference.
    async fn load_ticket_user(&self, ticket: &PasswordResetTicket) -> Result<Option<User>, AppError>;

    /// Tickets have no many-to-many relations; asking for one is a programming error.
    async fn read_many_to_many_relation(&self, _ticket: &PasswordResetTicket, property: &str) -> Result<Vec<String>, AppError> {
        Err(AppError::UnsupportedRelation {
            entity: ENTITY_NAME,
            property: property.to_string(),
        })
    }
}

/// Statements are capped by the Postgres bind-parameter limit.
pub(crate) fn effective_batch_size(batch_size: usize) -> usize {
    batch_size.clamp(1, MAX_BIND_PARAMETERS / TICKET_COLUMNS)
}

const MAX_BIND_PARAMETERS: usize = 65535;
const TICKET_COLUMNS: usize = 4;

/// Evict the stale copy and build the conflict error for a ticket whose row is gone or already burned.
pub(crate) async fn ticket_conflict(cache: &dyn EntityCache<PasswordResetTicket>, id: Uuid) -> AppError {
    cache.remove(&id).await;
    tracing::warn!(ticket_id = %id, "password reset ticket update affected no rows");
    AppError::ConcurrencyConflict { table: TABLE_NAME, id }
}

#[async_trait::async_trait]
impl PasswordResetTicketRepository for PostgresRepository {
    async fn insert_ticket(&self, ticket: &PasswordResetTicket) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tickets (id, user_id, date_created, is_used)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.user_id)
        .bind(ticket.date_created)
        .bind(ticket.is_used)
        .execute(&self.pool)
        .await?;

        self.ticket_cache.put(ticket.id, ticket.clone()).await;
        Ok(())
    }

    async fn get_ticket(&self, id: &Uuid) -> Result<Option<PasswordResetTicket>, AppError> {
        if let Some(ticket) = self.ticket_cache.get(id).await {
            return Ok(Some(ticket));
        }

        let ticket = sqlx::query_as::<_, PasswordResetTicket>(
            r#"
            SELECT id, user_id, date_created, is_used
            FROM password_reset_tickets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ticket) = &ticket {
            self.ticket_cache.put(ticket.id, ticket.clone()).await;
        }

        Ok(ticket)
    }

    async fn list_tickets_for_user(&self, user_id: &Uuid) -> Result<Vec<PasswordResetTicket>, AppError> {
        let tickets = sqlx::query_as::<_, PasswordResetTicket>(
            r#"
            SELECT id, user_id, date_created, is_used
            FROM password_reset_tickets
            WHERE user_id = $1
            ORDER BY date_created DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    async fn update_ticket(&self, ticket: &PasswordResetTicket) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_tickets
            SET user_id = $2, date_created = $3, is_used = $4
            WHERE id = $1
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.user_id)
        .bind(ticket.date_created)
        .bind(ticket.is_used)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() != 1 {
            return Err(ticket_conflict(&*self.ticket_cache, ticket.id).await);
        }

        self.ticket_cache.put(ticket.id, ticket.clone()).await;
        Ok(())
    }

    async fn mark_ticket_used(&self, ticket: &PasswordResetTicket) -> Result<PasswordResetTicket, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_tickets
            SET is_used = TRUE
            WHERE id = $1 AND is_used = FALSE
            "#,
        )
        .bind(ticket.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() != 1 {
            return Err(ticket_conflict(&*self.ticket_cache, ticket.id).await);
        }

        let used = PasswordResetTicket {
            is_used: true,
            ..ticket.clone()
        };
        self.ticket_cache.put(used.id, used.clone()).await;
        Ok(used)
    }

    async fn delete_ticket(&self, id: &Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM password_reset_tickets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.ticket_cache.remove(id).await;
        Ok(())
    }

    async fn bulk_insert_tickets(&self, tickets: &[PasswordResetTicket], batch_size: usize) -> Result<u64, AppError> {
        if tickets.is_empty() {
            return Ok(0);
        }

        let mut transaction = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in tickets.chunks(effective_batch_size(batch_size)) {
            let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO password_reset_tickets (id, user_id, date_created, is_used) ");
            builder.push_values(chunk, |mut row, ticket| {
                row.push_bind(ticket.id)
                    .push_bind(ticket.user_id)
                    .push_bind(ticket.date_created)
                    .push_bind(ticket.is_used);
            });

            inserted += builder.build().execute(&mut *transaction).await?.rows_affected();
        }

        transaction.commit().await?;

        tracing::info!(inserted, "bulk inserted password reset tickets");
        Ok(inserted)
    }

    async fn delete_expired_tickets(&self, now: DateTime<Utc>, expiry_minutes: i32) -> Result<u64, AppError> {
        let cutoff = now - Duration::minutes(i64::from(expiry_minutes));

        let result = sqlx::query("DELETE FROM password_reset_tickets WHERE date_created < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        // Any cached ticket may be among the deleted rows.
        if result.rows_affected() > 0 {
            self.ticket_cache.clear().await;
        }

        Ok(result.rows_affected())
    }

    async fn load_ticket_user(&self, ticket: &PasswordResetTicket) -> Result<Option<User>, AppError> {
        self.get_user_by_id(&ticket.user_id).await
    }
}
