use crate::cache::{EntityCache, InMemoryEntityCache};
use crate::database::audit_event::{AuditEventRepository, trace_audit_event};
use crate::database::logon_failure::LogonFailureRepository;
use crate::database::password_reset_ticket::{PasswordResetTicketRepository, ticket_conflict};
use crate::database::postgres_repository::PostgresRepository;
use crate::database::session::SessionRepository;
use crate::database::settings::SettingsRepository;
use crate::database::user::UserRepository;
use crate::error::app_error::AppError;
use crate::models::audit_event::NewAuditEvent;
use crate::models::logon_failure::{LogonFailure, normalize_key};
use crate::models::password_reset_ticket::PasswordResetTicket;
use crate::models::session::{Session, SessionUser};
use crate::models::settings::{CURRENT_SETTINGS_NAME, Settings};
use crate::models::user::User;
use crate::service::email::ResetNotifier;
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Duration, Utc};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHasher, SaltString};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Build a user whose stored hash matches `password`.
///
/// Uses deliberately weak Argon2 parameters; verification reads them back from
/// the PHC string so `Argon2::default()` still checks it.
pub fn sample_user(email: &str, password: &str, is_deactivated: bool) -> User {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params::new(8, 1, 1, None).expect("valid argon2 params");
    let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .expect("hash password")
        .to_string();

    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: hash,
        salt: salt.to_string(),
        first_name: "Sample".to_string(),
        last_name: "User".to_string(),
        is_deactivated,
        is_administrator: false,
    }
}

/// In-memory stand-in for Postgres that honours the same row-level contracts.
pub struct MockRepository {
    pub users: Mutex<Vec<User>>,
    pub tickets: Mutex<Vec<PasswordResetTicket>>,
    pub sessions: Mutex<Vec<Session>>,
    pub audit_events: Mutex<Vec<NewAuditEvent>>,
    pub logon_failures: Mutex<Vec<LogonFailure>>,
    pub settings: Mutex<Option<Settings>>,
    pub ticket_cache: Arc<InMemoryEntityCache<PasswordResetTicket>>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            tickets: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            audit_events: Mutex::new(Vec::new()),
            logon_failures: Mutex::new(Vec::new()),
            settings: Mutex::new(None),
            ticket_cache: Arc::new(InMemoryEntityCache::new(64)),
        }
    }

    pub async fn add_user(&self, user: User) -> User {
        self.users.lock().await.push(user.clone());
        user
    }

    pub async fn set_ticket_expiry_minutes(&self, minutes: i32) {
        *self.settings.lock().await = Some(Settings {
            id: Uuid::new_v4(),
            name: CURRENT_SETTINGS_NAME.to_string(),
            password_reset_ticket_expiry_minutes: minutes,
            cache_version: 1,
        });
    }

    /// Drop the row without touching the cache, as a concurrent request would.
    pub async fn remove_ticket_row(&self, id: &Uuid) {
        self.tickets.lock().await.retain(|ticket| ticket.id != *id);
    }

    /// Mark the row used without touching the cache, as another instance would.
    pub async fn burn_ticket_row(&self, id: &Uuid) {
        if let Some(row) = self.tickets.lock().await.iter_mut().find(|ticket| ticket.id == *id) {
            row.is_used = true;
        }
    }

    pub async fn audit_event_names(&self) -> Vec<&'static str> {
        self.audit_events.lock().await.iter().map(|event| event.event).collect()
    }

    pub async fn failure_attempts(&self, email: &str, ip: Option<&str>) -> i32 {
        let (email, ip) = normalize_key(email, ip);
        self.logon_failures
            .lock()
            .await
            .iter()
            .find(|failure| failure.email == email && failure.ip == ip)
            .map(|failure| failure.attempts)
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl UserRepository for MockRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.trim();
        Ok(self.users.lock().await.iter().find(|user| user.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().await.iter().find(|user| user.id == *id).cloned())
    }

    async fn update_user_password(&self, user_id: &Uuid, password: &str) -> Result<(), AppError> {
        let replacement = sample_user("", password, false);
        let mut users = self.users.lock().await;
        let user = users
            .iter_mut()
            .find(|user| user.id == *user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.password_hash = replacement.password_hash;
        user.salt = replacement.salt;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PasswordResetTicketRepository for MockRepository {
    async fn insert_ticket(&self, ticket: &PasswordResetTicket) -> Result<(), AppError> {
        self.tickets.lock().await.push(ticket.clone());
        self.ticket_cache.put(ticket.id, ticket.clone()).await;
        Ok(())
    }

    async fn get_ticket(&self, id: &Uuid) -> Result<Option<PasswordResetTicket>, AppError> {
        if let Some(ticket) = self.ticket_cache.get(id).await {
            return Ok(Some(ticket));
        }
        Ok(self.tickets.lock().await.iter().find(|ticket| ticket.id == *id).cloned())
    }

    async fn list_tickets_for_user(&self, user_id: &Uuid) -> Result<Vec<PasswordResetTicket>, AppError> {
        let mut tickets: Vec<_> = self.tickets.lock().await.iter().filter(|ticket| ticket.user_id == *user_id).cloned().collect();
        tickets.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        Ok(tickets)
    }

    async fn update_ticket(&self, ticket: &PasswordResetTicket) -> Result<(), AppError> {
        let updated = {
            let mut tickets = self.tickets.lock().await;
            match tickets.iter_mut().find(|row| row.id == ticket.id) {
                Some(row) => {
                    *row = ticket.clone();
                    true
                }
                None => false,
            }
        };

        if !updated {
            return Err(ticket_conflict(&*self.ticket_cache, ticket.id).await);
        }

        self.ticket_cache.put(ticket.id, ticket.clone()).await;
        Ok(())
    }

    async fn mark_ticket_used(&self, ticket: &PasswordResetTicket) -> Result<PasswordResetTicket, AppError> {
        let burned = {
            let mut tickets = self.tickets.lock().await;
            match tickets.iter_mut().find(|row| row.id == ticket.id && !row.is_used) {
                Some(row) => {
                    row.is_used = true;
                    true
                }
                None => false,
            }
        };

        if !burned {
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
        self.remove_ticket_row(id).await;
        self.ticket_cache.remove(id).await;
        Ok(())
    }

    async fn bulk_insert_tickets(&self, tickets: &[PasswordResetTicket], _batch_size: usize) -> Result<u64, AppError> {
        self.tickets.lock().await.extend_from_slice(tickets);
        Ok(tickets.len() as u64)
    }

    async fn delete_expired_tickets(&self, now: DateTime<Utc>, expiry_minutes: i32) -> Result<u64, AppError> {
        let cutoff = now - Duration::minutes(i64::from(expiry_minutes));
        let mut tickets = self.tickets.lock().await;
        let before = tickets.len();
        tickets.retain(|ticket| ticket.date_created >= cutoff);
        let removed = (before - tickets.len()) as u64;
        if removed > 0 {
            self.ticket_cache.clear().await;
        }
        Ok(removed)
    }

    async fn load_ticket_user(&self, ticket: &PasswordResetTicket) -> Result<Option<User>, AppError> {
        self.get_user_by_id(&ticket.user_id).await
    }
}

#[async_trait::async_trait]
impl SessionRepository for MockRepository {
    async fn create_session(&self, user_id: &Uuid, expires_at: DateTime<Utc>) -> Result<Session, AppError> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id: *user_id,
            created_at: Utc::now(),
            expires_at,
        };
        self.sessions.lock().await.push(session.clone());
        Ok(session)
    }

    async fn get_active_session_user(&self, session_id: &Uuid, user_id: &Uuid) -> Result<Option<SessionUser>, AppError> {
        let active = self
            .sessions
            .lock()
            .await
            .iter()
            .any(|session| session.id == *session_id && session.user_id == *user_id && session.expires_at > Utc::now());
        if !active {
            return Ok(None);
        }

        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.id == *user_id && !user.is_deactivated)
            .map(|user| SessionUser {
                id: user.id,
                email: user.email.clone(),
                is_administrator: user.is_administrator,
            }))
    }

    async fn delete_session(&self, session_id: &Uuid) -> Result<(), AppError> {
        self.sessions.lock().await.retain(|session| session.id != *session_id);
        Ok(())
    }

    async fn invalidate_all_user_sessions(&self, user_id: &Uuid) -> Result<u64, AppError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|session| session.user_id != *user_id);
        Ok((before - sessions.len()) as u64)
    }
}

#[async_trait::async_trait]
impl SettingsRepository for MockRepository {
    async fn get_settings(&self) -> Result<Option<Settings>, AppError> {
        Ok(self.settings.lock().await.clone())
    }
}

#[async_trait::async_trait]
impl AuditEventRepository for MockRepository {
    async fn record_audit_event(&self, event: NewAuditEvent) -> Result<(), AppError> {
        trace_audit_event(&event);
        self.audit_events.lock().await.push(event);
        Ok(())
    }
}

#[async_trait::async_trait]
impl LogonFailureRepository for MockRepository {
    async fn record_logon_failure(&self, email: &str, ip: Option<&str>) -> Result<LogonFailure, AppError> {
        let (email, ip) = normalize_key(email, ip);
        let mut failures = self.logon_failures.lock().await;

        if let Some(existing) = failures.iter_mut().find(|failure| failure.email == email && failure.ip == ip) {
            existing.attempts += 1;
            existing.date = Utc::now();
            return Ok(existing.clone());
        }

        let failure = LogonFailure {
            id: Uuid::new_v4(),
            email,
            ip,
            attempts: 1,
            date: Utc::now(),
        };
        failures.push(failure.clone());
        Ok(failure)
    }

    async fn clear_logon_failures(&self, email: &str, ip: Option<&str>) -> Result<(), AppError> {
        let (email, ip) = normalize_key(email, ip);
        self.logon_failures.lock().await.retain(|failure| !(failure.email == email && failure.ip == ip));
        Ok(())
    }
}

/// Repository against the Postgres at `DATABASE_URL`, migrated and with a fresh cache.
pub async fn postgres_repository() -> PostgresRepository {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let pool = PgPoolOptions::new().max_connections(4).connect(&url).await.expect("connect to test database");
    sqlx::migrate!("./migrations").run(&pool).await.expect("apply migrations");
    PostgresRepository::new(pool, Arc::new(InMemoryEntityCache::<PasswordResetTicket>::new(64)))
}

/// Insert a user with a unique `<label>-<uuid>@example.com` address and password `old-password`.
pub async fn insert_postgres_user(repo: &PostgresRepository, label: &str, is_deactivated: bool) -> User {
    let user = sample_user(&format!("{}-{}@example.com", label, Uuid::new_v4()), "old-password", is_deactivated);

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, salt, first_name, last_name, is_deactivated)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.salt)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.is_deactivated)
    .execute(&repo.pool)
    .await
    .expect("insert test user");

    user
}

/// Captures reset links instead of sending mail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl ResetNotifier for RecordingNotifier {
    async fn send_password_reset(&self, to_email: &str, _to_name: &str, reset_link: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::email("smtp unavailable"));
        }
        self.sent.lock().await.push((to_email.to_string(), reset_link.to_string()));
        Ok(())
    }
}
