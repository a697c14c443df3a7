use crate::config::PasswordResetConfig;
use crate::database::audit_event::AuditEventRepository;
use crate::database::logon_failure::LogonFailureRepository;
use crate::database::password_reset_ticket::PasswordResetTicketRepository;
use crate::database::session::SessionRepository;
use crate::database::settings::SettingsRepository;
use crate::database::user::{UserRepository, dummy_verify};
use crate::error::app_error::AppError;
use crate::models::audit_event::{NewAuditEvent, audit_events};
use crate::models::password_reset_ticket::{ENTITY_NAME, PasswordResetTicket, TicketValidationResponse};
use crate::service::email::ResetNotifier;
use uuid::Uuid;

pub struct PasswordResetService<'a, R> {
    repo: &'a R,
    config: &'a PasswordResetConfig,
    notifier: &'a dyn ResetNotifier,
}

impl<'a, R> PasswordResetService<'a, R>
where
    R: UserRepository
        + PasswordResetTicketRepository
        + SettingsRepository
        + SessionRepository
        + AuditEventRepository
        + LogonFailureRepository
        + Sync,
{
    pub fn new(repo: &'a R, config: &'a PasswordResetConfig, notifier: &'a dyn ResetNotifier) -> Self {
        PasswordResetService { repo, config, notifier }
    }

    /// Lifetime of a ticket, from the current settings row when there is one.
    pub async fn ticket_expiry_minutes(&self) -> Result<i32, AppError> {
        let minutes = self
            .repo
            .get_settings()
            .await?
            .map(|settings| settings.password_reset_ticket_expiry_minutes)
            .unwrap_or(self.config.default_ticket_expiry_minutes);
        Ok(minutes)
    }

    pub fn reset_link(&self, ticket_id: &Uuid) -> String {
        format!("{}?ticket={}", self.config.frontend_reset_url, ticket_id)
    }

    /// Issue a ticket for an active account and email the link.
    ///
    /// Returns `None` when no ticket was issued. Callers must answer the same
    /// way in both cases.
    pub async fn request_reset(&self, email: &str, client_ip: Option<&str>) -> Result<Option<PasswordResetTicket>, AppError> {
        let user = match self.repo.get_user_by_email(email).await? {
            Some(user) if !user.is_deactivated => user,
            Some(user) => {
                self.audit_failure(Some(user.id), client_ip, "account_deactivated").await;
                return Ok(None);
            }
            None => {
                dummy_verify("fake_password");
                self.audit_failure(None, client_ip, "user_not_found").await;
                return Ok(None);
            }
        };

        let ticket = PasswordResetTicket::new(user.id);
        self.repo.insert_ticket(&ticket).await?;

        let _ = self
            .repo
            .record_audit_event(
                NewAuditEvent::success(audit_events::PASSWORD_RESET_REQUESTED)
                    .user(user.id)
                    .item(ENTITY_NAME, ticket.id)
                    .ip(client_ip),
            )
            .await;

        if let Err(e) = self.notifier.send_password_reset(&user.email, &user.name(), &self.reset_link(&ticket.id)).await {
            tracing::error!(user_id = %user.id, "Failed to send password reset email: {}", e);
        }

        Ok(Some(ticket))
    }

    pub async fn validate_ticket(&self, ticket_id: &Uuid) -> Result<TicketValidationResponse, AppError> {
        let Some(ticket) = self.repo.get_ticket(ticket_id).await? else {
            return Ok(TicketValidationResponse::invalid());
        };

        if !ticket.is_valid_at(chrono::Utc::now(), self.ticket_expiry_minutes().await?) {
            return Ok(TicketValidationResponse::invalid());
        }

        match self.repo.load_ticket_user(&ticket).await? {
            Some(user) if !user.is_deactivated => Ok(TicketValidationResponse {
                valid: true,
                email: Some(user.email),
            }),
            _ => Ok(TicketValidationResponse::invalid()),
        }
    }

    /// Redeem a ticket.
    ///
    /// The ticket is burned before the password changes. Burning only succeeds
    /// against a row that is still unused, so a second redemption from a stale
    /// or concurrent copy fails with a conflict and changes nothing.
    pub async fn complete_reset(&self, ticket_id: &Uuid, new_password: &str, client_ip: Option<&str>) -> Result<(), AppError> {
        let expiry_minutes = self.ticket_expiry_minutes().await?;

        let ticket = match self.repo.get_ticket(ticket_id).await? {
            Some(ticket) if ticket.is_valid_at(chrono::Utc::now(), expiry_minutes) => ticket,
            Some(ticket) => {
                let reason = if ticket.is_used { "ticket_used" } else { "ticket_expired" };
                self.audit_failure(Some(ticket.user_id), client_ip, reason).await;
                return Err(invalid_ticket());
            }
            None => {
                self.audit_failure(None, client_ip, "ticket_not_found").await;
                return Err(invalid_ticket());
            }
        };

        let user = self
            .repo
            .load_ticket_user(&ticket)
            .await?
            .filter(|user| !user.is_deactivated)
            .ok_or_else(invalid_ticket)?;

        self.repo.mark_ticket_used(&ticket).await?;
        self.repo.update_user_password(&user.id, new_password).await?;

        let invalidated = self.repo.invalidate_all_user_sessions(&user.id).await?;
        let _ = self.repo.clear_logon_failures(&user.email, client_ip).await;

        let _ = self
            .repo
            .record_audit_event(
                NewAuditEvent::success(audit_events::PASSWORD_RESET_COMPLETED)
                    .user(user.id)
                    .item(ENTITY_NAME, ticket.id)
                    .ip(client_ip)
                    .data(serde_json::json!({ "sessions_invalidated": invalidated })),
            )
            .await;

        Ok(())
    }

    async fn audit_failure(&self, user_id: Option<Uuid>, client_ip: Option<&str>, reason: &str) {
        let mut event = NewAuditEvent::failure(audit_events::PASSWORD_RESET_FAILED)
            .ip(client_ip)
            .data(serde_json::json!({ "reason": reason }));
        if let Some(user_id) = user_id {
            event = event.user(user_id);
        }
        let _ = self.repo.record_audit_event(event).await;
    }
}

fn invalid_ticket() -> AppError {
    AppError::BadRequest("Invalid or expired password reset ticket".to_string())
}
