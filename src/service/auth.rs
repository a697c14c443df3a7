use crate::config::SessionConfig;
use crate::database::audit_event::AuditEventRepository;
use crate::database::logon_failure::LogonFailureRepository;
use crate::database::session::SessionRepository;
use crate::database::user::{UserRepository, dummy_verify, verify_password};
use crate::error::app_error::AppError;
use crate::models::audit_event::{NewAuditEvent, audit_events};
use crate::models::login::{ExternalLoginInfo, LoginOutcome};
use crate::models::session::Session;
use crate::models::user::User;
use chrono::{Duration, Utc};
use uuid::Uuid;

/// Credential verification and session lifecycle.
pub struct AuthService<'a, R> {
    repo: &'a R,
    config: &'a SessionConfig,
}

impl<'a, R> AuthService<'a, R>
where
    R: UserRepository + SessionRepository + AuditEventRepository + LogonFailureRepository + Sync,
{
    pub fn new(repo: &'a R, config: &'a SessionConfig) -> Self {
        AuthService { repo, config }
    }

    /// Email/password sign-in.
    ///
    /// The deactivation check runs only after the password verifies, so a wrong
    /// password never reveals whether the account is deactivated.
    pub async fn login(&self, email: &str, password: &str, return_url: Option<&str>, client_ip: Option<&str>) -> Result<LoginOutcome, AppError> {
        let Some(user) = self.repo.get_user_by_email(email).await? else {
            dummy_verify(password);
            self.reject_credentials(email, None, client_ip, "user_not_found").await;
            return Err(AppError::InvalidCredentials);
        };

        if let Err(err) = verify_password(&user, password) {
            let reason = match err {
                AppError::InvalidCredentials => "wrong_password",
                _ => {
                    tracing::error!(user_id = %user.id, error = ?err, "stored password hash is unreadable");
                    "unreadable_password_hash"
                }
            };
            self.reject_credentials(email, Some(user.id), client_ip, reason).await;
            return Err(AppError::InvalidCredentials);
        }

        if user.is_deactivated {
            let _ = self
                .repo
                .record_audit_event(NewAuditEvent::failure(audit_events::LOGIN_DEACTIVATED).user(user.id).ip(client_ip))
                .await;
            return Err(AppError::AccountDeactivated);
        }

        let _ = self.repo.clear_logon_failures(email, client_ip).await;

        let session = self.establish_session(&user).await?;
        let _ = self
            .repo
            .record_audit_event(NewAuditEvent::success(audit_events::LOGIN_SUCCESS).user(user.id).ip(client_ip))
            .await;

        Ok(LoginOutcome {
            user_id: user.id,
            session_id: session.id,
            redirect_to: resolve_redirect(return_url, &self.config.default_landing_path),
        })
    }

    /// Sign-in on behalf of an external identity provider.
    ///
    /// Fails with [`AppError::NoEmailClaim`], [`AppError::NotRegistered`] or
    /// [`AppError::AccountDeactivated`]; callers turn those into a redirect back
    /// to the login page.
    pub async fn external_login(&self, info: &ExternalLoginInfo, client_ip: Option<&str>) -> Result<LoginOutcome, AppError> {
        let result = self.resolve_external_user(info).await;

        let user = match result {
            Ok(user) => user,
            Err(err) => {
                if let Some(code) = err.external_login_code() {
                    let _ = self
                        .repo
                        .record_audit_event(
                            NewAuditEvent::failure(audit_events::EXTERNAL_LOGIN_FAILED)
                                .ip(client_ip)
                                .data(serde_json::json!({ "provider": &info.provider, "reason": code })),
                        )
                        .await;
                }
                return Err(err);
            }
        };

        let session = self.establish_session(&user).await?;
        let _ = self
            .repo
            .record_audit_event(
                NewAuditEvent::success(audit_events::EXTERNAL_LOGIN_SUCCESS)
                    .user(user.id)
                    .ip(client_ip)
                    .data(serde_json::json!({ "provider": &info.provider })),
            )
            .await;

        Ok(LoginOutcome {
            user_id: user.id,
            session_id: session.id,
            redirect_to: "/".to_string(),
        })
    }

    pub async fn logout(&self, session_id: &Uuid, user_id: &Uuid, client_ip: Option<&str>) -> Result<(), AppError> {
        self.repo.delete_session(session_id).await?;
        let _ = self
            .repo
            .record_audit_event(NewAuditEvent::success(audit_events::LOGOUT).user(*user_id).ip(client_ip))
            .await;
        Ok(())
    }

    async fn resolve_external_user(&self, info: &ExternalLoginInfo) -> Result<User, AppError> {
        let email = info.email().ok_or(AppError::NoEmailClaim)?;
        let user = self
            .repo
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotRegistered(email.to_string()))?;

        if user.is_deactivated {
            return Err(AppError::AccountDeactivated);
        }

        Ok(user)
    }

    async fn establish_session(&self, user: &User) -> Result<Session, AppError> {
        let expires_at = Utc::now() + Duration::seconds(self.config.ttl_seconds);
        self.repo.create_session(&user.id, expires_at).await
    }

    async fn reject_credentials(&self, email: &str, user_id: Option<Uuid>, client_ip: Option<&str>, reason: &str) {
        let _ = self.repo.record_logon_failure(email, client_ip).await;

        let mut event = NewAuditEvent::failure(audit_events::LOGIN_FAILED)
            .ip(client_ip)
            .data(serde_json::json!({ "reason": reason }));
        if let Some(user_id) = user_id {
            event = event.user(user_id);
        }
        let _ = self.repo.record_audit_event(event).await;
    }
}

/// Only same-site paths are honoured; anything else falls back to `default`.
pub fn resolve_redirect(return_url: Option<&str>, default: &str) -> String {
    match return_url.map(str::trim) {
        Some(url) if is_local_path(url) => url.to_string(),
        _ => default.to_string(),
    }
}

fn is_local_path(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\") && !url.contains("://")
}

/// Where a failed external login sends the browser.
pub fn external_login_failure_redirect(login_path: &str, email: Option<&str>, provider: &str, error_code: &str) -> String {
    format!(
        "{}?ReturnUrl={}&email={}&provider={}&error={}",
        login_path,
        urlencoding::encode(login_path),
        urlencoding::encode(email.unwrap_or_default()),
        urlencoding::encode(provider),
        urlencoding::encode(error_code)
    )
}
