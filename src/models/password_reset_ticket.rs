use chrono::{DateTime, Duration, SubsecRound, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

pub const ENTITY_NAME: &str = "PasswordResetTicket";
pub const TABLE_NAME: &str = "password_reset_tickets";

/// A single-use, time-limited permission for a user to choose a new password.
///
/// Expiry is not stored; it is derived from `date_created` and the configured
/// ticket lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PasswordResetTicket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date_created: DateTime<Utc>,
    pub is_used: bool,
}

impl PasswordResetTicket {
    pub fn new(user_id: Uuid) -> Self {
        Self::issued_at(user_id, Utc::now())
    }

    /// Timestamps are truncated to microseconds, the precision Postgres keeps.
    pub fn issued_at(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            date_created: now.trunc_subsecs(6),
            is_used: false,
        }
    }

    /// Expired once strictly more than `expiry_minutes` have elapsed since creation.
    pub fn is_expired_at(&self, now: DateTime<Utc>, expiry_minutes: i32) -> bool {
        now - self.date_created > Duration::minutes(i64::from(expiry_minutes))
    }

    pub fn is_expired(&self, expiry_minutes: i32) -> bool {
        self.is_expired_at(Utc::now(), expiry_minutes)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>, expiry_minutes: i32) -> bool {
        !self.is_used && !self.is_expired_at(now, expiry_minutes)
    }
}

/// Request a reset ticket for an email address.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct PasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

/// Redeem a reset ticket with a new password.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct PasswordResetCompleteRequest {
    pub ticket_id: Uuid,
    #[validate(length(min = 8))]
    pub new_password: String,
}

/// Always the same message, whether or not the email exists.
#[derive(Debug, Serialize, JsonSchema)]
pub struct PasswordResetResponse {
    pub message: String,
}

impl PasswordResetResponse {
    pub fn generic() -> Self {
        Self {
            message: "If your email address exists in our system, you will receive a password reset link shortly.".to_string(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct TicketValidationResponse {
    pub valid: bool,
    /// Only present for valid tickets.
    pub email: Option<String>,
}

impl TicketValidationResponse {
    pub fn invalid() -> Self {
        Self { valid: false, email: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ticket_created_at(created: DateTime<Utc>) -> PasswordResetTicket {
        PasswordResetTicket::issued_at(Uuid::new_v4(), created)
    }

    #[test]
    fn new_ticket_is_unused() {
        let ticket = PasswordResetTicket::new(Uuid::new_v4());
        assert!(!ticket.is_used);
        assert_eq!(ticket.date_created.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn exactly_at_expiry_is_not_expired() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let ticket = ticket_created_at(created);
        assert!(!ticket.is_expired_at(created + Duration::minutes(30), 30));
    }

    #[test]
    fn one_second_past_expiry_is_expired() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let ticket = ticket_created_at(created);
        assert!(ticket.is_expired_at(created + Duration::minutes(30) + Duration::seconds(1), 30));
    }

    #[test]
    fn used_ticket_is_never_valid() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut ticket = ticket_created_at(created);
        assert!(ticket.is_valid_at(created, 30));
        ticket.is_used = true;
        assert!(!ticket.is_valid_at(created, 30));
    }

    proptest! {
        #[test]
        fn expired_iff_elapsed_exceeds_ttl(elapsed_secs in 0i64..(3 * 24 * 3600), expiry_minutes in 1i32..(24 * 60)) {
            let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let ticket = ticket_created_at(created);
            let now = created + Duration::seconds(elapsed_secs);
            prop_assert_eq!(ticket.is_expired_at(now, expiry_minutes), elapsed_secs > i64::from(expiry_minutes) * 60);
        }
    }

    #[test]
    fn reset_request_requires_an_email() {
        let request = PasswordResetRequest {
            email: "not-an-email".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn complete_request_requires_a_long_enough_password() {
        let request = PasswordResetCompleteRequest {
            ticket_id: Uuid::new_v4(),
            new_password: "short".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
