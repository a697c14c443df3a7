use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::user::User;
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, Salt, SaltString};
use std::sync::LazyLock;
use uuid::Uuid;

/// A real Argon2 hash generated once, verified against when the email is unknown
/// so a missing account costs the same time as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"dummy-never-matches", Salt::from(&salt))
        .ok()
        .map(|hash| hash.to_string())
});

const USER_COLUMNS: &str = r#"
    u.id, u.email, u.password_hash, u.salt, u.first_name, u.last_name, u.is_deactivated,
    (a.id IS NOT NULL) AS is_administrator
"#;

#[async_trait::async_trait]
pub trait UserRepository {
    /// Case-insensitive lookup.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError>;
    async fn update_user_password(&self, user_id: &Uuid, password: &str) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl UserRepository for PostgresRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            LEFT JOIN administrators a ON a.id = u.id
            WHERE lower(u.email) = lower($1)
            "#
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            LEFT JOIN administrators a ON a.id = u.id
            WHERE u.id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user_password(&self, user_id: &Uuid, password: &str) -> Result<(), AppError> {
        let (salt, password_hash) = password_hash(password)?;

        let result = sqlx::query("UPDATE users SET salt = $1, password_hash = $2 WHERE id = $3")
            .bind(&salt)
            .bind(&password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        Ok(())
    }
}

/// Check a submitted password against the user's stored hash.
pub fn verify_password(user: &User, password: &str) -> Result<(), AppError> {
    let password_hash = PasswordHash::new(&user.password_hash).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &password_hash)
        .map_err(|_| AppError::InvalidCredentials)?;

    Ok(())
}

/// Throwaway verification to equalise timing for unknown accounts.
pub fn dummy_verify(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref()
        && let Ok(hash) = PasswordHash::new(hash)
    {
        let _ = Argon2::default().verify_password(password.as_bytes(), &hash);
    }
}

/// Returns `(salt, phc_hash)`.
pub(crate) fn password_hash(password: &str) -> Result<(String, String), AppError> {
    let salt_string = SaltString::generate(&mut OsRng);
    let salt = Salt::from(&salt_string);
    let password_hash = PasswordHash::generate(Argon2::default(), password.as_bytes(), salt)?;

    Ok((salt.to_string(), password_hash.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_postgres_user, postgres_repository, sample_user};

    #[test]
    fn verify_password_accepts_the_right_password() {
        let user = sample_user("jane@example.com", "correct horse", false);
        assert!(verify_password(&user, "correct horse").is_ok());
    }

    #[test]
    fn verify_password_rejects_the_wrong_password() {
        let user = sample_user("jane@example.com", "correct horse", false);
        assert!(matches!(verify_password(&user, "battery staple"), Err(AppError::InvalidCredentials)));
    }

    #[test]
    fn corrupt_stored_hash_is_an_internal_error() {
        let mut user = sample_user("jane@example.com", "correct horse", false);
        user.password_hash = "not-a-phc-string".to_string();
        assert!(matches!(verify_password(&user, "correct horse"), Err(AppError::PasswordHash { .. })));
    }

    #[test]
    fn dummy_verify_does_not_panic() {
        dummy_verify("anything");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_get_user_by_email_is_case_insensitive() {
        let repo = postgres_repository().await;
        let user = insert_postgres_user(&repo, "case-lookup", false).await;

        let found = repo
            .get_user_by_email(&format!("  {}  ", user.email.to_uppercase()))
            .await
            .unwrap()
            .expect("lookup ignores case and surrounding whitespace");

        assert_eq!(found.id, user.id);
        assert!(!found.is_administrator);
        assert!(repo.get_user_by_email("nobody-here@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_update_user_password_against_postgres() {
        let repo = postgres_repository().await;
        let user = insert_postgres_user(&repo, "password-update", false).await;

        repo.update_user_password(&user.id, "brand-new-password").await.unwrap();

        let stored = repo.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert!(verify_password(&stored, "brand-new-password").is_ok());
        assert!(matches!(verify_password(&stored, "old-password"), Err(AppError::InvalidCredentials)));
        assert!(matches!(
            repo.update_user_password(&Uuid::new_v4(), "whatever-password").await,
            Err(AppError::NotFound(_))
        ));
    }
}
