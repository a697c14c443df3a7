use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// A single claim handed back by an external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

/// What the identity provider told us about the person signing in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLoginInfo {
    pub provider: String,
    #[serde(default)]
    pub claims: Vec<Claim>,
}

impl ExternalLoginInfo {
    /// The first non-blank claim whose type ends with `emailaddress`.
    pub fn email(&self) -> Option<&str> {
        self.claims
            .iter()
            .find(|claim| claim.claim_type.to_ascii_lowercase().ends_with("emailaddress"))
            .map(|claim| claim.value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// A session was established; `redirect_to` is where the browser goes next.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub redirect_to: String,
}
