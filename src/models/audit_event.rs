use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Event names written to `audit_events.event`.
pub mod audit_events {
    pub const LOGIN_SUCCESS: &str = "login_success";
    pub const LOGIN_FAILED: &str = "login_failed";
    pub const LOGIN_DEACTIVATED: &str = "login_deactivated";
    pub const EXTERNAL_LOGIN_SUCCESS: &str = "external_login_success";
    pub const EXTERNAL_LOGIN_FAILED: &str = "external_login_failed";
    pub const LOGOUT: &str = "logout";

    pub const PASSWORD_RESET_REQUESTED: &str = "password_reset_requested";
    pub const PASSWORD_RESET_COMPLETED: &str = "password_reset_completed";
    pub const PASSWORD_RESET_FAILED: &str = "password_reset_failed";
}

/// An audit entry waiting to be written.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub user_id: Option<Uuid>,
    pub event: &'static str,
    pub success: bool,
    pub item_type: Option<&'static str>,
    pub item_id: Option<Uuid>,
    pub item_data: Option<JsonValue>,
    pub user_ip: Option<String>,
}

impl NewAuditEvent {
    pub fn success(event: &'static str) -> Self {
        Self::new(event, true)
    }

    pub fn failure(event: &'static str) -> Self {
        Self::new(event, false)
    }

    fn new(event: &'static str, success: bool) -> Self {
        Self {
            user_id: None,
            event,
            success,
            item_type: None,
            item_id: None,
            item_data: None,
            user_ip: None,
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn item(mut self, item_type: &'static str, item_id: Uuid) -> Self {
        self.item_type = Some(item_type);
        self.item_id = Some(item_id);
        self
    }

    pub fn data(mut self, data: JsonValue) -> Self {
        self.item_data = Some(data);
        self
    }

    pub fn ip(mut self, ip: Option<&str>) -> Self {
        self.user_ip = ip.map(str::to_string);
        self
    }
}
