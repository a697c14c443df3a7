pub mod audit_event;
pub mod content_block;
pub mod health;
pub mod login;
pub mod logon_failure;
pub mod password_reset_ticket;
pub mod session;
pub mod settings;
pub mod user;
