pub mod audit_event;
pub mod content_block;
pub mod logon_failure;
pub mod password_reset_ticket;
pub mod postgres_repository;
pub mod session;
pub mod settings;
pub mod user;
