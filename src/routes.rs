pub mod content_block;
pub mod error;
pub mod health;
pub mod login;
pub mod password_reset;
