pub mod auth;
pub mod file;
pub mod transcript;
