mod auth;
mod files;
