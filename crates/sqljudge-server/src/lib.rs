pub mod cache;
pub mod config;
pub mod fixtures;
pub mod handlers;
pub mod security;
pub mod server;
