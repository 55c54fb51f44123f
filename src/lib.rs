pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use db::{CredentialStore, TweetStore};
use services::{object_store::ObjectStore, tokens::TokenService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn CredentialStore>,
    pub tweets: Arc<dyn TweetStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub tokens: Arc<TokenService>,
    /// Login rate limiting is off when Redis is not configured.
    pub redis: Option<redis::aio::MultiplexedConnection>,
}
