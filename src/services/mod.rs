pub mod auth;
pub mod media;
pub mod metrics;
pub mod object_store;
pub mod password;
pub mod tokens;
pub mod tweets;
pub mod uploads;
