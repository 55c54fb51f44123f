pub mod auth;
pub mod media;
pub mod response;
pub mod tweet;
pub mod user;
