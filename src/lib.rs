pub mod auth;
pub mod category;
pub mod comment;
pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod location;
pub mod mail;
pub mod media;
pub mod middleware;
pub mod orm;
pub mod paginator;
pub mod password_reset;
pub mod post;
pub mod session;
pub mod user;
pub mod visibility;
pub mod web;

pub use config::Config;
pub use error::BlogError;
