pub mod account;
pub mod admin;
pub mod category;
pub mod comment;
pub mod error;
pub mod index;
pub mod pages;
pub mod post;
pub mod profile;

/// Configures the web app
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Literal segments must be registered ahead of the `{id}` and `{username}` patterns.
    index::configure(conf);
    category::configure(conf);
    post::configure(conf);
    comment::configure(conf);
    profile::configure(conf);
    account::configure(conf);
    pages::configure(conf);
    admin::configure(conf);
}
