pub mod categories;
pub mod comments;
pub mod locations;
pub mod password_resets;
pub mod posts;
pub mod sessions;
pub mod users;
