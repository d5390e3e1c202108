use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;

/// Request-scoped failures. Bodies are replaced by the error pages in
/// `web::error`, so the messages here only reach the logs.
#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    #[error("not found")]
    NotFound,
    #[error("login required for {next}")]
    LoginRequired { next: String },
    #[error("csrf token missing or incorrect")]
    Csrf,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("template error: {0}")]
    Template(#[from] askama_actix::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(argon2::password_hash::Error),
}

impl From<argon2::password_hash::Error> for BlogError {
    fn from(e: argon2::password_hash::Error) -> Self {
        BlogError::PasswordHash(e)
    }
}

impl ResponseError for BlogError {
    fn status_code(&self) -> StatusCode {
        match self {
            BlogError::NotFound => StatusCode::NOT_FOUND,
            BlogError::LoginRequired { .. } => StatusCode::FOUND,
            BlogError::Csrf => StatusCode::FORBIDDEN,
            BlogError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BlogError::Database(_)
            | BlogError::Template(_)
            | BlogError::Io(_)
            | BlogError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            BlogError::LoginRequired { next } => HttpResponse::Found()
                .append_header((header::LOCATION, login_url(next)))
                .finish(),
            BlogError::Database(_)
            | BlogError::Template(_)
            | BlogError::Io(_)
            | BlogError::PasswordHash(_) => {
                log::error!("{}", self);
                HttpResponse::build(self.status_code()).body(self.to_string())
            }
            _ => HttpResponse::build(self.status_code()).body(self.to_string()),
        }
    }
}

/// `/auth/login/?next=...` with `next` percent-encoded.
pub fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/login/?next={}", encoded)
}

/// Redirect helper shared by every handler that finishes with a 302.
pub fn redirect(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, location.as_ref()))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_required_redirects() {
        let res = BlogError::LoginRequired {
            next: "/posts/create/?a=1".to_owned(),
        }
        .error_response();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/auth/login/?next=%2Fposts%2Fcreate%2F%3Fa%3D1"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BlogError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(BlogError::Csrf.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            BlogError::Database(DbErr::Custom("x".to_owned())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
