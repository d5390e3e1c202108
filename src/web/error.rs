use crate::middleware::ClientCtx;
use actix_web::body::{BoxBody, EitherBody};
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, header::HeaderValue, StatusCode};
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{HttpMessage, Result};
use askama_actix::Template;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    client: ClientCtx,
    status: u16,
    title: &'static str,
    message: &'static str,
}

/// Title and explanation shown for a status.
fn describe(status: StatusCode) -> (&'static str, &'static str) {
    match status {
        StatusCode::BAD_REQUEST => ("Bad request", "The request could not be understood."),
        StatusCode::FORBIDDEN => (
            "CSRF verification failed",
            "The form was submitted without a valid security token. Reload the page and try again.",
        ),
        StatusCode::NOT_FOUND => ("Page not found", "The page you requested does not exist."),
        _ => ("Server error", "Something went wrong on our side. Please try again later."),
    }
}

pub fn error_handlers<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::BAD_REQUEST, error_document)
        .handler(StatusCode::FORBIDDEN, error_document)
        .handler(StatusCode::NOT_FOUND, error_document)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, error_document)
}

pub fn error_document<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    let status = res.status();
    let (title, message) = describe(status);
    let client = ClientCtx::get_client_ctx(&mut res.request().extensions_mut());

    let body = match (ErrorTemplate {
        client,
        status: status.as_u16(),
        title,
        message,
    })
    .render()
    {
        Ok(html) => BoxBody::new(html),
        Err(e) => {
            log::error!("error_document: {}", e);
            BoxBody::new(format!("{} {}", status.as_u16(), title))
        }
    };
    let mut res: ServiceResponse<EitherBody<B>> =
        res.map_body(|_, _| EitherBody::<B, BoxBody>::right(body));

    // Headers must be manually set because Actix-Web renders no content by default.
    let headers = res.response_mut().headers_mut();
    // Web document
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    // Proxies love to cache error pages permanently. Explicitly say not to do that.
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(ErrorHandlerResponse::Response(res))
}
