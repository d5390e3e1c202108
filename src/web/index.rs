use crate::error::BlogError;
use crate::middleware::ClientCtx;
use crate::paginator::{Page, PageQuery};
use crate::post::{PostForTemplate, Posts};
use actix_web::{get, web, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

#[derive(Template)]
#[template(path = "blog/index.html")]
pub struct IndexTemplate {
    pub client: ClientCtx,
    pub page: Page<PostForTemplate>,
}

#[get("/")]
pub async fn view_index(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, BlogError> {
    let page = Posts::new(db.get_ref())
        .public_page(Utc::now(), query.requested())
        .await?;

    Ok(IndexTemplate { client, page }.to_response())
}
