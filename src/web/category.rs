use crate::category::Categories;
use crate::error::BlogError;
use crate::middleware::ClientCtx;
use crate::orm::categories;
use crate::paginator::{Page, PageQuery};
use crate::post::{PostForTemplate, Posts};
use actix_web::{get, web, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_category);
}

#[derive(Template)]
#[template(path = "blog/category.html")]
pub struct CategoryTemplate {
    pub client: ClientCtx,
    pub category: categories::Model,
    pub page: Page<PostForTemplate>,
}

#[get("/category/{slug}/")]
pub async fn view_category(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, BlogError> {
    let category = Categories::new(db.get_ref())
        .find_published_by_slug(&path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;
    let page = Posts::new(db.get_ref())
        .category_page(&category, Utc::now(), query.requested())
        .await?;

    Ok(CategoryTemplate {
        client,
        category,
        page,
    }
    .to_response())
}
