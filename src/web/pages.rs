use crate::middleware::ClientCtx;
use actix_web::{get, Responder};
use askama_actix::{Template, TemplateToResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_about).service(view_rules);
}

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub client: ClientCtx,
}

#[derive(Template)]
#[template(path = "pages/rules.html")]
pub struct RulesTemplate {
    pub client: ClientCtx,
}

#[get("/pages/about/")]
pub async fn view_about(client: ClientCtx) -> impl Responder {
    AboutTemplate { client }.to_response()
}

#[get("/pages/rules/")]
pub async fn view_rules(client: ClientCtx) -> impl Responder {
    RulesTemplate { client }.to_response()
}
