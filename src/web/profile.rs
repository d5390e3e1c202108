use crate::error::{redirect, BlogError};
use crate::form::{FormErrors, ProfileForm};
use crate::middleware::ClientCtx;
use crate::orm::users;
use crate::paginator::{Page, PageQuery};
use crate::post::{PostForTemplate, Posts};
use crate::user::Users;
use actix_web::{get, post, web, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(edit_profile_get)
        .service(edit_profile_post)
        .service(view_profile);
}

#[derive(Template)]
#[template(path = "blog/profile.html")]
pub struct ProfileTemplate {
    pub client: ClientCtx,
    pub profile: users::Model,
    pub is_owner: bool,
    pub page: Page<PostForTemplate>,
}

impl ProfileTemplate {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.profile.first_name, self.profile.last_name)
            .trim()
            .to_owned()
    }

    pub fn joined(&self) -> String {
        self.profile.created_at.format("%d.%m.%Y").to_string()
    }
}

#[derive(Template)]
#[template(path = "blog/user.html")]
pub struct ProfileFormTemplate {
    pub client: ClientCtx,
    pub form: ProfileForm,
    pub errors: FormErrors,
}

#[get("/profile/{username}/")]
pub async fn view_profile(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, BlogError> {
    let profile = Users::new(db.get_ref())
        .find_by_username(&path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;
    let is_owner = client.is(profile.id);
    let page = Posts::new(db.get_ref())
        .profile_page(&profile, is_owner, Utc::now(), query.requested())
        .await?;

    Ok(ProfileTemplate {
        client,
        profile,
        is_owner,
        page,
    }
    .to_response())
}

#[get("/profile/edit/")]
pub async fn edit_profile_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<impl Responder, BlogError> {
    let user = client.require_user()?;
    let user = Users::new(db.get_ref())
        .find_by_id(user.id)
        .await?
        .ok_or(BlogError::NotFound)?;

    Ok(ProfileFormTemplate {
        client,
        form: ProfileForm::from_model(&user),
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/profile/edit/")]
pub async fn edit_profile_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Form<ProfileForm>,
) -> Result<impl Responder, BlogError> {
    let user = client.require_user()?;
    client.verify_csrf(&form.csrf_token)?;
    let form = form.into_inner();
    let users = Users::new(db.get_ref());
    let user = users
        .find_by_id(user.id)
        .await?
        .ok_or(BlogError::NotFound)?;

    let mut errors = match form.clean() {
        Ok(()) => FormErrors::default(),
        Err(errors) => errors,
    };
    if !errors.has("username") && users.username_taken(form.username.trim(), Some(user.id)).await? {
        errors.add("username", "A user with that username already exists.");
    }
    if !errors.is_empty() {
        return Ok(ProfileFormTemplate {
            client,
            form,
            errors,
        }
        .to_response());
    }

    let user = users.update_profile(user, &form).await?;
    Ok(redirect(format!("/profile/{}/", user.username)))
}
