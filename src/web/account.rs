use crate::config::Config;
use crate::error::{redirect, BlogError};
use crate::form::{
    FormErrors, LoginForm, PasswordChangeForm, PasswordResetForm, RegistrationForm,
    SetPasswordForm,
};
use crate::mail::Outbox;
use crate::middleware::ClientCtx;
use crate::password_reset;
use crate::session::{new_session, remove_session, remove_sessions_for_user, TOKEN_KEY};
use crate::user::{hash_password, verify_password, ClientUser, Users};
use actix_session::Session;
use actix_web::{get, post, web, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_login)
        .service(post_login)
        .service(view_logout)
        .service(view_registration)
        .service(post_registration)
        .service(view_password_change)
        .service(post_password_change)
        .service(view_password_reset)
        .service(post_password_reset)
        .service(view_password_reset_confirm)
        .service(post_password_reset_confirm);
}

#[derive(Template)]
#[template(path = "registration/login.html")]
pub struct LoginTemplate {
    pub client: ClientCtx,
    pub username: String,
    pub next: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "registration/registration_form.html")]
pub struct RegistrationTemplate {
    pub client: ClientCtx,
    pub form: RegistrationForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "registration/password_change_form.html")]
pub struct PasswordChangeTemplate {
    pub client: ClientCtx,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "registration/password_reset_form.html")]
pub struct PasswordResetTemplate {
    pub client: ClientCtx,
    pub email: String,
}

#[derive(Template)]
#[template(path = "registration/password_reset_confirm.html")]
pub struct PasswordResetConfirmTemplate {
    pub client: ClientCtx,
    pub token: String,
    pub errors: FormErrors,
}

/// A one-off notice page.
#[derive(Template)]
#[template(path = "message.html")]
pub struct MessageTemplate {
    pub client: ClientCtx,
    pub title: &'static str,
    pub message: &'static str,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Only local paths are followed after login.
fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(next) if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') => {
            next.to_owned()
        }
        _ => "/".to_owned(),
    }
}

#[get("/auth/login/")]
pub async fn view_login(client: ClientCtx, query: web::Query<NextQuery>) -> impl Responder {
    LoginTemplate {
        client,
        username: String::new(),
        next: safe_next(query.next.as_deref()),
        error: String::new(),
    }
    .to_response()
}

#[post("/auth/login/")]
pub async fn post_login(
    client: ClientCtx,
    session: Session,
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    form: web::Form<LoginForm>,
) -> Result<impl Responder, BlogError> {
    client.verify_csrf(&form.csrf_token)?;
    let next = safe_next(form.next.as_deref());

    let user = Users::new(db.get_ref())
        .find_by_username(form.username.trim())
        .await?
        .filter(|user| verify_password(&user.password, &form.password));

    let user = match user {
        Some(user) => user,
        None => {
            return Ok(LoginTemplate {
                client,
                username: form.username.to_owned(),
                next,
                error: "Please enter a correct username and password. Note that both fields may be case-sensitive.".to_owned(),
            }
            .to_response())
        }
    };

    let token = new_session(db.get_ref(), user.id, Utc::now(), config.session_time).await?;
    client.login(&session, ClientUser::from(&user), &token.to_string())?;
    log::info!("post_login: {} logged in", user.username);

    Ok(redirect(next))
}

#[get("/auth/logout/")]
pub async fn view_logout(
    client: ClientCtx,
    session: Session,
    db: web::Data<DatabaseConnection>,
) -> Result<impl Responder, BlogError> {
    if let Ok(Some(token)) = session.get::<String>(TOKEN_KEY) {
        remove_session(db.get_ref(), &token).await?;
    }
    client.logout(&session);

    Ok(MessageTemplate {
        client,
        title: "Logged out",
        message: "You have been logged out. Come back soon!",
    }
    .to_response())
}

#[get("/auth/registration/")]
pub async fn view_registration(client: ClientCtx) -> impl Responder {
    RegistrationTemplate {
        client,
        form: RegistrationForm::default(),
        errors: FormErrors::default(),
    }
    .to_response()
}

#[post("/auth/registration/")]
pub async fn post_registration(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Form<RegistrationForm>,
) -> Result<impl Responder, BlogError> {
    client.verify_csrf(&form.csrf_token)?;
    let mut form = form.into_inner();
    let users = Users::new(db.get_ref());

    let mut errors = match form.clean() {
        Ok(()) => FormErrors::default(),
        Err(errors) => errors,
    };
    if !errors.has("username") && users.username_taken(form.username.trim(), None).await? {
        errors.add("username", "A user with that username already exists.");
    }
    if !errors.is_empty() {
        form.password1.clear();
        form.password2.clear();
        return Ok(RegistrationTemplate {
            client,
            form,
            errors,
        }
        .to_response());
    }

    let user = users
        .create(&form, hash_password(&form.password1)?, Utc::now())
        .await?;
    log::info!("post_registration: created user {}", user.username);

    Ok(redirect("/"))
}

#[get("/auth/password_change/")]
pub async fn view_password_change(client: ClientCtx) -> Result<impl Responder, BlogError> {
    client.require_user()?;
    Ok(PasswordChangeTemplate {
        client,
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/auth/password_change/")]
pub async fn post_password_change(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Form<PasswordChangeForm>,
) -> Result<impl Responder, BlogError> {
    let user = client.require_user()?;
    client.verify_csrf(&form.csrf_token)?;
    let users = Users::new(db.get_ref());
    let stored = users
        .find_by_id(user.id)
        .await?
        .ok_or(BlogError::NotFound)?;

    let mut errors = match form.clean(&user.username) {
        Ok(()) => FormErrors::default(),
        Err(errors) => errors,
    };
    if !verify_password(&stored.password, &form.old_password) {
        errors.add(
            "old_password",
            "Your old password was entered incorrectly. Please enter it again.",
        );
    }
    if !errors.is_empty() {
        return Ok(PasswordChangeTemplate { client, errors }.to_response());
    }

    users
        .set_password(user.id, hash_password(&form.new_password1)?)
        .await?;

    Ok(MessageTemplate {
        client,
        title: "Password changed",
        message: "Your password was changed.",
    }
    .to_response())
}

#[get("/auth/password_reset/")]
pub async fn view_password_reset(client: ClientCtx) -> impl Responder {
    PasswordResetTemplate {
        client,
        email: String::new(),
    }
    .to_response()
}

/// Answers the same way whether or not the address is known.
#[post("/auth/password_reset/")]
pub async fn post_password_reset(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    outbox: web::Data<Outbox>,
    form: web::Form<PasswordResetForm>,
) -> Result<impl Responder, BlogError> {
    client.verify_csrf(&form.csrf_token)?;
    let now = Utc::now();

    for user in Users::new(db.get_ref()).find_by_email(&form.email).await? {
        let token =
            password_reset::create_reset(db.get_ref(), user.id, now, config.password_reset_time)
                .await?;
        let body = format!(
            "You're receiving this email because you requested a password reset for your user account \"{}\".\n\n\
             Please go to the following page and choose a new password:\n\n{}/auth/reset/{}/\n",
            user.username, config.site_url, token
        );
        outbox.send(&user.email, "Password reset", &body, now)?;
    }

    Ok(MessageTemplate {
        client,
        title: "Password reset sent",
        message: "We've emailed you instructions for setting your password, if an account exists with the email you entered.",
    }
    .to_response())
}

fn invalid_reset_link(client: ClientCtx) -> actix_web::HttpResponse {
    MessageTemplate {
        client,
        title: "Password reset unsuccessful",
        message: "The password reset link was invalid, possibly because it has already been used. Please request a new password reset.",
    }
    .to_response()
}

#[get("/auth/reset/{token}/")]
pub async fn view_password_reset_confirm(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<impl Responder, BlogError> {
    let token = path.into_inner();
    if password_reset::find_valid(db.get_ref(), &token, Utc::now())
        .await?
        .is_none()
    {
        return Ok(invalid_reset_link(client));
    }

    Ok(PasswordResetConfirmTemplate {
        client,
        token,
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/auth/reset/{token}/")]
pub async fn post_password_reset_confirm(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    form: web::Form<SetPasswordForm>,
) -> Result<impl Responder, BlogError> {
    client.verify_csrf(&form.csrf_token)?;
    let token = path.into_inner();
    let users = Users::new(db.get_ref());

    let reset = match password_reset::find_valid(db.get_ref(), &token, Utc::now()).await? {
        Some(reset) => reset,
        None => return Ok(invalid_reset_link(client)),
    };
    let user = match users.find_by_id(reset.user_id).await? {
        Some(user) => user,
        None => return Ok(invalid_reset_link(client)),
    };

    if let Err(errors) = form.clean(&user.username) {
        return Ok(PasswordResetConfirmTemplate {
            client,
            token,
            errors,
        }
        .to_response());
    }
    if !password_reset::consume(db.get_ref(), &token).await? {
        return Ok(invalid_reset_link(client));
    }

    users
        .set_password(user.id, hash_password(&form.new_password1)?)
        .await?;
    let revoked = remove_sessions_for_user(db.get_ref(), user.id).await?;
    log::info!(
        "post_password_reset_confirm: reset password for {}, revoked {} sessions",
        user.username,
        revoked
    );

    Ok(MessageTemplate {
        client,
        title: "Password reset complete",
        message: "Your password has been set. You may go ahead and log in now.",
    }
    .to_response())
}
