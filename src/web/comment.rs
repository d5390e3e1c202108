use crate::auth::{AuthorOnly, Authorizer};
use crate::comment::Comments;
use crate::error::{redirect, BlogError};
use crate::form::{CommentForm, FormErrors};
use crate::middleware::ClientCtx;
use crate::orm::comments;
use crate::post::{PostForTemplate, Posts};
use crate::web::post::CsrfForm;
use actix_web::{get, post, web, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(add_comment_get)
        .service(add_comment_post)
        .service(edit_comment_get)
        .service(edit_comment_post)
        .service(delete_comment_get)
        .service(delete_comment_post);
}

/// Add, edit and delete-confirmation pages for a single comment.
#[derive(Template)]
#[template(path = "blog/comment.html")]
pub struct CommentTemplate {
    pub client: ClientCtx,
    pub post_id: i32,
    pub action: String,
    pub form: CommentForm,
    pub errors: FormErrors,
    pub confirm_delete: bool,
}

fn detail_url(post_id: i32) -> String {
    format!("/posts/{}/", post_id)
}

/// The post a new comment goes under. Posts the commenter cannot see do not exist for them.
async fn commentable_post(
    db: &DatabaseConnection,
    client: &ClientCtx,
    post_id: i32,
) -> Result<PostForTemplate, BlogError> {
    Posts::new(db)
        .find_for_template(post_id)
        .await?
        .filter(|post| post.is_visible_to(client.get_id(), Utc::now()))
        .ok_or(BlogError::NotFound)
}

/// Loads a comment for mutation. `Err` carries the response for missing rows
/// and for clients that are not the author.
async fn own_comment(
    db: &DatabaseConnection,
    client: &ClientCtx,
    post_id: i32,
    comment_id: i32,
) -> Result<Result<comments::Model, HttpResponse>, BlogError> {
    Posts::new(db)
        .find(post_id)
        .await?
        .ok_or(BlogError::NotFound)?;
    let comment = Comments::new(db)
        .find_in_post(post_id, comment_id)
        .await?
        .ok_or(BlogError::NotFound)?;

    if AuthorOnly.can_mutate(&comment, client.get_id()) {
        Ok(Ok(comment))
    } else {
        Ok(Err(redirect(detail_url(post_id))))
    }
}

#[get("/posts/{post_id}/comment/")]
pub async fn add_comment_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, BlogError> {
    client.require_user()?;
    let post = commentable_post(db.get_ref(), &client, path.into_inner()).await?;

    Ok(CommentTemplate {
        client,
        post_id: post.id,
        action: format!("/posts/{}/comment/", post.id),
        form: CommentForm::default(),
        errors: FormErrors::default(),
        confirm_delete: false,
    }
    .to_response())
}

#[post("/posts/{post_id}/comment/")]
pub async fn add_comment_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<CommentForm>,
) -> Result<impl Responder, BlogError> {
    let user = client.require_user()?;
    client.verify_csrf(&form.csrf_token)?;
    let post = commentable_post(db.get_ref(), &client, path.into_inner()).await?;

    let text = match form.clean() {
        Ok(text) => text,
        Err(errors) => {
            return Ok(CommentTemplate {
                client,
                post_id: post.id,
                action: format!("/posts/{}/comment/", post.id),
                form: form.into_inner(),
                errors,
                confirm_delete: false,
            }
            .to_response())
        }
    };

    let txn = db.begin().await?;
    Comments::new(&txn)
        .create(post.id, user.id, text, Utc::now())
        .await?;
    txn.commit().await?;

    Ok(redirect(detail_url(post.id)))
}

#[get("/posts/{post_id}/edit_comment/{comment_id}/")]
pub async fn edit_comment_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
) -> Result<impl Responder, BlogError> {
    client.require_user()?;
    let (post_id, comment_id) = path.into_inner();
    let comment = match own_comment(db.get_ref(), &client, post_id, comment_id).await? {
        Ok(comment) => comment,
        Err(res) => return Ok(res),
    };

    Ok(CommentTemplate {
        client,
        post_id,
        action: format!("/posts/{}/edit_comment/{}/", post_id, comment.id),
        form: CommentForm {
            text: comment.text,
            csrf_token: String::new(),
        },
        errors: FormErrors::default(),
        confirm_delete: false,
    }
    .to_response())
}

#[post("/posts/{post_id}/edit_comment/{comment_id}/")]
pub async fn edit_comment_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
    form: web::Form<CommentForm>,
) -> Result<impl Responder, BlogError> {
    client.require_user()?;
    let (post_id, comment_id) = path.into_inner();
    let comment = match own_comment(db.get_ref(), &client, post_id, comment_id).await? {
        Ok(comment) => comment,
        Err(res) => return Ok(res),
    };
    client.verify_csrf(&form.csrf_token)?;

    match form.clean() {
        Ok(text) => {
            Comments::new(db.get_ref()).update_text(comment, text).await?;
            Ok(redirect(detail_url(post_id)))
        }
        Err(errors) => Ok(CommentTemplate {
            client,
            post_id,
            action: format!("/posts/{}/edit_comment/{}/", post_id, comment.id),
            form: form.into_inner(),
            errors,
            confirm_delete: false,
        }
        .to_response()),
    }
}

#[get("/posts/{post_id}/delete_comment/{comment_id}/")]
pub async fn delete_comment_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
) -> Result<impl Responder, BlogError> {
    client.require_user()?;
    let (post_id, comment_id) = path.into_inner();
    let comment = match own_comment(db.get_ref(), &client, post_id, comment_id).await? {
        Ok(comment) => comment,
        Err(res) => return Ok(res),
    };

    Ok(CommentTemplate {
        client,
        post_id,
        action: format!("/posts/{}/delete_comment/{}/", post_id, comment.id),
        form: CommentForm {
            text: comment.text,
            csrf_token: String::new(),
        },
        errors: FormErrors::default(),
        confirm_delete: true,
    }
    .to_response())
}

#[post("/posts/{post_id}/delete_comment/{comment_id}/")]
pub async fn delete_comment_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i32, i32)>,
    form: web::Form<CsrfForm>,
) -> Result<impl Responder, BlogError> {
    client.require_user()?;
    let (post_id, comment_id) = path.into_inner();
    let comment = match own_comment(db.get_ref(), &client, post_id, comment_id).await? {
        Ok(comment) => comment,
        Err(res) => return Ok(res),
    };
    client.verify_csrf(&form.csrf_token)?;

    let txn = db.begin().await?;
    Comments::new(&txn).delete(comment).await?;
    txn.commit().await?;

    Ok(redirect(detail_url(post_id)))
}
