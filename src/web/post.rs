use crate::auth::{AuthorOnly, Authorizer};
use crate::category::Categories;
use crate::comment::{CommentForTemplate, Comments};
use crate::error::{redirect, BlogError};
use crate::form::{CommentForm, FormErrors, PostForm, PostInput};
use crate::location::Locations;
use crate::media::{image_extension, MediaError, MediaStore, MAX_IMAGE_SIZE};
use crate::middleware::ClientCtx;
use crate::orm::posts;
use crate::post::{ImageChange, PostForTemplate, Posts};
use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use futures_util::TryStreamExt;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;

/// Text fields never need more than this.
const MAX_TEXT_FIELD_SIZE: usize = 256 * 1024;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_post_get)
        .service(create_post_post)
        .service(edit_post_get)
        .service(edit_post_post)
        .service(delete_post_get)
        .service(delete_post_post)
        .service(view_post);
}

/// One `<option>` of a select box.
#[derive(Clone, Debug)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "blog/create.html")]
pub struct PostFormTemplate {
    pub client: ClientCtx,
    pub action: String,
    pub editing: bool,
    pub form: PostForm,
    pub errors: FormErrors,
    pub categories: Vec<Choice>,
    pub locations: Vec<Choice>,
    pub image_url: Option<String>,
}

#[derive(Template)]
#[template(path = "blog/delete.html")]
pub struct PostDeleteTemplate {
    pub client: ClientCtx,
    pub post: PostForTemplate,
}

#[derive(Template)]
#[template(path = "blog/detail.html")]
pub struct PostDetailTemplate {
    pub client: ClientCtx,
    pub post: PostForTemplate,
    pub comments: Vec<CommentForTemplate>,
    pub form: CommentForm,
    pub errors: FormErrors,
}

#[derive(Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: String,
}

/// An image part of the multipart body.
struct Upload {
    filename: String,
    data: Vec<u8>,
    too_large: bool,
}

/// Drains the multipart body into a [`PostForm`] and the optional image.
async fn read_post_form(mut multipart: Multipart) -> Result<(PostForm, Option<Upload>), BlogError> {
    let mut form = PostForm::default();
    let mut upload = None;

    while let Some(mut field) = multipart
        .try_next()
        .await
        .map_err(|e| BlogError::BadRequest(e.to_string()))?
    {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_owned();
        let filename = disposition.get_filename().map(str::to_owned);
        let limit = if filename.is_some() {
            MAX_IMAGE_SIZE
        } else {
            MAX_TEXT_FIELD_SIZE
        };

        let mut data: Vec<u8> = Vec::new();
        let mut too_large = false;
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| BlogError::BadRequest(e.to_string()))?
        {
            // Keep draining so the client sees a response instead of a reset.
            if too_large || data.len() + chunk.len() > limit {
                too_large = true;
                continue;
            }
            data.extend_from_slice(&chunk);
        }

        match (name.as_str(), filename) {
            ("image", Some(filename)) => {
                // Browsers send an empty part when no file was picked.
                if !filename.is_empty() && (too_large || !data.is_empty()) {
                    upload = Some(Upload {
                        filename,
                        data,
                        too_large,
                    });
                }
            }
            (_, Some(_)) => {}
            (name, None) => {
                if too_large {
                    return Err(BlogError::BadRequest(format!("field {} is too large", name)));
                }
                form.set_field(name, String::from_utf8_lossy(&data).into_owned());
            }
        }
    }

    Ok((form, upload))
}

/// Checks an upload without writing it anywhere.
fn check_upload(upload: &Upload) -> Result<(), MediaError> {
    image_extension(&upload.filename)?;
    if upload.too_large {
        return Err(MediaError::TooLarge);
    }
    Ok(())
}

async fn category_choices(db: &DatabaseConnection, selected: &str) -> Result<Vec<Choice>, BlogError> {
    Ok(Categories::new(db)
        .all()
        .await?
        .into_iter()
        .map(|c| {
            let value = c.id.to_string();
            Choice {
                selected: value == selected.trim(),
                value,
                label: c.title,
            }
        })
        .collect())
}

async fn location_choices(db: &DatabaseConnection, selected: &str) -> Result<Vec<Choice>, BlogError> {
    Ok(Locations::new(db)
        .all()
        .await?
        .into_iter()
        .map(|l| {
            let value = l.id.to_string();
            Choice {
                selected: value == selected.trim(),
                value,
                label: l.name,
            }
        })
        .collect())
}

async fn render_post_form(
    client: ClientCtx,
    db: &DatabaseConnection,
    post: Option<&posts::Model>,
    form: PostForm,
    errors: FormErrors,
) -> Result<HttpResponse, BlogError> {
    let (action, image_url) = match post {
        Some(post) => (
            format!("/posts/{}/edit/", post.id),
            post.image.as_deref().map(crate::media::url_for),
        ),
        None => ("/posts/create/".to_owned(), None),
    };

    Ok(PostFormTemplate {
        client,
        action,
        editing: post.is_some(),
        categories: category_choices(db, &form.category).await?,
        locations: location_choices(db, &form.location).await?,
        form,
        errors,
        image_url,
    }
    .to_response())
}

/// Cleans the form and resolves its references. Referenced rows must exist.
async fn clean_post_form(
    db: &DatabaseConnection,
    form: &PostForm,
    upload: Option<&Upload>,
    is_new: bool,
) -> Result<Result<PostInput, FormErrors>, BlogError> {
    let (input, mut errors) = match form.clean(Utc::now(), is_new) {
        Ok(input) => (Some(input), FormErrors::default()),
        Err(errors) => (None, errors),
    };

    if let Some(input) = &input {
        if let Some(id) = input.category_id {
            if Categories::new(db).find(id).await?.is_none() {
                errors.add("category", "Select a valid choice.");
            }
        }
        if let Some(id) = input.location_id {
            if Locations::new(db).find(id).await?.is_none() {
                errors.add("location", "Select a valid choice.");
            }
        }
    }
    if let Some(Err(e)) = upload.map(check_upload) {
        errors.add("image", e.to_string());
    }

    Ok(match input {
        Some(input) if errors.is_empty() => Ok(input),
        _ => Err(errors),
    })
}

fn store_upload(media: &MediaStore, upload: &Upload) -> Result<String, BlogError> {
    media.store_image(&upload.filename, &upload.data).map_err(|e| match e {
        MediaError::Io(e) => BlogError::Io(e),
        e => BlogError::BadRequest(e.to_string()),
    })
}

#[get("/posts/create/")]
pub async fn create_post_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<impl Responder, BlogError> {
    client.require_user()?;
    render_post_form(
        client,
        db.get_ref(),
        None,
        PostForm::new_at(Utc::now()),
        FormErrors::default(),
    )
    .await
}

#[post("/posts/create/")]
pub async fn create_post_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    media: web::Data<MediaStore>,
    multipart: Multipart,
) -> Result<impl Responder, BlogError> {
    let user = client.require_user()?;
    let (form, upload) = read_post_form(multipart).await?;
    client.verify_csrf(&form.csrf_token)?;

    let input = match clean_post_form(db.get_ref(), &form, upload.as_ref(), true).await? {
        Ok(input) => input,
        Err(errors) => return render_post_form(client, db.get_ref(), None, form, errors).await,
    };
    let image = match &upload {
        Some(upload) => Some(store_upload(&media, upload)?),
        None => None,
    };

    let post = Posts::new(db.get_ref())
        .create(user.id, input, image, Utc::now())
        .await?;
    log::info!("create_post: {} created post {}", user.username, post.id);

    Ok(redirect(format!("/profile/{}/", user.username)))
}

#[get("/posts/{post_id}/")]
pub async fn view_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, BlogError> {
    let post = Posts::new(db.get_ref())
        .find_for_template(path.into_inner())
        .await?
        .filter(|post| post.is_visible_to(client.get_id(), Utc::now()))
        .ok_or(BlogError::NotFound)?;
    let comments = Comments::new(db.get_ref()).for_post(post.id).await?;

    Ok(PostDetailTemplate {
        client,
        post,
        comments,
        form: CommentForm::default(),
        errors: FormErrors::default(),
    }
    .to_response())
}

#[get("/posts/{post_id}/edit/")]
pub async fn edit_post_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, BlogError> {
    client.require_user()?;
    let post = Posts::new(db.get_ref())
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;
    if !AuthorOnly.can_mutate(&post, client.get_id()) {
        return Ok(redirect(format!("/posts/{}/", post.id)));
    }

    let form = PostForm::from_model(&post);
    render_post_form(client, db.get_ref(), Some(&post), form, FormErrors::default()).await
}

#[post("/posts/{post_id}/edit/")]
pub async fn edit_post_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    media: web::Data<MediaStore>,
    path: web::Path<i32>,
    multipart: Multipart,
) -> Result<impl Responder, BlogError> {
    client.require_user()?;
    let posts = Posts::new(db.get_ref());
    let post = posts
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;
    if !AuthorOnly.can_mutate(&post, client.get_id()) {
        return Ok(redirect(format!("/posts/{}/", post.id)));
    }

    let (form, upload) = read_post_form(multipart).await?;
    client.verify_csrf(&form.csrf_token)?;

    let input = match clean_post_form(db.get_ref(), &form, upload.as_ref(), false).await? {
        Ok(input) => input,
        Err(errors) => {
            return render_post_form(client, db.get_ref(), Some(&post), form, errors).await
        }
    };
    let image = match (&upload, form.clear_image) {
        (Some(upload), _) => ImageChange::Replace(store_upload(&media, upload)?),
        (None, true) => ImageChange::Clear,
        (None, false) => ImageChange::Keep,
    };

    let post = posts.update(post, input, image, Utc::now()).await?;
    Ok(redirect(format!("/posts/{}/", post.id)))
}

#[get("/posts/{post_id}/delete/")]
pub async fn delete_post_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, BlogError> {
    let post = Posts::new(db.get_ref())
        .find_for_template(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;
    if !AuthorOnly.can_mutate(&post, client.get_id()) {
        return Ok(redirect(post.url()));
    }

    Ok(PostDeleteTemplate { client, post }.to_response())
}

#[post("/posts/{post_id}/delete/")]
pub async fn delete_post_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<impl Responder, BlogError> {
    let post = Posts::new(db.get_ref())
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;
    if !AuthorOnly.can_mutate(&post, client.get_id()) {
        return Ok(redirect(format!("/posts/{}/", post.id)));
    }
    client.verify_csrf(&form.csrf_token)?;
    let user = client.require_user()?;

    let txn = db.begin().await?;
    Posts::new(&txn).delete(post.id).await?;
    txn.commit().await?;
    log::info!("delete_post: {} deleted post {}", user.username, post.id);

    Ok(redirect(format!("/profile/{}/", user.username)))
}
