//! Staff pages for categories and locations.

use crate::category::Categories;
use crate::error::{redirect, BlogError};
use crate::form::{CategoryForm, FormErrors, LocationForm};
use crate::location::Locations;
use crate::middleware::ClientCtx;
use crate::orm::{categories, locations};
use crate::web::post::CsrfForm;
use actix_web::{get, post, web, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_categories)
        .service(new_category_get)
        .service(new_category_post)
        .service(edit_category_get)
        .service(edit_category_post)
        .service(delete_category_get)
        .service(delete_category_post)
        .service(view_locations)
        .service(new_location_get)
        .service(new_location_post)
        .service(edit_location_get)
        .service(edit_location_post)
        .service(delete_location_get)
        .service(delete_location_post);
}

#[derive(Template)]
#[template(path = "admin/categories.html")]
pub struct CategoriesTemplate {
    pub client: ClientCtx,
    pub categories: Vec<categories::Model>,
}

#[derive(Template)]
#[template(path = "admin/category_form.html")]
pub struct CategoryFormTemplate {
    pub client: ClientCtx,
    pub action: String,
    pub form: CategoryForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "admin/locations.html")]
pub struct LocationsTemplate {
    pub client: ClientCtx,
    pub locations: Vec<locations::Model>,
}

#[derive(Template)]
#[template(path = "admin/location_form.html")]
pub struct LocationFormTemplate {
    pub client: ClientCtx,
    pub action: String,
    pub form: LocationForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "admin/confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub client: ClientCtx,
    pub kind: &'static str,
    pub name: String,
    pub action: String,
    pub back: &'static str,
}

const CATEGORIES_URL: &str = "/admin/categories/";
const LOCATIONS_URL: &str = "/admin/locations/";

/// Form validation plus slug uniqueness.
async fn check_category(
    db: &DatabaseConnection,
    form: &CategoryForm,
    except: Option<i32>,
) -> Result<FormErrors, BlogError> {
    let mut errors = match form.clean() {
        Ok(()) => FormErrors::default(),
        Err(errors) => errors,
    };
    if !errors.has("slug") && Categories::new(db).slug_taken(form.slug.trim(), except).await? {
        errors.add("slug", "Category with this slug already exists.");
    }
    Ok(errors)
}

#[get("/admin/categories/")]
pub async fn view_categories(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    let categories = Categories::new(db.get_ref()).all().await?;
    Ok(CategoriesTemplate { client, categories }.to_response())
}

#[get("/admin/categories/new/")]
pub async fn new_category_get(client: ClientCtx) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    Ok(CategoryFormTemplate {
        client,
        action: "/admin/categories/new/".to_owned(),
        form: CategoryForm {
            is_published: true,
            ..Default::default()
        },
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/admin/categories/new/")]
pub async fn new_category_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Form<CategoryForm>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    client.verify_csrf(&form.csrf_token)?;
    let form = form.into_inner();

    let errors = check_category(db.get_ref(), &form, None).await?;
    if !errors.is_empty() {
        return Ok(CategoryFormTemplate {
            client,
            action: "/admin/categories/new/".to_owned(),
            form,
            errors,
        }
        .to_response());
    }

    Categories::new(db.get_ref()).create(&form, Utc::now()).await?;
    Ok(redirect(CATEGORIES_URL))
}

#[get("/admin/categories/{id}/edit/")]
pub async fn edit_category_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    let category = Categories::new(db.get_ref())
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;

    Ok(CategoryFormTemplate {
        client,
        action: format!("/admin/categories/{}/edit/", category.id),
        form: CategoryForm::from_model(&category),
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/admin/categories/{id}/edit/")]
pub async fn edit_category_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<CategoryForm>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    client.verify_csrf(&form.csrf_token)?;
    let form = form.into_inner();
    let categories = Categories::new(db.get_ref());
    let category = categories
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;

    let errors = check_category(db.get_ref(), &form, Some(category.id)).await?;
    if !errors.is_empty() {
        return Ok(CategoryFormTemplate {
            client,
            action: format!("/admin/categories/{}/edit/", category.id),
            form,
            errors,
        }
        .to_response());
    }

    categories.update(category, &form).await?;
    Ok(redirect(CATEGORIES_URL))
}

#[get("/admin/categories/{id}/delete/")]
pub async fn delete_category_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    let category = Categories::new(db.get_ref())
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;

    Ok(ConfirmDeleteTemplate {
        client,
        kind: "category",
        name: category.title,
        action: format!("/admin/categories/{}/delete/", category.id),
        back: CATEGORIES_URL,
    }
    .to_response())
}

#[post("/admin/categories/{id}/delete/")]
pub async fn delete_category_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<impl Responder, BlogError> {
    let user = client.require_staff()?;
    client.verify_csrf(&form.csrf_token)?;
    let category = Categories::new(db.get_ref())
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;

    let txn = db.begin().await?;
    Categories::new(&txn).delete(category.id).await?;
    txn.commit().await?;
    log::info!("delete_category: {} deleted {}", user.username, category.slug);

    Ok(redirect(CATEGORIES_URL))
}

#[get("/admin/locations/")]
pub async fn view_locations(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    let locations = Locations::new(db.get_ref()).all().await?;
    Ok(LocationsTemplate { client, locations }.to_response())
}

#[get("/admin/locations/new/")]
pub async fn new_location_get(client: ClientCtx) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    Ok(LocationFormTemplate {
        client,
        action: "/admin/locations/new/".to_owned(),
        form: LocationForm {
            is_published: true,
            ..Default::default()
        },
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/admin/locations/new/")]
pub async fn new_location_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Form<LocationForm>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    client.verify_csrf(&form.csrf_token)?;
    let form = form.into_inner();

    if let Err(errors) = form.clean() {
        return Ok(LocationFormTemplate {
            client,
            action: "/admin/locations/new/".to_owned(),
            form,
            errors,
        }
        .to_response());
    }

    Locations::new(db.get_ref()).create(&form, Utc::now()).await?;
    Ok(redirect(LOCATIONS_URL))
}

#[get("/admin/locations/{id}/edit/")]
pub async fn edit_location_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    let location = Locations::new(db.get_ref())
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;

    Ok(LocationFormTemplate {
        client,
        action: format!("/admin/locations/{}/edit/", location.id),
        form: LocationForm::from_model(&location),
        errors: FormErrors::default(),
    }
    .to_response())
}

#[post("/admin/locations/{id}/edit/")]
pub async fn edit_location_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<LocationForm>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    client.verify_csrf(&form.csrf_token)?;
    let form = form.into_inner();
    let locations = Locations::new(db.get_ref());
    let location = locations
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;

    if let Err(errors) = form.clean() {
        return Ok(LocationFormTemplate {
            client,
            action: format!("/admin/locations/{}/edit/", location.id),
            form,
            errors,
        }
        .to_response());
    }

    locations.update(location, &form).await?;
    Ok(redirect(LOCATIONS_URL))
}

#[get("/admin/locations/{id}/delete/")]
pub async fn delete_location_get(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, BlogError> {
    client.require_staff()?;
    let location = Locations::new(db.get_ref())
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;

    Ok(ConfirmDeleteTemplate {
        client,
        kind: "location",
        name: location.name,
        action: format!("/admin/locations/{}/delete/", location.id),
        back: LOCATIONS_URL,
    }
    .to_response())
}

#[post("/admin/locations/{id}/delete/")]
pub async fn delete_location_post(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<CsrfForm>,
) -> Result<impl Responder, BlogError> {
    let user = client.require_staff()?;
    client.verify_csrf(&form.csrf_token)?;
    let location = Locations::new(db.get_ref())
        .find(path.into_inner())
        .await?
        .ok_or(BlogError::NotFound)?;

    let txn = db.begin().await?;
    Locations::new(&txn).delete(location.id).await?;
    txn.commit().await?;
    log::info!("delete_location: {} deleted {}", user.username, location.name);

    Ok(redirect(LOCATIONS_URL))
}
