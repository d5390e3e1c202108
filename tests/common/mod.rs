#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::test;
use blogicum::form::{PostInput, DATETIME_INPUT_FORMAT};
use blogicum::mail::Outbox;
use blogicum::media::MediaStore;
use blogicum::orm::{categories, locations, posts, users};
use blogicum::post::Posts;
use blogicum::user::hash_password;
use blogicum::Config;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::path::PathBuf;
use tempfile::TempDir;

pub const PASSWORD: &str = "not-a-secret-9";

static CSRF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name="csrf_token" value="([A-Za-z0-9]+)""#).unwrap());

/// A fresh in-memory database plus scratch directories for uploads and mail.
pub struct TestEnv {
    pub db: DatabaseConnection,
    pub config: Config,
    pub dir: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let media_root = dir.path().join("media");
        let mail_dir = dir.path().join("mail");
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("sqlite::memory:".to_owned()),
            "MEDIA_ROOT" => Some(media_root.display().to_string()),
            "MAIL_DIR" => Some(mail_dir.display().to_string()),
            "SITE_URL" => Some("http://blogicum.test".to_owned()),
            _ => None,
        })
        .unwrap();

        let db = blogicum::db::connect(&config.database_url).await.unwrap();
        blogicum::db::create_schema(&db).await.unwrap();

        Self { db, config, dir }
    }

    pub fn media(&self) -> MediaStore {
        MediaStore::new(self.config.media_root.clone())
    }

    pub fn outbox(&self) -> Outbox {
        Outbox::new(self.config.mail_dir.clone())
    }

    pub fn mail_dir(&self) -> PathBuf {
        self.config.mail_dir.clone()
    }
}

/// Builds the application the way the server binary does.
#[macro_export]
macro_rules! init_app {
    ($env:expr) => {{
        use actix_session::{storage::CookieSessionStore, SessionMiddleware};
        use actix_web::cookie::Key;
        use actix_web::web::Data;

        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(Data::new($env.db.clone()))
                .app_data(Data::new($env.media()))
                .app_data(Data::new($env.outbox()))
                .app_data(Data::new($env.config.clone()))
                .wrap(blogicum::web::error::error_handlers())
                .wrap(blogicum::middleware::ClientCtx::default())
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .configure(blogicum::web::configure),
        )
        .await
    }};
}

pub fn input_time(at: DateTime<Utc>) -> String {
    at.format(DATETIME_INPUT_FORMAT).to_string()
}

pub async fn create_user(db: &DatabaseConnection, username: &str, is_staff: bool) -> users::Model {
    users::ActiveModel {
        username: Set(username.to_owned()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        email: Set(format!("{}@example.com", username)),
        password: Set(hash_password(PASSWORD).unwrap()),
        is_staff: Set(is_staff),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_category(
    db: &DatabaseConnection,
    slug: &str,
    is_published: bool,
) -> categories::Model {
    categories::ActiveModel {
        title: Set(slug.to_uppercase()),
        description: Set(format!("All about {}", slug)),
        slug: Set(slug.to_owned()),
        is_published: Set(is_published),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_location(db: &DatabaseConnection, name: &str, is_published: bool) -> locations::Model {
    locations::ActiveModel {
        name: Set(name.to_owned()),
        is_published: Set(is_published),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Saves a post through the repository, so `is_scheduled` is derived as in production.
pub async fn create_post(
    db: &DatabaseConnection,
    author: &users::Model,
    title: &str,
    category: Option<&categories::Model>,
    is_published: bool,
    due_in: Duration,
) -> posts::Model {
    let now = Utc::now();
    Posts::new(db)
        .create(
            author.id,
            PostInput {
                title: title.to_owned(),
                text: format!("{} text", title),
                pub_date: now + due_in,
                category_id: category.map(|c| c.id),
                location_id: None,
                is_published,
            },
            None,
            now,
        )
        .await
        .unwrap()
}

pub struct Page {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl Page {
    pub fn contains(&self, needle: &str) -> bool {
        self.body.contains(needle)
    }
}

/// Carries the session cookie between requests the way a browser would.
#[derive(Default)]
pub struct Browser {
    cookie: Option<Cookie<'static>>,
    /// Token from the most recent page that rendered a form.
    pub csrf: String,
}

impl Browser {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get<S, B>(&mut self, app: &S, uri: &str) -> Page
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        self.send(app, test::TestRequest::get().uri(uri)).await
    }

    pub async fn post_form<S, B>(&mut self, app: &S, uri: &str, fields: &[(&str, &str)]) -> Page
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        self.send(app, test::TestRequest::post().uri(uri).set_form(fields))
            .await
    }

    /// Posts `multipart/form-data`; `file` is `(filename, bytes)` for the `image` field.
    pub async fn post_multipart<S, B>(
        &mut self,
        app: &S,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> Page
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        let boundary = "----blogicum-test-boundary";
        let mut body: Vec<u8> = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    boundary, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    boundary, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let req = test::TestRequest::post()
            .uri(uri)
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(body);
        self.send(app, req).await
    }

    async fn send<S, B>(&mut self, app: &S, mut req: test::TestRequest) -> Page
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        if let Some(cookie) = &self.cookie {
            req = req.cookie(cookie.clone());
        }
        let resp = test::call_service(app, req.to_request()).await;

        if let Some(cookie) = resp.response().cookies().find(|c| c.name() == "id") {
            self.cookie = Some(cookie.into_owned());
        }
        let status = resp.status();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_owned());
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();

        if let Some(caps) = CSRF_RE.captures(&body) {
            self.csrf = caps[1].to_owned();
        }

        Page {
            status,
            location,
            body,
        }
    }

    /// Logs in through the form and leaves the browser holding a fresh CSRF token.
    pub async fn login<S, B>(&mut self, app: &S, username: &str)
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        self.get(app, "/auth/login/").await;
        let csrf = self.csrf.clone();
        let page = self
            .post_form(
                app,
                "/auth/login/",
                &[
                    ("username", username),
                    ("password", PASSWORD),
                    ("next", "/"),
                    ("csrf_token", &csrf),
                ],
            )
            .await;
        assert_eq!(page.status, StatusCode::FOUND, "login failed for {}", username);
        self.get(app, "/auth/password_change/").await;
    }
}
