//! Per-request client state for handlers and templates.

use crate::error::BlogError;
use crate::session::{authenticate_by_token, CSRF_KEY, TOKEN_KEY};
use crate::user::ClientUser;
use actix_session::{Session, SessionExt};
use actix_utils::future::{ok, Ready};
use actix_web::dev::{
    forward_ready, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use chrono::Utc;
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use rand::distributions::{Alphanumeric, DistString};
use sea_orm::DatabaseConnection;
use std::time::{Duration, Instant};
use std::{cell::RefCell, rc::Rc};

const CSRF_TOKEN_LENGTH: usize = 32;

/// Filled in by [`ClientCtxMiddleware`] before any handler runs.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    pub client: Option<ClientUser>,
    pub csrf_token: String,
    /// Path and query of the current request, used as the `next` target.
    pub path: String,
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            csrf_token: String::new(),
            path: "/".to_owned(),
            request_start: Instant::now(),
        }
    }
}

pub fn new_csrf_token() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), CSRF_TOKEN_LENGTH)
}

/// Shared handle on the request's [`ClientCtxInner`].
#[derive(Clone, Debug, Default)]
pub struct ClientCtx(Rc<RefCell<ClientCtxInner>>);

impl ClientCtx {
    pub fn get_client_ctx(extensions: &mut Extensions) -> Self {
        match extensions.get::<Rc<RefCell<ClientCtxInner>>>() {
            Some(inner) => Self(Rc::clone(inner)),
            None => {
                let inner = Rc::new(RefCell::new(ClientCtxInner::default()));
                extensions.insert(inner.clone());
                Self(inner)
            }
        }
    }

    pub fn get_client(&self) -> Option<ClientUser> {
        self.0.borrow().client.to_owned()
    }

    pub fn get_id(&self) -> Option<i32> {
        self.0.borrow().client.as_ref().map(|u| u.id)
    }

    /// Username, or "Guest".
    pub fn get_name(&self) -> String {
        match &self.0.borrow().client {
            Some(user) => user.username.to_owned(),
            None => "Guest".to_owned(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.0.borrow().client.is_some()
    }

    /// True when the client is the user `id`. Takes ids by value or by reference.
    pub fn is<I: std::borrow::Borrow<i32>>(&self, id: I) -> bool {
        self.get_id() == Some(*id.borrow())
    }

    pub fn is_staff(&self) -> bool {
        self.0.borrow().client.as_ref().map_or(false, |u| u.is_staff)
    }

    pub fn path(&self) -> String {
        self.0.borrow().path.to_owned()
    }

    /// The logged in user, or a redirect to the login page that returns here.
    pub fn require_user(&self) -> Result<ClientUser, BlogError> {
        self.get_client().ok_or_else(|| BlogError::LoginRequired { next: self.path() })
    }

    /// Staff pages do not reveal themselves to anyone else.
    pub fn require_staff(&self) -> Result<ClientUser, BlogError> {
        match self.get_client() {
            Some(user) if user.is_staff => Ok(user),
            Some(_) => Err(BlogError::NotFound),
            None => Err(BlogError::LoginRequired { next: self.path() }),
        }
    }

    pub fn csrf_token(&self) -> String {
        self.0.borrow().csrf_token.to_owned()
    }

    pub fn verify_csrf(&self, submitted: &str) -> Result<(), BlogError> {
        let inner = self.0.borrow();
        if !inner.csrf_token.is_empty() && inner.csrf_token == submitted {
            Ok(())
        } else {
            log::debug!("verify_csrf: rejected token for {}", inner.path);
            Err(BlogError::Csrf)
        }
    }

    /// Binds the client to `user` and rotates the CSRF token.
    pub fn login(&self, session: &Session, user: ClientUser, token: &str) -> Result<(), BlogError> {
        let csrf = new_csrf_token();
        session.renew();
        session
            .insert(TOKEN_KEY, token)
            .and_then(|_| session.insert(CSRF_KEY, &csrf))
            .map_err(|e| BlogError::BadRequest(e.to_string()))?;

        let mut inner = self.0.borrow_mut();
        inner.client = Some(user);
        inner.csrf_token = csrf;
        Ok(())
    }

    /// Forgets the client for the rest of this request and purges the cookie.
    pub fn logout(&self, session: &Session) {
        session.purge();
        let mut inner = self.0.borrow_mut();
        inner.client = None;
        inner.csrf_token = String::new();
    }

    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.borrow().request_start
    }

    /// Elapsed time for the page footer.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}μs", us)
        }
    }
}

/// Lets handlers take `client: ClientCtx` as an argument.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ok(ClientCtx::get_client_ctx(&mut req.extensions_mut()))
    }
}

impl<S, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ClientCtxMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ClientCtxMiddleware {
            service: Rc::new(service),
        })
    }
}

/// Client context middleware. Must sit inside the session middleware.
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        async move {
            let session = req.get_session();
            let db = req.app_data::<Data<DatabaseConnection>>().cloned();
            let ctx = ClientCtx::get_client_ctx(&mut req.extensions_mut());

            let csrf_token = match session.get::<String>(CSRF_KEY) {
                Ok(Some(token)) => token,
                _ => {
                    let token = new_csrf_token();
                    if let Err(e) = session.insert(CSRF_KEY, &token) {
                        log::error!("ClientCtxMiddleware: session.insert(): {}", e);
                    }
                    token
                }
            };

            let client = match (session.get::<String>(TOKEN_KEY), db) {
                (Ok(Some(token)), Some(db)) => {
                    match authenticate_by_token(db.get_ref(), &token, Utc::now()).await {
                        Ok(Some(user)) => Some(user),
                        Ok(None) => {
                            // Expired or revoked; stop sending it.
                            session.remove(TOKEN_KEY);
                            None
                        }
                        Err(e) => {
                            log::error!("ClientCtxMiddleware: authenticate_by_token(): {}", e);
                            None
                        }
                    }
                }
                (Err(e), _) => {
                    log::error!("ClientCtxMiddleware: session.get(): {}", e);
                    None
                }
                _ => None,
            };

            {
                let mut inner = ctx.0.borrow_mut();
                inner.client = client;
                inner.csrf_token = csrf_token;
                inner.path = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_owned())
                    .unwrap_or_else(|| req.path().to_owned());
            }

            service.call(req).await
        }
        .boxed_local()
    }
}
