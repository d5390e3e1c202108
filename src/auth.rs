//! Author-only mutation.
//!
//! Handlers compose an [`Authorizer`] directly; a refusal is answered with a
//! redirect to the post's detail page rather than an error page.

use crate::orm::{comments, posts};
use crate::post::PostForTemplate;

/// Anything that records the user who created it.
pub trait Authored {
    fn author_id(&self) -> i32;
}

impl Authored for posts::Model {
    fn author_id(&self) -> i32 {
        self.author_id
    }
}

impl Authored for PostForTemplate {
    fn author_id(&self) -> i32 {
        self.author_id
    }
}

impl Authored for comments::Model {
    fn author_id(&self) -> i32 {
        self.author_id
    }
}

pub trait Authorizer<E: ?Sized> {
    /// Whether `requester` (a user id, `None` for guests) may edit or delete `entity`.
    fn can_mutate(&self, entity: &E, requester: Option<i32>) -> bool;
}

/// Only the author may mutate.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorOnly;

impl<E: Authored + ?Sized> Authorizer<E> for AuthorOnly {
    fn can_mutate(&self, entity: &E, requester: Option<i32>) -> bool {
        requester.is_some() && requester == Some(entity.author_id())
    }
}
