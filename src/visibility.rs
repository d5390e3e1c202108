//! The publication gate.
//!
//! A post is public when it is published, already due and either has no
//! category or sits in a published one. Its author can additionally see it in
//! every state on the detail page. The same rule exists twice: as plain Rust
//! over loaded rows, and as a query `Condition` for list pages. Both must agree.

use crate::orm::{categories, posts};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, Condition};

/// Everything the gate looks at for a single post.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Publication {
    pub author_id: i32,
    pub is_published: bool,
    pub pub_date: DateTime<Utc>,
    /// `None` when the post has no category.
    pub category_published: Option<bool>,
}

impl Publication {
    pub fn new(post: &posts::Model, category: Option<&categories::Model>) -> Self {
        Self {
            author_id: post.author_id,
            is_published: post.is_published,
            pub_date: post.pub_date,
            category_published: category.map(|c| c.is_published),
        }
    }

    /// Visible to anyone, including anonymous clients and list pages.
    pub fn is_public(&self, now: DateTime<Utc>) -> bool {
        self.is_published && self.pub_date <= now && self.category_published.unwrap_or(true)
    }

    /// Visible on the detail page for `viewer`. Authors always see their own posts.
    pub fn is_visible_to(&self, viewer: Option<i32>, now: DateTime<Utc>) -> bool {
        viewer == Some(self.author_id) || self.is_public(now)
    }
}

pub fn is_visible(
    post: &posts::Model,
    category: Option<&categories::Model>,
    viewer: Option<i32>,
    now: DateTime<Utc>,
) -> bool {
    Publication::new(post, category).is_visible_to(viewer, now)
}

/// Value stored in `posts.is_scheduled` on every save.
///
/// True means "published and due", not "waiting for a future date".
pub fn is_scheduled(is_published: bool, pub_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    is_published && pub_date <= now
}

/// Query form of [`Publication::is_public`].
///
/// The select must left join `categories` so that category-less posts survive.
pub fn public_condition(now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(posts::Column::IsPublished.eq(true))
        .add(posts::Column::PubDate.lte(now))
        .add(
            Condition::any()
                .add(posts::Column::CategoryId.is_null())
                .add(categories::Column::IsPublished.eq(true)),
        )
}
