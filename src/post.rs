use crate::form::PostInput;
use crate::orm::{categories, comments, locations, posts, users};
use crate::paginator::{Page, Paginator, POSTS_PER_PAGE};
use crate::visibility::{is_scheduled, public_condition, Publication};
use chrono::{DateTime, Utc};
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, FromQueryResult, PaginatorTrait};

/// A fully joined struct representing the post model and its relational data.
#[derive(Clone, Debug, FromQueryResult)]
pub struct PostForTemplate {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i32,
    pub location_id: Option<i32>,
    pub category_id: Option<i32>,
    pub image: Option<String>,
    pub comment_count: i32,
    pub is_published: bool,
    pub is_scheduled: bool,
    pub created_at: DateTime<Utc>,
    // join users
    pub author_name: String,
    // join categories
    pub category_title: Option<String>,
    pub category_slug: Option<String>,
    pub category_published: Option<bool>,
    // join locations
    pub location_name: Option<String>,
    pub location_published: Option<bool>,
}

impl PostForTemplate {
    pub fn publication(&self) -> Publication {
        Publication {
            author_id: self.author_id,
            is_published: self.is_published,
            pub_date: self.pub_date,
            category_published: self.category_published,
        }
    }

    pub fn is_visible_to(&self, viewer: Option<i32>, now: DateTime<Utc>) -> bool {
        self.publication().is_visible_to(viewer, now)
    }

    /// Hidden locations are not named on the page.
    pub fn location_label(&self) -> Option<&str> {
        match self.location_published {
            Some(true) => self.location_name.as_deref(),
            _ => None,
        }
    }

    /// Category link target, only for published categories.
    pub fn category_url(&self) -> Option<String> {
        match (self.category_published, &self.category_slug) {
            (Some(true), Some(slug)) => Some(format!("/category/{}/", slug)),
            _ => None,
        }
    }

    pub fn category_name(&self) -> &str {
        self.category_title.as_deref().unwrap_or_default()
    }

    pub fn image_url(&self) -> Option<String> {
        self.image.as_deref().map(crate::media::url_for)
    }

    pub fn pub_date_display(&self) -> String {
        self.pub_date.format("%d.%m.%Y %H:%M").to_string()
    }

    pub fn url(&self) -> String {
        format!("/posts/{}/", self.id)
    }
}

/// What to do with the stored image when a post is saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Replace(String),
    Clear,
}

/// Post storage. Every write goes through `save`, which derives `is_scheduled`.
pub struct Posts<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> Posts<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    fn select_for_template() -> Select<posts::Entity> {
        posts::Entity::find()
            .inner_join(users::Entity)
            .column_as(users::Column::Username, "author_name")
            .left_join(categories::Entity)
            .column_as(categories::Column::Title, "category_title")
            .column_as(categories::Column::Slug, "category_slug")
            .column_as(categories::Column::IsPublished, "category_published")
            .left_join(locations::Entity)
            .column_as(locations::Column::Name, "location_name")
            .column_as(locations::Column::IsPublished, "location_published")
            .order_by_desc(posts::Column::PubDate)
            .order_by_desc(posts::Column::Id)
    }

    async fn page(
        &self,
        select: Select<posts::Entity>,
        base_url: &str,
        requested: u64,
    ) -> Result<Page<PostForTemplate>, DbErr> {
        let pages = select
            .into_model::<PostForTemplate>()
            .paginate(self.db, POSTS_PER_PAGE);
        let paginator = Paginator::new(base_url, requested, pages.num_items().await?, POSTS_PER_PAGE);
        let items = pages.fetch_page(paginator.index()).await?;

        Ok(Page { items, paginator })
    }

    pub async fn find(&self, id: i32) -> Result<Option<posts::Model>, DbErr> {
        posts::Entity::find_by_id(id).one(self.db).await
    }

    /// No visibility filtering; callers check [`PostForTemplate::is_visible_to`].
    pub async fn find_for_template(&self, id: i32) -> Result<Option<PostForTemplate>, DbErr> {
        Self::select_for_template()
            .filter(posts::Column::Id.eq(id))
            .into_model::<PostForTemplate>()
            .one(self.db)
            .await
    }

    /// The home page feed.
    pub async fn public_page(
        &self,
        now: DateTime<Utc>,
        requested: u64,
    ) -> Result<Page<PostForTemplate>, DbErr> {
        let select = Self::select_for_template().filter(public_condition(now));
        self.page(select, "/", requested).await
    }

    pub async fn category_page(
        &self,
        category: &categories::Model,
        now: DateTime<Utc>,
        requested: u64,
    ) -> Result<Page<PostForTemplate>, DbErr> {
        let select = Self::select_for_template()
            .filter(posts::Column::CategoryId.eq(category.id))
            .filter(public_condition(now));
        self.page(select, &format!("/category/{}/", category.slug), requested)
            .await
    }

    /// The owner sees every post they wrote; everyone else only the public ones.
    pub async fn profile_page(
        &self,
        author: &users::Model,
        owner: bool,
        now: DateTime<Utc>,
        requested: u64,
    ) -> Result<Page<PostForTemplate>, DbErr> {
        let mut select =
            Self::select_for_template().filter(posts::Column::AuthorId.eq(author.id));
        if !owner {
            select = select.filter(public_condition(now));
        }
        self.page(select, &format!("/profile/{}/", author.username), requested)
            .await
    }

    pub async fn create(
        &self,
        author_id: i32,
        input: PostInput,
        image: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<posts::Model, DbErr> {
        let post = posts::ActiveModel {
            author_id: Set(author_id),
            image: Set(image),
            comment_count: Set(0),
            created_at: Set(now),
            ..Default::default()
        };
        self.save(post, input, now).await
    }

    pub async fn update(
        &self,
        post: posts::Model,
        input: PostInput,
        image: ImageChange,
        now: DateTime<Utc>,
    ) -> Result<posts::Model, DbErr> {
        let mut post: posts::ActiveModel = post.into();
        match image {
            ImageChange::Keep => {}
            ImageChange::Replace(path) => post.image = Set(Some(path)),
            ImageChange::Clear => post.image = Set(None),
        }
        self.save(post, input, now).await
    }

    async fn save(
        &self,
        mut post: posts::ActiveModel,
        input: PostInput,
        now: DateTime<Utc>,
    ) -> Result<posts::Model, DbErr> {
        post.is_scheduled = Set(is_scheduled(input.is_published, input.pub_date, now));
        post.title = Set(input.title);
        post.text = Set(input.text);
        post.pub_date = Set(input.pub_date);
        post.category_id = Set(input.category_id);
        post.location_id = Set(input.location_id);
        post.is_published = Set(input.is_published);

        match post.id {
            ActiveValue::Unchanged(_) | ActiveValue::Set(_) => post.update(self.db).await,
            ActiveValue::NotSet => post.insert(self.db).await,
        }
    }

    /// Removes the post and its comments.
    pub async fn delete(&self, post_id: i32) -> Result<(), DbErr> {
        comments::Entity::delete_many()
            .filter(comments::Column::PostId.eq(post_id))
            .exec(self.db)
            .await?;
        posts::Entity::delete_by_id(post_id).exec(self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn joined(category_published: Option<bool>, location_published: Option<bool>) -> PostForTemplate {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        PostForTemplate {
            id: 5,
            title: "Morning".to_owned(),
            text: "Coffee".to_owned(),
            pub_date: now,
            author_id: 1,
            location_id: location_published.map(|_| 2),
            category_id: category_published.map(|_| 3),
            image: Some("posts/abc.png".to_owned()),
            comment_count: 0,
            is_published: true,
            is_scheduled: true,
            created_at: now,
            author_name: "ann".to_owned(),
            category_title: category_published.map(|_| "Travel".to_owned()),
            category_slug: category_published.map(|_| "travel".to_owned()),
            category_published,
            location_name: location_published.map(|_| "Island".to_owned()),
            location_published,
        }
    }

    #[test]
    fn test_hidden_location_is_not_named() {
        assert_eq!(joined(None, Some(true)).location_label(), Some("Island"));
        assert_eq!(joined(None, Some(false)).location_label(), None);
        assert_eq!(joined(None, None).location_label(), None);
    }

    #[test]
    fn test_links() {
        let post = joined(Some(true), None);
        assert_eq!(post.url(), "/posts/5/");
        assert_eq!(post.category_url().as_deref(), Some("/category/travel/"));
        assert_eq!(post.image_url().as_deref(), Some("/media/posts/abc.png"));
        assert_eq!(joined(Some(false), None).category_url(), None);
        assert_eq!(post.pub_date_display(), "01.03.2024 09:30");
    }
}
