use crate::form::CategoryForm;
use crate::orm::{categories, posts};
use chrono::{DateTime, Utc};
use sea_orm::{entity::*, query::*, sea_query::Expr, ConnectionTrait, DbErr, PaginatorTrait};

pub struct Categories<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> Categories<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Every category, hidden ones included, for forms and the admin list.
    pub async fn all(&self) -> Result<Vec<categories::Model>, DbErr> {
        categories::Entity::find()
            .order_by_asc(categories::Column::Title)
            .all(self.db)
            .await
    }

    pub async fn find(&self, id: i32) -> Result<Option<categories::Model>, DbErr> {
        categories::Entity::find_by_id(id).one(self.db).await
    }

    /// Unpublished categories answer like unknown slugs.
    pub async fn find_published_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<categories::Model>, DbErr> {
        categories::Entity::find()
            .filter(categories::Column::Slug.eq(slug))
            .filter(categories::Column::IsPublished.eq(true))
            .one(self.db)
            .await
    }

    pub async fn slug_taken(&self, slug: &str, except: Option<i32>) -> Result<bool, DbErr> {
        let mut query = categories::Entity::find().filter(categories::Column::Slug.eq(slug));
        if let Some(id) = except {
            query = query.filter(categories::Column::Id.ne(id));
        }
        Ok(query.count(self.db).await? > 0)
    }

    pub async fn create(
        &self,
        form: &CategoryForm,
        now: DateTime<Utc>,
    ) -> Result<categories::Model, DbErr> {
        categories::ActiveModel {
            title: Set(form.title.trim().to_owned()),
            description: Set(form.description.trim().to_owned()),
            slug: Set(form.slug.trim().to_owned()),
            is_published: Set(form.is_published),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(self.db)
        .await
    }

    pub async fn update(
        &self,
        category: categories::Model,
        form: &CategoryForm,
    ) -> Result<categories::Model, DbErr> {
        let mut category: categories::ActiveModel = category.into();
        category.title = Set(form.title.trim().to_owned());
        category.description = Set(form.description.trim().to_owned());
        category.slug = Set(form.slug.trim().to_owned());
        category.is_published = Set(form.is_published);
        category.update(self.db).await
    }

    /// Posts in the category survive without one.
    pub async fn delete(&self, id: i32) -> Result<(), DbErr> {
        posts::Entity::update_many()
            .col_expr(posts::Column::CategoryId, Expr::value(Option::<i32>::None))
            .filter(posts::Column::CategoryId.eq(id))
            .exec(self.db)
            .await?;
        categories::Entity::delete_by_id(id).exec(self.db).await?;
        Ok(())
    }
}
