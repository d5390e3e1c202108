use crate::form::LocationForm;
use crate::orm::{locations, posts};
use chrono::{DateTime, Utc};
use sea_orm::{entity::*, query::*, sea_query::Expr, ConnectionTrait, DbErr};

pub struct Locations<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> Locations<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn all(&self) -> Result<Vec<locations::Model>, DbErr> {
        locations::Entity::find()
            .order_by_asc(locations::Column::Name)
            .all(self.db)
            .await
    }

    pub async fn find(&self, id: i32) -> Result<Option<locations::Model>, DbErr> {
        locations::Entity::find_by_id(id).one(self.db).await
    }

    pub async fn create(
        &self,
        form: &LocationForm,
        now: DateTime<Utc>,
    ) -> Result<locations::Model, DbErr> {
        locations::ActiveModel {
            name: Set(form.name.trim().to_owned()),
            is_published: Set(form.is_published),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(self.db)
        .await
    }

    pub async fn update(
        &self,
        location: locations::Model,
        form: &LocationForm,
    ) -> Result<locations::Model, DbErr> {
        let mut location: locations::ActiveModel = location.into();
        location.name = Set(form.name.trim().to_owned());
        location.is_published = Set(form.is_published);
        location.update(self.db).await
    }

    pub async fn delete(&self, id: i32) -> Result<(), DbErr> {
        posts::Entity::update_many()
            .col_expr(posts::Column::LocationId, Expr::value(Option::<i32>::None))
            .filter(posts::Column::LocationId.eq(id))
            .exec(self.db)
            .await?;
        locations::Entity::delete_by_id(id).exec(self.db).await?;
        Ok(())
    }
}
