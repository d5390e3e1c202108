use crate::orm::{comments, posts, users};
use chrono::{DateTime, Utc};
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ConnectionTrait, DbErr, FromQueryResult, PaginatorTrait,
};

/// A comment joined with the name of its author.
#[derive(Clone, Debug, FromQueryResult)]
pub struct CommentForTemplate {
    pub id: i32,
    pub text: String,
    pub post_id: i32,
    pub author_id: i32,
    pub created_at: DateTime<Utc>,
    // join users
    pub author_name: String,
}

/// Counts the comments of `post_id` and writes only `comment_count` back.
///
/// Call it on the same connection or transaction that inserted or removed the comment.
pub async fn recount<C: ConnectionTrait>(db: &C, post_id: i32) -> Result<i32, DbErr> {
    let count = comments::Entity::find()
        .filter(comments::Column::PostId.eq(post_id))
        .count(db)
        .await? as i32;

    posts::Entity::update_many()
        .col_expr(posts::Column::CommentCount, Expr::value(count))
        .filter(posts::Column::Id.eq(post_id))
        .exec(db)
        .await?;

    Ok(count)
}

pub struct Comments<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> Comments<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// A comment addressed through its post; mismatched pairs are treated as missing.
    pub async fn find_in_post(
        &self,
        post_id: i32,
        comment_id: i32,
    ) -> Result<Option<comments::Model>, DbErr> {
        comments::Entity::find_by_id(comment_id)
            .filter(comments::Column::PostId.eq(post_id))
            .one(self.db)
            .await
    }

    /// Oldest first.
    pub async fn for_post(&self, post_id: i32) -> Result<Vec<CommentForTemplate>, DbErr> {
        comments::Entity::find()
            .inner_join(users::Entity)
            .column_as(users::Column::Username, "author_name")
            .filter(comments::Column::PostId.eq(post_id))
            .order_by_asc(comments::Column::CreatedAt)
            .order_by_asc(comments::Column::Id)
            .into_model::<CommentForTemplate>()
            .all(self.db)
            .await
    }

    pub async fn create(
        &self,
        post_id: i32,
        author_id: i32,
        text: String,
        now: DateTime<Utc>,
    ) -> Result<comments::Model, DbErr> {
        let comment = comments::ActiveModel {
            text: Set(text),
            post_id: Set(post_id),
            author_id: Set(author_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(self.db)
        .await?;

        recount(self.db, post_id).await?;
        Ok(comment)
    }

    pub async fn update_text(
        &self,
        comment: comments::Model,
        text: String,
    ) -> Result<comments::Model, DbErr> {
        let mut comment: comments::ActiveModel = comment.into();
        comment.text = Set(text);
        comment.update(self.db).await
    }

    pub async fn delete(&self, comment: comments::Model) -> Result<(), DbErr> {
        let post_id = comment.post_id;
        comments::Entity::delete_by_id(comment.id)
            .exec(self.db)
            .await?;
        recount(self.db, post_id).await?;
        Ok(())
    }
}
