use crate::form::{ProfileForm, RegistrationForm};
use crate::orm::{comments, password_resets, posts, sessions, users};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, FromQueryResult, PaginatorTrait};

/// A mini struct for holding only what information we need about a client.
#[derive(Clone, Debug, PartialEq, Eq, FromQueryResult)]
pub struct ClientUser {
    pub id: i32,
    pub username: String,
    pub is_staff: bool,
}

impl From<&users::Model> for ClientUser {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.to_owned(),
            is_staff: user.is_staff,
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// False for a wrong password and for a stored hash that does not parse.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("verify_password: stored hash is malformed: {}", e);
            false
        }
    }
}

/// Account storage for one request or transaction.
pub struct Users<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> Users<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id).one(self.db).await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(self.db)
            .await
    }

    /// Case-insensitive like the reset form expects; several accounts may share an address.
    pub async fn find_by_email(&self, email: &str) -> Result<Vec<users::Model>, DbErr> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Ok(Vec::new());
        }
        Ok(users::Entity::find()
            .all(self.db)
            .await?
            .into_iter()
            .filter(|u| u.email.to_lowercase() == email)
            .collect())
    }

    pub async fn username_taken(&self, username: &str, except: Option<i32>) -> Result<bool, DbErr> {
        let mut query = users::Entity::find().filter(users::Column::Username.eq(username));
        if let Some(id) = except {
            query = query.filter(users::Column::Id.ne(id));
        }
        Ok(query.count(self.db).await? > 0)
    }

    pub async fn create(
        &self,
        form: &RegistrationForm,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<users::Model, DbErr> {
        users::ActiveModel {
            username: Set(form.username.trim().to_owned()),
            first_name: Set(form.first_name.trim().to_owned()),
            last_name: Set(form.last_name.trim().to_owned()),
            email: Set(form.email.trim().to_owned()),
            password: Set(password_hash),
            is_staff: Set(false),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(self.db)
        .await
    }

    pub async fn update_profile(
        &self,
        user: users::Model,
        form: &ProfileForm,
    ) -> Result<users::Model, DbErr> {
        let mut user: users::ActiveModel = user.into();
        user.username = Set(form.username.trim().to_owned());
        user.first_name = Set(form.first_name.trim().to_owned());
        user.last_name = Set(form.last_name.trim().to_owned());
        user.email = Set(form.email.trim().to_owned());
        user.update(self.db).await
    }

    pub async fn set_password(&self, user_id: i32, password_hash: String) -> Result<(), DbErr> {
        users::Entity::update_many()
            .col_expr(users::Column::Password, sea_orm::sea_query::Expr::value(password_hash))
            .filter(users::Column::Id.eq(user_id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    /// Returns false when no such user exists.
    pub async fn set_staff(&self, username: &str, is_staff: bool) -> Result<bool, DbErr> {
        let res = users::Entity::update_many()
            .col_expr(users::Column::IsStaff, sea_orm::sea_query::Expr::value(is_staff))
            .filter(users::Column::Username.eq(username))
            .exec(self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    /// Removes the account together with everything it owns.
    pub async fn delete(&self, user_id: i32) -> Result<(), DbErr> {
        let post_ids: Vec<i32> = posts::Entity::find()
            .select_only()
            .column(posts::Column::Id)
            .filter(posts::Column::AuthorId.eq(user_id))
            .into_tuple()
            .all(self.db)
            .await?;

        // Comments by others on this user's posts, then the user's own comments elsewhere.
        comments::Entity::delete_many()
            .filter(comments::Column::PostId.is_in(post_ids))
            .exec(self.db)
            .await?;
        let touched: Vec<i32> = comments::Entity::find()
            .select_only()
            .column(comments::Column::PostId)
            .filter(comments::Column::AuthorId.eq(user_id))
            .distinct()
            .into_tuple()
            .all(self.db)
            .await?;
        comments::Entity::delete_many()
            .filter(comments::Column::AuthorId.eq(user_id))
            .exec(self.db)
            .await?;
        for post_id in touched {
            crate::comment::recount(self.db, post_id).await?;
        }

        posts::Entity::delete_many()
            .filter(posts::Column::AuthorId.eq(user_id))
            .exec(self.db)
            .await?;
        sessions::Entity::delete_many()
            .filter(sessions::Column::UserId.eq(user_id))
            .exec(self.db)
            .await?;
        password_resets::Entity::delete_many()
            .filter(password_resets::Column::UserId.eq(user_id))
            .exec(self.db)
            .await?;
        users::Entity::delete_by_id(user_id).exec(self.db).await?;
        Ok(())
    }
}
