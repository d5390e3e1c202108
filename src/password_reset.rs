use crate::orm::password_resets;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use uuid::Uuid;

/// Issues a single-use reset token for `user_id`.
pub async fn create_reset<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    now: DateTime<Utc>,
    lifetime: Duration,
) -> Result<String, DbErr> {
    let token = Uuid::new_v4().to_string();
    password_resets::Entity::insert(password_resets::ActiveModel {
        id: Set(token.to_owned()),
        user_id: Set(user_id),
        expires_at: Set(now + lifetime),
        used: Set(false),
    })
    .exec(db)
    .await?;
    Ok(token)
}

/// The reset row for `token` if it is unused and not expired.
pub async fn find_valid<C: ConnectionTrait>(
    db: &C,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<password_resets::Model>, DbErr> {
    if Uuid::parse_str(token).is_err() {
        return Ok(None);
    }
    Ok(password_resets::Entity::find_by_id(token.to_owned())
        .filter(password_resets::Column::Used.eq(false))
        .filter(password_resets::Column::ExpiresAt.gt(now))
        .one(db)
        .await?)
}

/// Marks the token used. Returns false when it was already consumed.
pub async fn consume<C: ConnectionTrait>(db: &C, token: &str) -> Result<bool, DbErr> {
    let res = password_resets::Entity::update_many()
        .col_expr(password_resets::Column::Used, sea_orm::sea_query::Expr::value(true))
        .filter(password_resets::Column::Id.eq(token))
        .filter(password_resets::Column::Used.eq(false))
        .exec(db)
        .await?;
    Ok(res.rows_affected > 0)
}
