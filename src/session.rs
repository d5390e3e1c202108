use crate::orm::{sessions, users};
use crate::user::ClientUser;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use uuid::Uuid;

/// Cookie key holding the session token.
pub const TOKEN_KEY: &str = "token";
/// Cookie key holding the CSRF token.
pub const CSRF_KEY: &str = "csrf";

/// Stores a new login and returns its token.
pub async fn new_session<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    now: DateTime<Utc>,
    lifetime: Duration,
) -> Result<Uuid, DbErr> {
    let uuid = Uuid::new_v4();
    sessions::Entity::insert(sessions::ActiveModel {
        id: Set(uuid.to_string()),
        user_id: Set(user_id),
        expires_at: Set(now + lifetime),
    })
    .exec(db)
    .await?;

    Ok(uuid)
}

/// Resolves a session token to its user. Expired and unknown tokens yield `None`.
pub async fn authenticate_by_token<C: ConnectionTrait>(
    db: &C,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<ClientUser>, DbErr> {
    if Uuid::parse_str(token).is_err() {
        return Ok(None);
    }

    let found = sessions::Entity::find_by_id(token.to_owned())
        .find_also_related(users::Entity)
        .one(db)
        .await?;

    Ok(match found {
        Some((session, Some(user))) if session.expires_at > now => Some(ClientUser::from(&user)),
        _ => None,
    })
}

pub async fn remove_session<C: ConnectionTrait>(db: &C, token: &str) -> Result<(), DbErr> {
    sessions::Entity::delete_by_id(token.to_owned())
        .exec(db)
        .await?;
    Ok(())
}

/// Logs a user out everywhere, e.g. after a password reset.
pub async fn remove_sessions_for_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<u64, DbErr> {
    let res = sessions::Entity::delete_many()
        .filter(sessions::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

pub async fn remove_expired_sessions<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let res = sessions::Entity::delete_many()
        .filter(sessions::Column::ExpiresAt.lte(now))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}
