use crate::orm::{categories, comments, locations, password_resets, posts, sessions, users};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use std::time::Duration;

/// Opens a connection pool for the database URL.
///
/// The pool is handed to the web server as application data and borrowed by
/// per-request repositories; there is no process-wide handle.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.connect_timeout(Duration::from_secs(8)).sqlx_logging(true);

    // An in-memory SQLite database only lives as long as its single connection.
    if database_url.starts_with("sqlite::memory:") {
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(100)
            .min_connections(5)
            .idle_timeout(Duration::from_secs(8));
    }

    Database::connect(opt).await
}

/// Creates every table that does not exist yet, parents before children.
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    create_table(db, users::Entity).await?;
    create_table(db, categories::Entity).await?;
    create_table(db, locations::Entity).await?;
    create_table(db, posts::Entity).await?;
    create_table(db, comments::Entity).await?;
    create_table(db, sessions::Entity).await?;
    create_table(db, password_resets::Entity).await?;
    Ok(())
}

async fn create_table<C, E>(db: &C, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    log::debug!("ensured table {}", entity.table_name());
    Ok(())
}
