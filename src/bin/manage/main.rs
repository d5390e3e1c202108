use anyhow::{bail, Context};
use blogicum::user::Users;
use clap::{Parser, Subcommand};
use env_logger::Env;

type Result<T> = std::result::Result<T, anyhow::Error>;

/// Maintenance tasks for a blogicum database.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Overrides DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create any missing tables
    Migrate,
    /// Grant staff status to a user
    Promote { username: String },
    /// Revoke staff status from a user
    Demote { username: String },
    /// Delete a user together with their posts and comments
    DeleteUser { username: String },
    /// Remove expired login sessions
    ClearSessions,
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let url = match cli.database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
    };
    let db = blogicum::db::connect(&url).await?;

    match cli.command {
        Command::Migrate => {
            blogicum::db::create_schema(&db).await?;
            println!("Schema is up to date.");
        }
        Command::Promote { username } => set_staff(&db, &username, true).await?,
        Command::Demote { username } => set_staff(&db, &username, false).await?,
        Command::DeleteUser { username } => {
            use sea_orm::TransactionTrait;

            let user = match Users::new(&db).find_by_username(&username).await? {
                Some(user) => user,
                None => bail!("no user named {}", username),
            };
            let txn = db.begin().await?;
            Users::new(&txn).delete(user.id).await?;
            txn.commit().await?;
            println!("Deleted {}.", username);
        }
        Command::ClearSessions => {
            let removed =
                blogicum::session::remove_expired_sessions(&db, chrono::Utc::now()).await?;
            println!("Removed {} expired sessions.", removed);
        }
    }

    Ok(())
}

async fn set_staff(db: &sea_orm::DatabaseConnection, username: &str, is_staff: bool) -> Result<()> {
    if !Users::new(db).set_staff(username, is_staff).await? {
        bail!("no user named {}", username);
    }
    println!(
        "{} is {} staff.",
        username,
        if is_staff { "now" } else { "no longer" }
    );
    Ok(())
}
