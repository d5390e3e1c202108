use actix_files::Files;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use blogicum::mail::Outbox;
use blogicum::media::MediaStore;
use blogicum::middleware::ClientCtx;
use blogicum::Config;
use chrono::Utc;
use env_logger::Env;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();

    let config = Config::from_env().context("configuration")?;
    let db = blogicum::db::connect(&config.database_url)
        .await
        .context("database connection")?;
    blogicum::db::create_schema(&db)
        .await
        .context("schema creation")?;
    let expired = blogicum::session::remove_expired_sessions(&db, Utc::now()).await?;
    log::info!("removed {} expired sessions", expired);

    let secret_key = match &config.secret_key {
        Some(key) => Key::derive_from(key.as_bytes()),
        None => {
            log::warn!("SECRET_KEY is not set; sessions will not survive a restart.");
            Key::generate()
        }
    };

    std::fs::create_dir_all(&config.media_root).context("media root")?;
    let media = Data::new(MediaStore::new(config.media_root.clone()));
    let outbox = Data::new(Outbox::new(config.mail_dir.clone()));
    let db = Data::new(db);
    let bind_addr = config.bind_addr.clone();
    let config = Data::new(config);

    log::info!("listening on {}", bind_addr);
    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        // However, services are read top->down, higher traffic routes should be
        // placed higher
        App::new()
            .app_data(db.clone())
            .app_data(media.clone())
            .app_data(outbox.clone())
            .app_data(config.clone())
            .wrap(blogicum::web::error::error_handlers())
            .wrap(ClientCtx::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_secure(config.cookie_secure)
                    .build(),
            )
            .wrap(Logger::new("%a %r %s %T"))
            .service(Files::new("/media", media.root()))
            .configure(blogicum::web::configure)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A missing .env is fine; the environment may already be set.
    if let Err(e) = dotenv::dotenv() {
        eprintln!("dotenv: {}", e);
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
