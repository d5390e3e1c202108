use chrono::Duration;
use std::path::PathBuf;

/// Runtime settings read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Master key for signing the session cookie. Random per process when unset.
    pub secret_key: Option<String>,
    pub cookie_secure: bool,
    pub session_time: Duration,
    pub password_reset_time: Duration,
    pub media_root: PathBuf,
    pub mail_dir: PathBuf,
    /// Absolute base used when links leave the site, e.g. in reset emails.
    pub site_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SESSION_MINUTES: i64 = 60 * 24 * 14;
const DEFAULT_RESET_MINUTES: i64 = 60;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let secret_key = lookup("SECRET_KEY");
        if let Some(key) = &secret_key {
            if key.len() < 32 {
                return Err(ConfigError::Invalid {
                    key: "SECRET_KEY",
                    value: "<redacted>".to_owned(),
                    reason: "must be at least 32 bytes",
                });
            }
        }

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let site_url = lookup("SITE_URL")
            .unwrap_or_else(|| format!("http://{}", bind_addr))
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            database_url,
            secret_key,
            cookie_secure: parse_bool(&lookup, "COOKIE_SECURE", false)?,
            session_time: parse_minutes(&lookup, "SESSION_TIME", DEFAULT_SESSION_MINUTES)?,
            password_reset_time: parse_minutes(
                &lookup,
                "PASSWORD_RESET_TIME",
                DEFAULT_RESET_MINUTES,
            )?,
            media_root: lookup("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./media")),
            mail_dir: lookup("MAIL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./sent_emails")),
            bind_addr,
            site_url,
        })
    }
}

fn parse_minutes<F>(lookup: &F, key: &'static str, default: i64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let minutes = match lookup(key) {
        Some(value) => match value.trim().parse::<i64>() {
            Ok(n) if n > 0 => n,
            Ok(_) => {
                return Err(ConfigError::Invalid {
                    key,
                    value,
                    reason: "must be a positive number of minutes",
                })
            }
            Err(_) => {
                return Err(ConfigError::Invalid {
                    key,
                    value,
                    reason: "cannot be parsed as an integer",
                })
            }
        },
        None => default,
    };
    Ok(Duration::minutes(minutes))
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected true or false",
            }),
        },
        None => Ok(default),
    }
}
