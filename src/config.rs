use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, warn};

use model::entities::user;

use crate::auth::{hash_password, TokenKeys};
use crate::errors::RuntimeErrorLog;
use crate::events::DashboardEvents;
use crate::ledger;
use crate::notify::Mailer;
use crate::schemas::AppState;

/// Mail provider settings. All three must be present for the mailer to
/// be enabled; a partially configured mailer is treated as absent.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

/// Identity of the admin account ensured at startup.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Everything the process reads from its environment besides the
/// database URL and bind address, which arrive via the CLI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub token_secret: String,
    pub cors_origin: Option<String>,
    pub public_base_url: String,
    pub mail: Option<MailConfig>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let token_secret =
            std::env::var("TOKEN_SECRET").context("TOKEN_SECRET must be set")?;

        let cors_origin = std::env::var("CORS_ORIGIN").ok().filter(|s| !s.is_empty());

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let mail = match (
            std::env::var("MAIL_API_URL").ok(),
            std::env::var("MAIL_API_KEY").ok(),
            std::env::var("MAIL_FROM").ok(),
        ) {
            (Some(api_url), Some(api_key), Some(from)) => Some(MailConfig {
                api_url,
                api_key,
                from,
            }),
            (None, None, None) => None,
            _ => {
                warn!("Incomplete mail configuration; email notifications are disabled");
                None
            }
        };

        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_EMAIL").ok(),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: std::env::var("BOOTSTRAP_ADMIN_NAME")
                    .unwrap_or_else(|_| "Admin".to_string()),
            }),
            (None, None) => None,
            _ => {
                warn!("Incomplete bootstrap admin configuration; skipping admin bootstrap");
                None
            }
        };

        Ok(Self {
            token_secret,
            cors_origin,
            public_base_url,
            mail,
            bootstrap_admin,
        })
    }
}

/// The storage namespace reported by the health endpoint: the database
/// name for server backends, the file (or `memory`) for SQLite.
pub fn storage_namespace(database_url: &str) -> String {
    let without_scheme = database_url
        .split_once("://")
        .map_or(database_url, |(_, rest)| rest);
    let without_query = without_scheme
        .split_once('?')
        .map_or(without_scheme, |(path, _)| path);
    let last = without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(without_query);
    if last.is_empty() {
        "memory".to_string()
    } else {
        last.to_string()
    }
}

/// Connect to storage and assemble the process-scoped state object that
/// gets injected into every handler.
pub async fn initialize_app_state(database_url: &str, config: &AppConfig) -> Result<AppState> {
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    let state = AppState {
        db,
        tokens: TokenKeys::new(&config.token_secret),
        mailer: config.mail.as_ref().map(Mailer::new),
        events: DashboardEvents::new(),
        errors: RuntimeErrorLog::default(),
        namespace: storage_namespace(database_url),
        cors_origin: config.cors_origin.clone(),
        public_base_url: config.public_base_url.clone(),
    };

    Ok(state)
}

/// Ensure the singleton stock row and, when configured, the bootstrap
/// admin account. Runs once at startup against a migrated database.
pub async fn bootstrap(state: &AppState, config: &AppConfig) -> Result<()> {
    ledger::ensure_stock_row(&state.db).await?;

    let Some(admin) = &config.bootstrap_admin else {
        debug!("No bootstrap admin configured");
        return Ok(());
    };

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(admin.email.as_str()))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        debug!("Bootstrap admin '{}' already present", admin.email);
        return Ok(());
    }

    info!("Creating bootstrap admin '{}'", admin.email);
    user::ActiveModel {
        email: Set(admin.email.clone()),
        name: Set(admin.name.clone()),
        password_hash: Set(hash_password(&admin.password)?),
        role: Set(user::Role::Admin),
        is_active: Set(true),
        max_coffees: Set(None),
        notify_on_consumption: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_resolves_database_name() {
        assert_eq!(
            storage_namespace("postgresql://user:pw@localhost/coffee"),
            "coffee"
        );
        assert_eq!(storage_namespace("sqlite://beancounter.db"), "beancounter.db");
        assert_eq!(
            storage_namespace("sqlite:///var/lib/beancounter/data.sqlite?mode=rwc"),
            "data.sqlite"
        );
        assert_eq!(storage_namespace("sqlite::memory:"), "sqlite::memory:");
    }
}
