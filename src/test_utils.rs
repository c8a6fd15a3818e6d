#[cfg(test)]
pub mod test_utils {
    use crate::auth::TokenKeys;
    use crate::errors::RuntimeErrorLog;
    use crate::events::DashboardEvents;
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::Router;
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use model::entities::{coffee_log, stock_settings, user};
    use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    /// Password shared by every user the helpers create.
    pub const TEST_PASSWORD: &str = "espresso-shot";

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        db.execute_unprepared("PRAGMA foreign_keys = ON;")
            .await
            .expect("Failed to enable foreign keys");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Create AppState for testing; the mailer stays disabled so no test
    /// ever touches the network.
    pub async fn setup_test_app_state() -> AppState {
        let db = setup_test_db().await;
        AppState {
            db,
            tokens: TokenKeys::new("integration-test-secret"),
            mailer: None,
            events: DashboardEvents::new(),
            errors: RuntimeErrorLog::default(),
            namespace: "memory".to_string(),
            cors_origin: None,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }

    /// Insert a user directly. Uses the minimum bcrypt cost to keep the
    /// test suite fast; `verify` does not care about the cost.
    pub async fn create_test_user(
        db: &DatabaseConnection,
        email: &str,
        name: &str,
        role: user::Role,
        max_coffees: Option<i32>,
        is_active: bool,
    ) -> user::Model {
        user::ActiveModel {
            email: Set(email.to_string()),
            name: Set(name.to_string()),
            password_hash: Set(bcrypt::hash(TEST_PASSWORD, 4).expect("Failed to hash password")),
            role: Set(role),
            is_active: Set(is_active),
            max_coffees: Set(max_coffees),
            notify_on_consumption: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create test user")
    }

    /// Seed the singleton stock row.
    pub async fn seed_stock(
        db: &DatabaseConnection,
        initial: i32,
        min: i32,
    ) -> stock_settings::Model {
        stock_settings::ActiveModel {
            id: Set(stock_settings::STOCK_ROW_ID),
            initial_stock: Set(initial),
            current_stock: Set(initial),
            min_stock: Set(min),
            updated_by: Set(None),
            updated_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .expect("Failed to seed stock row")
    }

    /// Insert a log row directly, bypassing the consumption state machine.
    pub async fn insert_log_row(
        db: &DatabaseConnection,
        user_id: i32,
        delta: i32,
    ) -> coffee_log::Model {
        coffee_log::ActiveModel {
            user_id: Set(user_id),
            delta: Set(delta),
            consumed_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert log row")
    }

    /// Mint a session token for a user.
    pub fn token_for(state: &AppState, user: &user::Model) -> String {
        state
            .tokens
            .issue_session(user)
            .expect("Failed to issue session token")
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is determined by the RUST_LOG environment variable,
    /// defaulting to WARN if not set.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> (Router, AppState) {
        let _ = init_test_tracing();

        let state = setup_test_app_state().await;
        let router = create_router(state.clone());
        (router, state)
    }
}
