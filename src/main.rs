use account_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects the store and serves the API.
/// Any configuration problem (most importantly a missing `JWT_SECRET`) stops the process here.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("FATAL: {err}");
            std::process::exit(1);
        }
    };

    // 2. Logging: pretty locally, JSON in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "account_portal=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(
        env = ?config.env,
        token_lifetime_secs = config.token_lifetime.num_seconds(),
        cookie_lifetime_days = config.cookie_lifetime_days,
        "application starting"
    );

    // 3. Store
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = PostgresRepository::new(pool);
            repo.ensure_schema()
                .await
                .expect("FATAL: Failed to create the users table.");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; accounts are kept in memory and lost on restart");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. State and router
    let port = config.port;
    let app_state = AppState::new(config, repo).expect("FATAL: invalid token configuration");
    let app = create_router(app_state);

    // 5. Serve
    let address = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&address)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {address}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
