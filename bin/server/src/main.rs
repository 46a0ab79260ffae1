use coursegate_identity::SessionAdapter;
use coursegate_server::{
    app,
    auth::{self, Auth, AuthSettings, Provider, db::PgAdapter, google::GoogleProvider},
    config::ServerConfig,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");

    let default_filter = if config.debug {
        "debug,sqlx=info"
    } else {
        "info,tower_http=debug"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::info!("Loaded configuration");

    let settings = AuthSettings::from_config(&config).expect("invalid auth settings");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let adapter = Arc::new(PgAdapter::new(db_pool));

    // Prune expired session rows
    let cleanup_adapter = adapter.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match cleanup_adapter.delete_expired_sessions().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    tracing::info!("Discovering Google OpenID configuration...");
    let redirect_uri = format!(
        "{}{}/callback/{}",
        config.base_url.trim_end_matches('/'),
        auth::AUTH_BASE_PATH,
        auth::google::PROVIDER_ID
    );
    let google = GoogleProvider::discover(
        &config.google_client_id,
        &config.google_client_secret,
        &redirect_uri,
    )
    .await
    .expect("failed to discover Google OpenID configuration");

    let auth = Arc::new(Auth::new(
        settings,
        adapter,
        vec![Provider::OAuth(google), Provider::Credentials],
    ));
    let app = app::router(auth);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
