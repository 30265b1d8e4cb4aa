mod app;
mod auth;
mod cash_requests;
mod config;
mod crypto;
mod db;
mod domain;
mod error;
mod expenses;
mod state;
mod validation;

#[cfg(test)]
mod testing;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "cashflow=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let pool = db::connect(&config.db).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(environment = %config.environment, "database ready");

    let (host, port) = (config.host.clone(), config.port);
    let state = AppState::with_pg(config, pool)?;
    app::serve(app::build_app(state), &host, port).await
}
