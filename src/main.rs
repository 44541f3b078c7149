use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let env = std::env::var("TODOD_ENV").unwrap_or_else(|_| "development".to_string());
    let port: u16 = std::env::var("TODOD_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    // The test environment keeps its own store root so test data never mixes
    // with development data.
    let default_root = if env == "test" { "dbs_test" } else { "dbs" };
    let db_root = std::env::var("TODOD_DB_FOLDER").unwrap_or_else(|_| default_root.to_string());
    let secret = std::env::var("TODOD_SECRET").unwrap_or_else(|_| "todod-dev-secret".to_string());
    info!(
        target: "todod",
        "todod starting: RUST_LOG='{}', env={}, port={}, db_root='{}'",
        rust_log, env, port, db_root
    );

    todod::server::run_with_config(todod::server::ServerConfig { port, db_root, secret }).await
}
