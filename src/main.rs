use tokio::net::TcpListener;

use finance_tracker::app;
use finance_tracker::auth::JwtKeys;
use finance_tracker::config::AppConfig;
use finance_tracker::logging::{self, LoggingConfig};
use finance_tracker::state::AppState;
use finance_tracker::store::PgStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    logging::init_logging(LoggingConfig::from_env())?;

    let config = AppConfig::from_env()?;
    let jwt = JwtKeys::from_secret(&config.jwt_secret);

    let state = match &config.database_url {
        Some(database_url) => {
            let store = PgStore::connect(database_url, config.max_connections).await?;
            tracing::info!("Connected to PostgreSQL (pool size {})", config.max_connections);
            AppState::postgres(store, jwt, &config.api_prefix)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, data is kept in memory and lost on exit");
            AppState::in_memory(jwt, &config.api_prefix)
        }
    };
    let app = app::create_app(state, &config.cors_origins);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Finance tracker running at http://{}{}", addr, config.api_prefix);
    axum::serve(listener, app).await?;

    Ok(())
}
