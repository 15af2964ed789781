// Comment service server - admin API, frontend API, and web form endpoints.

use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

use comment_service::{app_state::AppState, config::Config, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let state = AppState::new(config.clone()).await?;

    // Build main application router
    let app = routes::app_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let address = config.server_address();
    info!("comment service listening on http://{}", address);

    let listener = TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
