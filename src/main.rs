use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod routes;
mod state;

mod models {
    pub mod booking;
    pub mod session;
}

mod repositories {
    pub mod admission;
    pub mod postgres;
    pub mod store;
    #[cfg(test)]
    pub mod memory;
}

mod services {
    pub mod admin;
    pub mod booking;
    pub mod catalog;
}

mod handlers {
    pub mod admin;
    pub mod bookings;
    pub mod response;
    pub mod sessions;
}

mod middleware_layer {
    pub mod admin;
}

mod validation {
    pub mod booking;
}

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = match AppState::new(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("❌ Failed to initialize the booking store: {}", e);
            return Err(e.into());
        }
    };

    let app = routes::build_router(state)?;

    tracing::info!("🚀 Server listening on http://{}", config.bind_addr);
    tracing::info!("✅ All systems operational");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
