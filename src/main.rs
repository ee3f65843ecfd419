//! Flyer Route Planner - Axum server

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use flyer_router::api::{create_router, AppState};
use flyer_router::config::Config;
use flyer_router::console;
use flyer_router::job::JobStore;
use flyer_router::provider::{MapProvider, OverpassProvider};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("flyer_router=info".parse().unwrap()))
        .init();

    console::print_banner();

    let config = Config::from_env();
    let provider: Arc<dyn MapProvider> = Arc::new(OverpassProvider::new(config.osm_cache_dir.clone(), config.provider_timeout));
    let state = Arc::new(AppState {
        jobs: Arc::new(JobStore::new()),
        provider,
        config: config.clone(),
    });

    let app = create_router(state);
    let addr: SocketAddr = config.bind_addr;
    println!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
