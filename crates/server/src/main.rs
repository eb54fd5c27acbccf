use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use controller::ReactiveController;
use pipeline::CategoryCatalog;
use provider::{DataProvider, FixtureProvider, SocrataProvider};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::build_router;
use app_state::AppState;
use config::{load_settings, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let provider = build_provider(&settings).await?;
    let catalog = CategoryCatalog::bootstrap(provider.as_ref())
        .await
        .map_err(|error| {
            error!(%error, "failed to bootstrap category catalog; dashboard cannot start");
            error
        })?;
    let catalog = Arc::new(catalog);

    let controller = ReactiveController::new(provider, Arc::clone(&catalog));
    let initial_species = catalog
        .initial_species(settings.initial_species.as_deref())
        .to_string();
    controller.select(initial_species).await;

    let app = build_router(Arc::new(AppState { controller }));

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, "dashboard listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_provider(settings: &Settings) -> anyhow::Result<Arc<dyn DataProvider>> {
    if let Some(path) = &settings.fixture_path {
        info!(%path, "serving counts from fixture file");
        let fixture = FixtureProvider::from_json_file(path)
            .await
            .with_context(|| format!("failed to load fixture '{path}'"))?;
        return Ok(Arc::new(fixture));
    }

    info!(dataset_url = %settings.dataset_url, "querying remote dataset");
    let socrata = SocrataProvider::new(settings.socrata_config())
        .context("failed to build dataset client")?;
    Ok(Arc::new(socrata))
}
