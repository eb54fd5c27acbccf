use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use pipeline::{compute_charts, CategoryCatalog};
use provider::{DataProvider, FixtureProvider, SocrataConfig, SocrataProvider, DEFAULT_DATASET_URL};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Computes the chart triple for one species and prints it as JSON.
#[derive(Parser, Debug)]
struct Cli {
    /// Species to chart; defaults to the first catalog entry.
    #[arg(long)]
    species: Option<String>,
    #[arg(long, env = "DATASET_URL", default_value = DEFAULT_DATASET_URL)]
    dataset_url: String,
    #[arg(long, env = "SOCRATA_APP_TOKEN")]
    app_token: Option<String>,
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Read counts from a JSON fixture instead of the remote dataset.
    #[arg(long)]
    fixture: Option<String>,
    /// Print the species catalog and exit.
    #[arg(long)]
    list_species: bool,
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let provider = build_provider(&cli).await?;
    let catalog = CategoryCatalog::bootstrap(provider.as_ref())
        .await
        .context("failed to bootstrap category catalog")?;

    let output = if cli.list_species {
        serde_json::to_value(catalog.summary())?
    } else {
        let species = cli
            .species
            .clone()
            .unwrap_or_else(|| catalog.default_species().to_string());
        if !catalog.contains_species(&species) {
            bail!("species '{species}' is not in the catalog");
        }
        info!(%species, "computing charts");
        let charts = compute_charts(provider.as_ref(), &catalog, &species).await?;
        serde_json::to_value(charts)?
    };

    let text = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");
    Ok(())
}

async fn build_provider(cli: &Cli) -> Result<Arc<dyn DataProvider>> {
    if let Some(path) = &cli.fixture {
        let fixture = FixtureProvider::from_json_file(path)
            .await
            .with_context(|| format!("failed to load fixture '{path}'"))?;
        return Ok(Arc::new(fixture));
    }

    let config = SocrataConfig {
        dataset_url: cli.dataset_url.clone(),
        app_token: cli.app_token.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
        ..SocrataConfig::default()
    };
    Ok(Arc::new(SocrataProvider::new(config)?))
}
