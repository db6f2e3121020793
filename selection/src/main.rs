//! Stone grid - headless lot selector
//!
//! Attaches a selection session to the sale order line or stock move named in
//! the configuration, loads every candidate page and prints the grouped view
//! as JSON. Lot ids given as arguments are toggled (and committed) first.

use std::sync::Arc;

use anyhow::Context;
use shared::{FilterKey, FilterSet, LotId};
use stone_selection::external::OdooRpcClient;
use stone_selection::services::{
    HostKind, InventoryQueryClient, RemoteHostRecord, SelectionSession,
};
use stone_selection::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stone_grid=debug,stone_selection=debug,reqwest=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting stone grid");
    tracing::info!("Environment: {}", config.environment);

    let host_config = config
        .host
        .clone()
        .context("no host record configured (set STONE_HOST__MODEL and STONE_HOST__RECORD_ID)")?;
    let kind = HostKind::from_model(&host_config.model)
        .with_context(|| format!("unsupported host model {}", host_config.model))?;

    let toggles = std::env::args()
        .skip(1)
        .map(|arg| {
            arg.parse::<LotId>()
                .with_context(|| format!("not a lot id: {}", arg))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut filters = FilterSet::new();
    for (key, value) in &host_config.filters {
        match key.parse::<FilterKey>() {
            Ok(key) => filters.set(key, value.clone()),
            Err(err) => tracing::warn!("Ignoring {}", err),
        }
    }

    tracing::info!("Connecting to {}", config.odoo.url);
    let client = Arc::new(OdooRpcClient::connect(&config.odoo).await?);
    tracing::info!("Connected as uid {}", client.uid());

    let host = RemoteHostRecord::load(client.clone(), kind, host_config.record_id).await?;
    let query = InventoryQueryClient::new(client, &config.selection);
    let session = SelectionSession::new(query, host, kind, &config.selection, filters);

    let outcome = session.attach().await;
    tracing::info!("Initial load: {:?}", outcome);

    for lot in toggles {
        let outcome = session.toggle_lot(lot).await;
        tracing::info!("Toggle {}: {:?}", lot, outcome);
    }

    let page = session.load_all().await?;
    tracing::info!("Loaded {} of {} candidates", page.items.len(), page.total);

    let view = session.view().await;
    println!("{}", serde_json::to_string_pretty(&view)?);

    session.detach().await;
    Ok(())
}
