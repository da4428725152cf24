//! Interlocking core daemon: wires the Postgres store, the rule engine, the
//! change distributor and the Interlocking Service facade together and runs
//! until terminated.

mod bridge;
mod config;

use crate::config::AppConfig;
use signalbox_distributor::Distributor;
use signalbox_rules::{load_rule_document, RuleEngine};
use signalbox_service::InterlockingService;
use signalbox_store::PostgresStoreGateway;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;
    info!("starting signalboxd");

    // The system refuses to enter operational state when rules fail to load
    // (§7: ConfigurationError); do this before anything else can depend on it.
    let rule_document = match load_rule_document(&config.rules_document_path) {
        Ok(document) => document,
        Err(err) => {
            error!(%err, "failed to load interlocking rule document, refusing to start");
            return Err(err.into());
        }
    };
    let rules = Arc::new(RuleEngine::new(rule_document));

    let gateway = Arc::new(PostgresStoreGateway::connect(&config.database_url, config.database_max_connections).await?);

    let service = Arc::new(InterlockingService::new(Arc::clone(&gateway), Arc::clone(&rules), config.service));

    let distributor = Distributor::new(Arc::clone(&gateway), config.distributor);
    distributor.spawn();
    bridge::spawn(Arc::clone(&distributor), Arc::clone(&service));

    info!("signalboxd operational, awaiting requests");
    tokio::signal::ctrl_c().await?;
    info!("signalboxd shutting down");
    Ok(())
}
