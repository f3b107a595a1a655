use anyhow::Result;
use std::sync::Arc;
use tracing::info;

mod audio;
mod bot;
mod bots;
mod config;
mod error;
mod sources;
mod storage;
mod ui;

use crate::audio::registry::SessionRegistry;
use crate::bots::BotRegistry;
use crate::config::Config;
use crate::sources::{TrackResolver, YtDlpResolver};
use crate::storage::{JsonPrefixBackend, PrefixStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ensemble_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Ensemble Music v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    let backend = Arc::new(JsonPrefixBackend::new(config.prefix_document_path()));
    let prefixes = Arc::new(PrefixStore::new(backend).await);
    let sessions = Arc::new(SessionRegistry::new());
    let resolver: Arc<dyn TrackResolver> = Arc::new(YtDlpResolver::new());

    let mut registry = BotRegistry::new(prefixes, sessions, resolver);
    for identity in config.bots.iter().cloned() {
        registry.add_bot(identity)?;
    }

    // Manejar shutdown con ctrl-c
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("⚠️ Señal de shutdown recibida, cerrando...");
            std::process::exit(0);
        }
    });

    info!("🚀 {} identidades configuradas", config.bots.len());
    registry.run_all().await
}
