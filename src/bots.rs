use anyhow::{Context as _, Result};
use futures::future::join_all;
use serde::Deserialize;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    audio::registry::SessionRegistry, bot::EnsembleBot, sources::TrackResolver,
    storage::PrefixStore,
};

/// Identidad estática de un bot: apodo, token y prefijo por defecto.
/// Vive lo que vive el proceso.
#[derive(Debug, Clone, Deserialize)]
pub struct BotIdentity {
    pub nickname: String,
    pub token: String,
    #[serde(default = "default_prefix")]
    pub default_prefix: String,
}

fn default_prefix() -> String {
    "!".to_string()
}

/// Conjunto de identidades configuradas y su bucle de ejecución: un
/// cliente de Discord por identidad, compartiendo sesiones, prefijos y
/// resolución de tracks.
pub struct BotRegistry {
    bots: Vec<BotIdentity>,
    prefixes: Arc<PrefixStore>,
    sessions: Arc<SessionRegistry>,
    resolver: Arc<dyn TrackResolver>,
}

impl BotRegistry {
    pub fn new(
        prefixes: Arc<PrefixStore>,
        sessions: Arc<SessionRegistry>,
        resolver: Arc<dyn TrackResolver>,
    ) -> Self {
        Self {
            bots: Vec::new(),
            prefixes,
            sessions,
            resolver,
        }
    }

    /// Agrega una identidad. Los apodos deben ser únicos: son la clave
    /// del documento de prefijos.
    pub fn add_bot(&mut self, identity: BotIdentity) -> Result<()> {
        if identity.token.trim().is_empty() {
            anyhow::bail!("la identidad {:?} no tiene token", identity.nickname);
        }
        if self
            .bots
            .iter()
            .any(|bot| bot.nickname == identity.nickname)
        {
            anyhow::bail!("apodo de bot duplicado: {:?}", identity.nickname);
        }
        self.bots.push(identity);
        Ok(())
    }

    /// Lanza un cliente por identidad y los atiende hasta que terminen.
    pub async fn run_all(self) -> Result<()> {
        if self.bots.is_empty() {
            anyhow::bail!("no hay bots configurados");
        }

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_VOICE_STATES
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let mut tasks = Vec::new();
        for identity in self.bots {
            let nickname = identity.nickname.clone();
            let handler = EnsembleBot::new(
                identity.clone(),
                self.prefixes.clone(),
                self.sessions.clone(),
                self.resolver.clone(),
            );

            let mut client = Client::builder(&identity.token, intents)
                .event_handler(handler)
                .register_songbird()
                .await
                .with_context(|| format!("no se pudo crear el cliente para {}", nickname))?;

            tasks.push(tokio::spawn(async move {
                info!("🚀 Iniciando cliente para {}", nickname);
                if let Err(why) = client.start().await {
                    error!("El cliente {} terminó con error: {:?}", nickname, why);
                }
            }));
        }

        join_all(tasks).await;
        Ok(())
    }
}
