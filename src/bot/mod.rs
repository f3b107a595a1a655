//! Handler de eventos de Discord para una identidad del bot.
//!
//! Cada identidad configurada corre su propio cliente de serenity con
//! una instancia de [`EnsembleBot`]; todas comparten el registro de
//! sesiones, el almacén de prefijos y el resolvedor de tracks. Los
//! comandos son mensajes con prefijo dinámico por guild (por eso no se
//! usan comandos slash).

use serenity::{
    all::{Context, EventHandler, Guild, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;

use crate::{
    audio::registry::{SessionKey, SessionRegistry},
    bots::BotIdentity,
    sources::TrackResolver,
    storage::PrefixStore,
};

pub struct EnsembleBot {
    identity: BotIdentity,
    prefixes: Arc<PrefixStore>,
    sessions: Arc<SessionRegistry>,
    resolver: Arc<dyn TrackResolver>,
    http: reqwest::Client,
}

impl EnsembleBot {
    pub fn new(
        identity: BotIdentity,
        prefixes: Arc<PrefixStore>,
        sessions: Arc<SessionRegistry>,
        resolver: Arc<dyn TrackResolver>,
    ) -> Self {
        Self {
            identity,
            prefixes,
            sessions,
            resolver,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EventHandler for EnsembleBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            "🤖 {} en línea como {} ({} guilds)",
            self.identity.nickname,
            ready.user.name,
            ready.guilds.len()
        );

        // Reparar al arrancar las entradas de prefijo que falten para
        // las guilds en las que el bot ya está.
        let guild_ids: Vec<u64> = ready.guilds.iter().map(|guild| guild.id.get()).collect();
        match self
            .prefixes
            .reconcile(
                &self.identity.nickname,
                &self.identity.default_prefix,
                &guild_ids,
            )
            .await
        {
            Ok(0) => {}
            Ok(repaired) => info!(
                "🔧 {}: {} prefijos reparados al arrancar",
                self.identity.nickname, repaired
            ),
            Err(e) => warn!(
                "⚠️ {}: la reconciliación de prefijos falló: {}",
                self.identity.nickname, e
            ),
        }
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new != Some(true) {
            return;
        }
        info!(
            "🏠 {}: unido a la guild {}",
            self.identity.nickname, guild.id
        );
        if let Err(e) = self
            .prefixes
            .reconcile(
                &self.identity.nickname,
                &self.identity.default_prefix,
                &[guild.id.get()],
            )
            .await
        {
            warn!(
                "⚠️ {}: no se pudo crear el prefijo para la guild {}: {}",
                self.identity.nickname, guild.id, e
            );
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let prefix = self
            .prefixes
            .get(
                &self.identity.nickname,
                guild_id.get(),
                &self.identity.default_prefix,
            )
            .await;
        let Some(rest) = msg.content.strip_prefix(&prefix) else {
            return;
        };

        let mut parts = rest.trim().splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("").to_string();
        let args = parts.next().unwrap_or("").trim().to_string();
        if command.is_empty() {
            return;
        }

        if let Err(e) = commands::dispatch(&ctx, &msg, self, &command, &args).await {
            // Los fallos quedan acotados al mensaje que los causó.
            error!(
                "Error manejando el comando {} en guild {}: {:?}",
                command, guild_id, e
            );
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        // Solo interesa la desconexión del propio bot: su sesión se
        // descarta junto con la cola.
        let bot_user_id = ctx.cache.current_user().id;
        if new.user_id != bot_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }
        if let Some(guild_id) = new.guild_id {
            info!(
                "🔌 {}: desconectado del canal de voz en guild {}",
                self.identity.nickname, guild_id
            );
            self.sessions.remove(&SessionKey {
                bot_id: bot_user_id.get(),
                guild_id: guild_id.get(),
            });
        }
    }
}
