use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::connection::VoiceConnector;
use crate::audio::session::PlaybackSession;
use crate::error::ConnectError;

/// Clave de sesión: identidad del bot + guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub bot_id: u64,
    pub guild_id: u64,
}

/// Registro de sesiones de reproducción. Garantiza a lo sumo una sesión
/// por (bot, guild); sesiones de guilds distintas nunca se bloquean
/// entre sí.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<PlaybackSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SessionKey) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(key).map(|session| session.clone())
    }

    /// Devuelve la sesión existente o crea una nueva conectando al
    /// canal pedido. Si la conexión queda en otro canal (el bot ya está
    /// ocupado ahí), no se crea sesión.
    pub async fn get_or_create(
        &self,
        key: SessionKey,
        channel_id: u64,
        connector: &dyn VoiceConnector,
    ) -> Result<Arc<PlaybackSession>, ConnectError> {
        if let Some(session) = self.get(&key) {
            return Ok(session);
        }

        let connection = connector.connect(key.guild_id, channel_id).await?;
        if connection.channel_id() != channel_id {
            debug!(
                "🚫 La conexión quedó en el canal {} y no en el pedido {}",
                connection.channel_id(),
                channel_id
            );
            return Err(ConnectError::Busy);
        }

        info!(
            "🔊 Sesión creada para bot {} en guild {}",
            key.bot_id, key.guild_id
        );
        let session = PlaybackSession::new(connection);
        Ok(self.sessions.entry(key).or_insert(session).clone())
    }

    /// Descarta la sesión de la guild; su cola se pierde con ella.
    pub fn remove(&self, key: &SessionKey) {
        if self.sessions.remove(key).is_some() {
            info!(
                "🗑️ Sesión descartada para bot {} en guild {}",
                key.bot_id, key.guild_id
            );
        }
    }
}
