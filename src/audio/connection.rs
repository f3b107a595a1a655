use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ConnectError;
use crate::sources::Track;

/// Aviso de fin de reproducción, etiquetado con la generación del
/// avance que lanzó el track.
pub type FinishedHook = Arc<dyn Fn(u64) + Send + Sync>;

/// Conexión de voz ya establecida, propiedad exclusiva de una sesión.
///
/// `play` y `stop` son fire-and-forget: la sesión nunca espera a que el
/// audio termine, sino que es reingresada después vía `on_finished`.
pub trait VoiceConnection: Send + Sync {
    /// Lanza la reproducción de `track`. No bloquea y no debe invocar
    /// `on_finished` de forma síncrona desde esta llamada (la sesión la
    /// hace con su candado tomado). El aviso llega más tarde con la
    /// misma generación, tanto si el track termina de forma natural
    /// como si falla al arrancar.
    fn play(&self, track: &Track, generation: u64, on_finished: FinishedHook);

    /// Detiene el track actual, si lo hay.
    fn stop(&self);

    /// Pausa o reanuda el track actual. No toca la cola.
    fn set_paused(&self, paused: bool);

    /// Canal en el que quedó establecida la conexión.
    fn channel_id(&self) -> u64;
}

/// Capacidad de establecer conexiones de voz.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    /// Conecta al canal pedido. Si el bot ya tiene una conexión en la
    /// guild la devuelve tal cual (puede estar en otro canal; el
    /// registro de sesiones decide si eso es `Busy`).
    async fn connect(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Arc<dyn VoiceConnection>, ConnectError>;
}
