use thiserror::Error;

/// Errores del núcleo de reproducción. El front end los traduce a texto
/// de usuario en `ui::messages`; el núcleo nunca formatea mensajes.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no hay conexión de voz activa para esta guild")]
    NotConnected,
    #[error("el bot está ocupado en otro canal")]
    ChannelBusy,
    #[error("no se pudo obtener el track: {0}")]
    TrackUnavailable(String),
    #[error("no hay nada reproduciéndose")]
    NothingPlaying,
}

/// Errores al establecer una conexión de voz.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// El bot ya está conectado en otro canal de la guild.
    #[error("el bot ya está ocupado en otro canal")]
    Busy,
    #[error("fallo al unirse al canal de voz: {0}")]
    Join(String),
}

/// Errores de resolución de búsquedas/URLs a tracks reproducibles.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no se encontró ningún resultado")]
    NotFound,
    #[error("fallo del backend de búsqueda: {0}")]
    Backend(String),
}

/// Errores del almacenamiento durable de prefijos. `Corrupt` nunca es
/// fatal: la reconciliación reconstruye el documento.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("documento de prefijos ilegible: {0}")]
    Corrupt(String),
    #[error("error de E/S en almacenamiento: {0}")]
    Io(#[from] std::io::Error),
}
