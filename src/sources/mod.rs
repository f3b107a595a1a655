pub mod ytdlp;

use async_trait::async_trait;

pub use ytdlp::YtDlpResolver;

use crate::error::ResolveError;

/// Un track listo para reproducir. Inmutable una vez resuelto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    url: String,
    stream_url: String,
}

impl Track {
    pub fn new(title: String, url: String, stream_url: String) -> Self {
        Self {
            title,
            url,
            stream_url,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// URL de la página del track (para mostrar al usuario).
    #[allow(dead_code)]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL de audio directamente reproducible.
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

/// Capacidad de resolver una búsqueda o URL a un track reproducible.
/// La resolución implica I/O y ocurre siempre antes de tocar la sesión:
/// un fallo aquí deja al reproductor intacto.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError>;

    /// Nombre de la fuente, para logs.
    #[allow(dead_code)]
    fn source_name(&self) -> &'static str;
}
