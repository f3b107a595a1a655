use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{Track, TrackResolver};
use crate::error::ResolveError;

/// Resolución de búsquedas y URLs vía yt-dlp.
pub struct YtDlpResolver {
    // Limitar procesos concurrentes de yt-dlp para evitar rate limiting
    rate_limiter: tokio::sync::Semaphore,
}

/// Campos que nos interesan del JSON de yt-dlp.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    webpage_url: String,
    /// URL del formato de audio seleccionado con `-f bestaudio/best`.
    url: Option<String>,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self {
            rate_limiter: tokio::sync::Semaphore::new(3),
        }
    }

    fn is_url(query: &str) -> bool {
        Url::parse(query)
            .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
            .unwrap_or(false)
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Backend(e.to_string()))?;

        let target = if Self::is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        };

        debug!("🔍 Resolviendo con yt-dlp: {}", target);

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "-f",
                "bestaudio/best",
                "--dump-json",
                "--no-warnings",
                &target,
            ])
            .output()
            .await
            .map_err(|e| ResolveError::Backend(format!("no se pudo ejecutar yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Backend(format!("yt-dlp: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or(ResolveError::NotFound)?;
        let parsed: YtDlpInfo = serde_json::from_str(line)
            .map_err(|e| ResolveError::Backend(format!("respuesta de yt-dlp inválida: {}", e)))?;
        let stream_url = parsed.url.ok_or(ResolveError::NotFound)?;

        info!("🎵 Resuelto: {}", parsed.title);
        Ok(Track::new(parsed.title, parsed.webpage_url, stream_url))
    }

    fn source_name(&self) -> &'static str {
        "yt-dlp"
    }
}
