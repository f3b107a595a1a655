use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::StorageError;

/// Entrada de prefijo persistida para un (bot, guild).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixEntry {
    pub prefix: String,
}

/// Documento completo de prefijos: apodo del bot → guild (como string,
/// son claves de objeto JSON) → entrada.
pub type PrefixDocument = HashMap<String, HashMap<String, PrefixEntry>>;

/// Almacenamiento durable del documento de prefijos.
#[async_trait]
pub trait PrefixBackend: Send + Sync {
    async fn load(&self) -> Result<PrefixDocument, StorageError>;
    async fn save(&self, document: &PrefixDocument) -> Result<(), StorageError>;
}

/// Backend JSON en disco. Un archivo ausente o vacío carga como
/// documento vacío; uno ilegible es `Corrupt` y lo repara la
/// reconciliación.
pub struct JsonPrefixBackend {
    path: PathBuf,
}

impl JsonPrefixBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PrefixBackend for JsonPrefixBackend {
    async fn load(&self) -> Result<PrefixDocument, StorageError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PrefixDocument::default())
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(PrefixDocument::default());
        }
        serde_json::from_str(&content).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    async fn save(&self, document: &PrefixDocument) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(document)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

/// Prefijos de comando por (bot, guild), con caché en memoria y acceso
/// serializado al backend.
///
/// La caché no es autoritativa: puede perderse y reconstruirse desde el
/// documento. Un único candado cubre tanto la caché como cada ciclo
/// leer-modificar-escribir contra el backend, así dos `set` simultáneos
/// de guilds distintas no se pisan los datos.
pub struct PrefixStore {
    backend: Arc<dyn PrefixBackend>,
    state: Mutex<PrefixDocument>,
}

impl PrefixStore {
    pub async fn new(backend: Arc<dyn PrefixBackend>) -> Self {
        let cache = match backend.load().await {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    "⚠️ No se pudo cargar el documento de prefijos ({}), se reconstruirá por reconciliación",
                    e
                );
                PrefixDocument::default()
            }
        };
        Self {
            backend,
            state: Mutex::new(cache),
        }
    }

    /// Prefijo vigente para (bot, guild). En fallo de caché relee el
    /// documento; si la entrada tampoco existe ahí, la sintetiza con el
    /// prefijo por defecto y la persiste (evento de reconciliación).
    pub async fn get(&self, bot: &str, guild_id: u64, default: &str) -> String {
        let guild_key = guild_id.to_string();
        let mut cache = self.state.lock().await;

        if let Some(entry) = cache.get(bot).and_then(|guilds| guilds.get(&guild_key)) {
            return entry.prefix.clone();
        }

        // Fallo de caché: el documento en disco es la autoridad.
        warn!(
            "⚠️ {}: prefijo de guild {} ausente en caché, releyendo documento",
            bot, guild_id
        );
        let mut document = self.load_or_recover(&cache).await;
        if let Some(entry) = document.get(bot).and_then(|guilds| guilds.get(&guild_key)) {
            let prefix = entry.prefix.clone();
            *cache = document;
            return prefix;
        }

        // Tampoco está persistido: crear la entrada por defecto.
        warn!(
            "⚠️ {}: guild {} sin entrada persistida, creando con el prefijo por defecto",
            bot, guild_id
        );
        document.entry(bot.to_string()).or_default().insert(
            guild_key,
            PrefixEntry {
                prefix: default.to_string(),
            },
        );
        if let Err(e) = self.backend.save(&document).await {
            warn!("⚠️ No se pudo persistir la entrada sintetizada: {}", e);
        }
        *cache = document;
        default.to_string()
    }

    /// Cambia el prefijo. Escribe primero en el backend y recién
    /// después actualiza la caché: un fallo a mitad de la escritura
    /// nunca deja a la caché anunciando un valor que el documento no
    /// tiene.
    pub async fn set(&self, bot: &str, guild_id: u64, prefix: &str) -> Result<(), StorageError> {
        let guild_key = guild_id.to_string();
        let mut cache = self.state.lock().await;

        let mut document = self.load_or_recover(&cache).await;
        document.entry(bot.to_string()).or_default().insert(
            guild_key,
            PrefixEntry {
                prefix: prefix.to_string(),
            },
        );
        self.backend.save(&document).await?;
        *cache = document;

        info!(
            "💾 {}: prefijo de guild {} cambiado a {:?}",
            bot, guild_id, prefix
        );
        Ok(())
    }

    /// Garantiza una entrada para cada guild del bot. Idempotente: una
    /// segunda pasada sin faltantes no reescribe el documento.
    pub async fn reconcile(
        &self,
        bot: &str,
        default: &str,
        guild_ids: &[u64],
    ) -> Result<usize, StorageError> {
        let mut cache = self.state.lock().await;
        let mut document = self.load_or_recover(&cache).await;

        let entries = document.entry(bot.to_string()).or_default();
        let mut repaired = 0;
        for guild_id in guild_ids {
            let guild_key = guild_id.to_string();
            if !entries.contains_key(&guild_key) {
                entries.insert(
                    guild_key,
                    PrefixEntry {
                        prefix: default.to_string(),
                    },
                );
                repaired += 1;
            }
        }

        if repaired > 0 {
            self.backend.save(&document).await?;
            info!(
                "🔧 {}: la reconciliación creó {} entradas de prefijo",
                bot, repaired
            );
        }
        *cache = document;
        Ok(repaired)
    }

    async fn load_or_recover(&self, cache: &PrefixDocument) -> PrefixDocument {
        match self.backend.load().await {
            Ok(document) => document,
            Err(e) => {
                // Documento ilegible: se reconstruye desde la caché en
                // lugar de abortar.
                warn!(
                    "⚠️ Documento de prefijos ilegible ({}), reconstruyendo desde la caché",
                    e
                );
                cache.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Backend en memoria para los tests: permite inspeccionar lo
    /// persistido y simular un documento corrupto.
    #[derive(Default)]
    struct MemoryBackend {
        document: std::sync::Mutex<PrefixDocument>,
        corrupt: AtomicBool,
        saves: AtomicUsize,
    }

    impl MemoryBackend {
        fn persisted(&self) -> PrefixDocument {
            self.document.lock().unwrap().clone()
        }

        fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PrefixBackend for MemoryBackend {
        async fn load(&self) -> Result<PrefixDocument, StorageError> {
            if self.corrupt.load(Ordering::SeqCst) {
                return Err(StorageError::Corrupt("json truncado".to_string()));
            }
            Ok(self.document.lock().unwrap().clone())
        }

        async fn save(&self, document: &PrefixDocument) -> Result<(), StorageError> {
            *self.document.lock().unwrap() = document.clone();
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.corrupt.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn prefix_of(document: &PrefixDocument, bot: &str, guild: &str) -> String {
        document[bot][guild].prefix.clone()
    }

    #[tokio::test]
    async fn test_get_unknown_guild_synthesizes_and_persists_default() {
        let backend = Arc::new(MemoryBackend::default());
        let store = PrefixStore::new(backend.clone()).await;

        let prefix = store.get("dj", 123, "!").await;

        assert_eq!(prefix, "!");
        assert_eq!(prefix_of(&backend.persisted(), "dj", "123"), "!");

        // Una reconciliación posterior no encuentra nada que reparar.
        let repaired = store.reconcile("dj", "!", &[123]).await.unwrap();
        assert_eq!(repaired, 0);
    }

    #[tokio::test]
    async fn test_get_hits_cache_after_first_lookup() {
        let backend = Arc::new(MemoryBackend::default());
        let store = PrefixStore::new(backend.clone()).await;

        store.get("dj", 123, "!").await;
        let saves = backend.save_count();
        let prefix = store.get("dj", 123, "!").await;

        assert_eq!(prefix, "!");
        assert_eq!(backend.save_count(), saves);
    }

    #[tokio::test]
    async fn test_set_writes_through_before_caching() {
        let backend = Arc::new(MemoryBackend::default());
        let store = PrefixStore::new(backend.clone()).await;

        store.set("dj", 123, "?").await.unwrap();

        assert_eq!(prefix_of(&backend.persisted(), "dj", "123"), "?");
        assert_eq!(store.get("dj", 123, "!").await, "?");
    }

    #[tokio::test]
    async fn test_cache_loss_rebuilds_from_document() {
        let backend = Arc::new(MemoryBackend::default());
        {
            let store = PrefixStore::new(backend.clone()).await;
            store.set("dj", 123, "$").await.unwrap();
        }

        // Un proceso nuevo pierde la caché pero no el documento.
        let store = PrefixStore::new(backend.clone()).await;
        assert_eq!(store.get("dj", 123, "!").await, "$");
    }

    #[tokio::test]
    async fn test_reconcile_creates_missing_entries_once() {
        let backend = Arc::new(MemoryBackend::default());
        let store = PrefixStore::new(backend.clone()).await;
        store.set("dj", 1, "?").await.unwrap();

        let repaired = store.reconcile("dj", "!", &[1, 2, 3]).await.unwrap();
        assert_eq!(repaired, 2);

        // Idempotente: correrla de nuevo no produce cambios ni
        // reescrituras.
        let saves = backend.save_count();
        let repaired = store.reconcile("dj", "!", &[1, 2, 3]).await.unwrap();
        assert_eq!(repaired, 0);
        assert_eq!(backend.save_count(), saves);

        // La entrada existente conserva su prefijo personalizado.
        assert_eq!(prefix_of(&backend.persisted(), "dj", "1"), "?");
        assert_eq!(prefix_of(&backend.persisted(), "dj", "2"), "!");
    }

    #[tokio::test]
    async fn test_corrupt_document_recovers_via_default() {
        let backend = Arc::new(MemoryBackend::default());
        backend.corrupt.store(true, Ordering::SeqCst);
        let store = PrefixStore::new(backend.clone()).await;

        // El documento ilegible no es fatal: se responde el prefijo por
        // defecto y la escritura siguiente repara el backend.
        let prefix = store.get("dj", 123, "!").await;
        assert_eq!(prefix, "!");
        assert_eq!(prefix_of(&backend.persisted(), "dj", "123"), "!");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_sets_do_not_lose_updates() {
        let backend = Arc::new(MemoryBackend::default());
        let store = Arc::new(PrefixStore::new(backend.clone()).await);

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.set("dj", 1, "?").await })
        };
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.set("dj", 2, "!").await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let document = backend.persisted();
        assert_eq!(prefix_of(&document, "dj", "1"), "?");
        assert_eq!(prefix_of(&document, "dj", "2"), "!");
    }
}
