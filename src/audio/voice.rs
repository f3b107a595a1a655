use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::HttpRequest, tracks::TrackHandle, Call, Event, EventContext,
    EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::audio::connection::{FinishedHook, VoiceConnection, VoiceConnector};
use crate::error::ConnectError;
use crate::sources::Track;

/// Conector de voz respaldado por songbird.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Arc<dyn VoiceConnection>, ConnectError> {
        let guild = GuildId::new(guild_id);

        // Si ya hay una llamada activa en la guild se devuelve tal cual,
        // sin mover al bot; el registro compara el canal resultante con
        // el pedido para decidir si está ocupado.
        if let Some(call) = self.manager.get(guild) {
            let current = call.lock().await.current_channel().map(|c| c.0.get());
            return Ok(Arc::new(SongbirdConnection::new(
                call,
                current.unwrap_or(channel_id),
                self.http.clone(),
            )));
        }

        let call = self
            .manager
            .join(guild, ChannelId::new(channel_id))
            .await
            .map_err(|e| ConnectError::Join(e.to_string()))?;

        Ok(Arc::new(SongbirdConnection::new(
            call,
            channel_id,
            self.http.clone(),
        )))
    }
}

/// Conexión de voz de una guild sobre una llamada de songbird.
///
/// El trabajo real (parar lo anterior, lanzar el input, registrar los
/// eventos de fin) ocurre en tareas en segundo plano bajo el candado de
/// la llamada; `latest` guarda la última generación pedida para que una
/// tarea reordenada por el scheduler no reviva un track ya saltado.
pub struct SongbirdConnection {
    call: Arc<tokio::sync::Mutex<Call>>,
    channel_id: u64,
    http: reqwest::Client,
    current: Arc<Mutex<Option<TrackHandle>>>,
    latest: Arc<AtomicU64>,
}

impl SongbirdConnection {
    fn new(call: Arc<tokio::sync::Mutex<Call>>, channel_id: u64, http: reqwest::Client) -> Self {
        Self {
            call,
            channel_id,
            http,
            current: Arc::new(Mutex::new(None)),
            latest: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl VoiceConnection for SongbirdConnection {
    fn play(&self, track: &Track, generation: u64, on_finished: FinishedHook) {
        self.latest.store(generation, Ordering::SeqCst);

        let call = self.call.clone();
        let http = self.http.clone();
        let slot = self.current.clone();
        let latest = self.latest.clone();
        let stream_url = track.stream_url().to_string();
        let title = track.title().to_string();

        tokio::spawn(async move {
            let mut call = call.lock().await;
            if latest.load(Ordering::SeqCst) != generation {
                debug!("🔇 Pedido de reproducción obsoleto para {}", title);
                return;
            }

            call.stop();
            let input = HttpRequest::new(http, stream_url);
            let handle = call.play_input(input.into());

            let end = handle.add_event(
                Event::Track(TrackEvent::End),
                PlaybackEndNotifier {
                    generation,
                    on_finished: on_finished.clone(),
                },
            );
            let err = handle.add_event(
                Event::Track(TrackEvent::Error),
                PlaybackEndNotifier {
                    generation,
                    on_finished: on_finished.clone(),
                },
            );

            if let Err(e) = end.and(err) {
                // Sin notificador el avance quedaría atascado: se trata
                // como un fin inmediato de esta generación.
                error!("Error registrando eventos de fin para {}: {:?}", title, e);
                let _ = handle.stop();
                drop(call);
                on_finished(generation);
                return;
            }

            debug!("▶️ Track lanzado: {} (generación {})", title, generation);
            *slot.lock() = Some(handle);
        });
    }

    fn stop(&self) {
        self.current.lock().take();

        // Parar todo lo que suene en la llamada, salvo que ya se haya
        // pedido una reproducción nueva (en ese caso la tarea de play
        // hace su propio stop bajo el candado de la llamada).
        let sequence = self.latest.load(Ordering::SeqCst);
        let call = self.call.clone();
        let latest = self.latest.clone();
        tokio::spawn(async move {
            let mut call = call.lock().await;
            if latest.load(Ordering::SeqCst) == sequence {
                call.stop();
            }
        });
    }

    fn set_paused(&self, paused: bool) {
        if let Some(handle) = self.current.lock().as_ref() {
            let result = if paused { handle.pause() } else { handle.play() };
            if let Err(e) = result {
                error!("Error al cambiar el estado de pausa: {:?}", e);
            }
        }
    }

    fn channel_id(&self) -> u64 {
        self.channel_id
    }
}

/// Entrega a la sesión la generación con la que se lanzó el track,
/// termine de forma natural o por error del stream.
struct PlaybackEndNotifier {
    generation: u64,
    on_finished: FinishedHook,
}

#[async_trait]
impl VoiceEventHandler for PlaybackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("🔚 Fin de pista (generación {})", self.generation);
        (self.on_finished)(self.generation);
        None
    }
}
