use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use crate::audio::connection::{FinishedHook, VoiceConnection};
use crate::audio::queue::TrackQueue;
use crate::sources::Track;

/// Estado de reproducción de una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Resultado de encolar un track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// La sesión estaba inactiva y el track empezó a sonar de inmediato.
    Started,
    /// El track quedó en la cola, en la posición 1-indexada indicada.
    Queued(usize),
}

/// Resultado de un salto explícito.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipOutcome {
    /// Se saltó al siguiente track de la cola.
    Started(String),
    /// La cola estaba vacía: la sesión volvió a inactiva.
    Drained,
    /// No había nada sonando.
    NothingPlaying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    Paused,
    NoEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed,
    NoEffect,
}

/// Estado mutable de la sesión. Todo lo que se lee-y-escribe vive bajo
/// un único candado: la decisión "cola vacía y nada sonando" y la
/// transición resultante son una sola sección crítica.
struct SessionInner {
    state: PlaybackState,
    queue: TrackQueue,
    now_playing: Option<Track>,
    started_at: Option<DateTime<Utc>>,
    /// Contador de avances. Cada arranque de track lo incrementa; un
    /// aviso de fin cuya generación no coincida se descarta, lo que
    /// impide que un fin tardío de un track ya saltado avance dos veces.
    generation: u64,
}

/// Máquina de estados de reproducción ligada a una conexión de voz.
///
/// `enqueue`, `skip` y `on_playback_finished` son mutuamente
/// excluyentes entre sí vía el candado interno. Las llamadas a la
/// conexión son fire-and-forget, así que el candado nunca espera I/O.
pub struct PlaybackSession {
    inner: Mutex<SessionInner>,
    connection: Arc<dyn VoiceConnection>,
    /// Referencia débil a sí misma para armar los hooks de fin sin
    /// mantener viva la sesión desde el driver de voz.
    weak_self: Weak<PlaybackSession>,
}

impl PlaybackSession {
    pub fn new(connection: Arc<dyn VoiceConnection>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            inner: Mutex::new(SessionInner {
                state: PlaybackState::Idle,
                queue: TrackQueue::new(),
                now_playing: None,
                started_at: None,
                generation: 0,
            }),
            connection,
            weak_self: weak_self.clone(),
        })
    }

    /// Encola un track. Si la sesión está inactiva el track arranca de
    /// inmediato sin pasar por la cola.
    pub fn enqueue(&self, track: Track) -> EnqueueOutcome {
        let hook = self.finished_hook();
        let mut inner = self.inner.lock();
        if inner.state == PlaybackState::Idle {
            self.start_track(&mut inner, track, hook);
            EnqueueOutcome::Started
        } else {
            let position = inner.queue.push(track);
            EnqueueOutcome::Queued(position)
        }
    }

    /// Detiene el track actual y avanza al siguiente. Una sesión en
    /// pausa cuenta como sonando a efectos del salto.
    pub fn skip(&self) -> SkipOutcome {
        let hook = self.finished_hook();
        let mut inner = self.inner.lock();
        match inner.state {
            PlaybackState::Idle => SkipOutcome::NothingPlaying,
            PlaybackState::Playing | PlaybackState::Paused => {
                self.connection.stop();
                match self.advance(&mut inner, hook) {
                    Some(title) => SkipOutcome::Started(title),
                    None => SkipOutcome::Drained,
                }
            }
        }
    }

    /// Transición estricta Playing → Paused. No toca la cola.
    pub fn pause(&self) -> PauseOutcome {
        let mut inner = self.inner.lock();
        if inner.state == PlaybackState::Playing {
            inner.state = PlaybackState::Paused;
            self.connection.set_paused(true);
            PauseOutcome::Paused
        } else {
            PauseOutcome::NoEffect
        }
    }

    /// Transición estricta Paused → Playing.
    pub fn resume(&self) -> ResumeOutcome {
        let mut inner = self.inner.lock();
        if inner.state == PlaybackState::Paused {
            inner.state = PlaybackState::Playing;
            self.connection.set_paused(false);
            ResumeOutcome::Resumed
        } else {
            ResumeOutcome::NoEffect
        }
    }

    /// Consumido cuando la conexión avisa que un track terminó, sea de
    /// forma natural o porque falló al arrancar. Un aviso de una
    /// generación vieja se descarta en silencio.
    pub fn on_playback_finished(&self, generation: u64) {
        let hook = self.finished_hook();
        let mut inner = self.inner.lock();
        if generation != inner.generation {
            debug!(
                "🔇 Aviso de fin obsoleto (generación {} != {}), ignorado",
                generation, inner.generation
            );
            return;
        }
        self.advance(&mut inner, hook);
    }

    /// Instantánea ordenada de los títulos en cola.
    pub fn list_queue(&self) -> Vec<String> {
        self.inner.lock().queue.titles()
    }

    pub fn now_playing(&self) -> Option<Track> {
        self.inner.lock().now_playing.clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().started_at
    }

    #[allow(dead_code)]
    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    #[allow(dead_code)]
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn toggle_shuffle(&self) -> bool {
        self.inner.lock().queue.toggle_shuffle()
    }

    /// Único lugar que muta la cola y lanza una nueva reproducción:
    /// tanto el salto explícito como el fin natural pasan por acá, de
    /// modo que cada avance arranca a lo sumo un track.
    fn advance(&self, inner: &mut SessionInner, hook: FinishedHook) -> Option<String> {
        match inner.queue.pop_next() {
            Some(track) => {
                let title = track.title().to_string();
                self.start_track(inner, track, hook);
                Some(title)
            }
            None => {
                inner.now_playing = None;
                inner.started_at = None;
                inner.state = PlaybackState::Idle;
                debug!("📭 Cola agotada, sesión inactiva");
                None
            }
        }
    }

    fn start_track(&self, inner: &mut SessionInner, track: Track, hook: FinishedHook) {
        inner.generation += 1;
        inner.started_at = Some(Utc::now());
        inner.state = PlaybackState::Playing;
        info!(
            "🎵 Arrancando track: {} (generación {})",
            track.title(),
            inner.generation
        );
        self.connection.play(&track, inner.generation, hook);
        inner.now_playing = Some(track);
    }

    fn finished_hook(&self) -> FinishedHook {
        let session = self.weak_self.clone();
        Arc::new(move |generation| {
            if let Some(session) = session.upgrade() {
                session.on_playback_finished(generation);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Conexión falsa que registra llamadas y permite disparar los
    /// avisos de fin manualmente, como haría el driver de voz.
    #[derive(Default)]
    struct FakeConnection {
        played: Mutex<Vec<(String, u64)>>,
        hooks: Mutex<Vec<(u64, FinishedHook)>>,
        stops: AtomicUsize,
        pauses: Mutex<Vec<bool>>,
    }

    impl FakeConnection {
        /// Simula el aviso asíncrono de fin para una generación dada.
        fn finish(&self, generation: u64) {
            let hook = {
                let hooks = self.hooks.lock();
                hooks
                    .iter()
                    .rev()
                    .find(|(tagged, _)| *tagged == generation)
                    .map(|(_, hook)| hook.clone())
            };
            if let Some(hook) = hook {
                hook(generation);
            }
        }

        fn played_log(&self) -> Vec<(String, u64)> {
            self.played.lock().clone()
        }

        fn stop_count(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    impl VoiceConnection for FakeConnection {
        fn play(&self, track: &Track, generation: u64, on_finished: FinishedHook) {
            self.played
                .lock()
                .push((track.title().to_string(), generation));
            self.hooks.lock().push((generation, on_finished));
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn set_paused(&self, paused: bool) {
            self.pauses.lock().push(paused);
        }

        fn channel_id(&self) -> u64 {
            42
        }
    }

    fn track(title: &str) -> Track {
        Track::new(
            title.to_string(),
            format!("https://example.com/{title}"),
            format!("https://cdn.example.com/{title}.opus"),
        )
    }

    fn session() -> (Arc<PlaybackSession>, Arc<FakeConnection>) {
        let connection = Arc::new(FakeConnection::default());
        let session = PlaybackSession::new(connection.clone());
        (session, connection)
    }

    #[test]
    fn test_first_enqueue_starts_immediately() {
        let (session, connection) = session();

        let outcome = session.enqueue(track("x"));

        assert_eq!(outcome, EnqueueOutcome::Started);
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.now_playing().unwrap().title(), "x");
        assert_eq!(connection.played_log(), vec![("x".to_string(), 1)]);
        assert!(session.list_queue().is_empty());
        assert!(session.started_at().is_some());
    }

    #[test]
    fn test_enqueues_while_playing_preserve_arrival_order() {
        let (session, _connection) = session();

        assert_eq!(session.enqueue(track("x")), EnqueueOutcome::Started);
        assert_eq!(session.enqueue(track("y")), EnqueueOutcome::Queued(1));
        assert_eq!(session.enqueue(track("z")), EnqueueOutcome::Queued(2));

        assert_eq!(session.list_queue(), vec!["y", "z"]);
    }

    #[test]
    fn test_natural_finish_advances_in_order() {
        let (session, connection) = session();
        session.enqueue(track("x"));
        session.enqueue(track("y"));
        session.enqueue(track("z"));

        connection.finish(1);
        assert_eq!(session.now_playing().unwrap().title(), "y");

        connection.finish(2);
        assert_eq!(session.now_playing().unwrap().title(), "z");

        connection.finish(3);
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.now_playing(), None);
        assert_eq!(session.started_at(), None);
    }

    #[test]
    fn test_finished_notification_is_idempotent() {
        let (session, connection) = session();
        session.enqueue(track("x"));
        session.enqueue(track("y"));

        connection.finish(1);
        connection.finish(1);

        // El segundo aviso con la misma generación no avanza de nuevo.
        assert_eq!(
            connection.played_log(),
            vec![("x".to_string(), 1), ("y".to_string(), 2)]
        );
        assert_eq!(session.now_playing().unwrap().title(), "y");
        assert!(session.list_queue().is_empty());
    }

    #[test]
    fn test_skip_then_stale_finish_advances_exactly_once() {
        let (session, connection) = session();
        session.enqueue(track("x"));
        session.enqueue(track("y"));
        session.enqueue(track("z"));

        assert_eq!(session.skip(), SkipOutcome::Started("y".to_string()));
        assert_eq!(connection.stop_count(), 1);

        // El stop del salto hace que el driver emita el fin del track
        // viejo con la generación previa: debe ser un no-op.
        connection.finish(1);

        assert_eq!(session.now_playing().unwrap().title(), "y");
        assert_eq!(session.list_queue(), vec!["z"]);
        assert_eq!(
            connection.played_log(),
            vec![("x".to_string(), 1), ("y".to_string(), 2)]
        );
    }

    #[test]
    fn test_skip_increments_generation_by_one() {
        let (session, _connection) = session();
        session.enqueue(track("x"));
        session.enqueue(track("y"));
        assert_eq!(session.generation(), 1);

        session.skip();

        assert_eq!(session.now_playing().unwrap().title(), "y");
        assert!(session.list_queue().is_empty());
        assert_eq!(session.generation(), 2);
    }

    #[test]
    fn test_skip_with_empty_queue_drains_to_idle() {
        let (session, connection) = session();
        session.enqueue(track("x"));

        assert_eq!(session.skip(), SkipOutcome::Drained);
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.now_playing(), None);
        assert_eq!(connection.stop_count(), 1);
    }

    #[test]
    fn test_skip_while_idle_is_noop() {
        let (session, connection) = session();

        assert_eq!(session.skip(), SkipOutcome::NothingPlaying);
        assert_eq!(connection.stop_count(), 0);
    }

    #[test]
    fn test_skip_while_paused_stops_and_advances() {
        let (session, connection) = session();
        session.enqueue(track("x"));
        session.enqueue(track("y"));
        session.pause();

        assert_eq!(session.skip(), SkipOutcome::Started("y".to_string()));
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(connection.stop_count(), 1);
    }

    #[test]
    fn test_pause_resume_are_strict_one_way_transitions() {
        let (session, connection) = session();

        // Pausa sobre sesión inactiva: sin efecto.
        assert_eq!(session.pause(), PauseOutcome::NoEffect);

        session.enqueue(track("x"));

        // Resume sobre sesión sonando: sin efecto (no hay toggle).
        assert_eq!(session.resume(), ResumeOutcome::NoEffect);

        assert_eq!(session.pause(), PauseOutcome::Paused);
        assert_eq!(session.state(), PlaybackState::Paused);
        assert_eq!(session.pause(), PauseOutcome::NoEffect);

        assert_eq!(session.resume(), ResumeOutcome::Resumed);
        assert_eq!(session.state(), PlaybackState::Playing);

        assert_eq!(*connection.pauses.lock(), vec![true, false]);
    }

    #[test]
    fn test_pause_does_not_touch_queue() {
        let (session, _connection) = session();
        session.enqueue(track("x"));
        session.enqueue(track("y"));

        session.pause();
        session.resume();

        assert_eq!(session.list_queue(), vec!["y"]);
    }

    #[test]
    fn test_shuffle_listing_reflects_committed_order() {
        let (session, _connection) = session();
        session.enqueue(track("d"));
        session.toggle_shuffle();
        session.enqueue(track("a"));
        session.enqueue(track("b"));
        session.enqueue(track("c"));

        // Con shuffle activo el listado sigue mostrando el orden de
        // llegada: la cola solo se reordena al extraer.
        assert_eq!(session.list_queue(), vec!["a", "b", "c"]);
        assert_eq!(session.list_queue(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_failed_start_advances_like_natural_finish() {
        let (session, connection) = session();
        session.enqueue(track("muerta"));
        session.enqueue(track("y"));

        // La conexión no pudo arrancar el stream y reporta el fin de la
        // generación vigente: la sesión avanza en vez de quedarse en un
        // Playing fantasma.
        connection.finish(1);

        assert_eq!(session.now_playing().unwrap().title(), "y");
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_stale_finish_after_drain_and_restart_is_ignored() {
        let (session, connection) = session();
        session.enqueue(track("x"));
        connection.finish(1);
        assert_eq!(session.state(), PlaybackState::Idle);

        session.enqueue(track("y"));
        assert_eq!(session.generation(), 2);

        // Un duplicado tardío del fin de la primera generación no debe
        // interrumpir al track nuevo.
        connection.finish(1);
        assert_eq!(session.now_playing().unwrap().title(), "y");
        assert_eq!(session.state(), PlaybackState::Playing);
    }
}
