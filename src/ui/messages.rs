//! Textos de cara al usuario. El núcleo devuelve etiquetas de
//! resultado; este módulo es el único que las convierte en mensajes.

use crate::error::PlayerError;

pub fn searching(query: &str) -> String {
    format!("🔍 Buscando: `{}`", query)
}

pub fn now_playing(title: &str) -> String {
    format!("🎵 **Reproduciendo:** `{}`", title)
}

pub fn queued(title: &str, position: usize) -> String {
    format!("➕ Agregado a la cola (#{}): `{}`", position, title)
}

pub fn skipping(next: Option<&str>) -> String {
    match next {
        Some(title) => format!("⏭️ Saltando! Ahora: `{}`", title),
        None => "⏭️ Saltando! La cola quedó vacía.".to_string(),
    }
}

pub fn paused() -> String {
    "⏸️ Reproducción pausada.".to_string()
}

pub fn pause_no_effect() -> String {
    "⏸️ No hay nada que pausar.".to_string()
}

pub fn resumed() -> String {
    "▶️ Reproducción reanudada.".to_string()
}

pub fn resume_no_effect() -> String {
    "▶️ No hay nada en pausa.".to_string()
}

pub fn queue_listing(titles: &[String]) -> String {
    if titles.is_empty() {
        return "📭 La cola está vacía.".to_string();
    }
    let mut out = String::from("**Cola:**\n");
    for (index, title) in titles.iter().enumerate() {
        out.push_str(&format!("**{}.** `{}`\n", index + 1, title));
    }
    out
}

pub fn now_playing_status(title: &str, elapsed_seconds: i64) -> String {
    let minutes = elapsed_seconds / 60;
    let seconds = elapsed_seconds % 60;
    format!("🎵 Sonando: `{}` ({}:{:02})", title, minutes, seconds)
}

pub fn shuffle_toggled(enabled: bool) -> String {
    if enabled {
        "🔀 Modo aleatorio activado.".to_string()
    } else {
        "➡️ Modo aleatorio desactivado.".to_string()
    }
}

pub fn not_in_voice() -> String {
    "🔇 No estás conectado a un canal de voz.".to_string()
}

pub fn player_error(error: &PlayerError) -> String {
    match error {
        PlayerError::NotConnected => {
            "🔇 No estoy conectado a un canal de voz en este servidor.".to_string()
        }
        PlayerError::ChannelBusy => "🙅 El bot está ocupado en otro canal.".to_string(),
        PlayerError::TrackUnavailable(reason) => {
            format!("💀 No se pudo obtener el track: {}", reason)
        }
        PlayerError::NothingPlaying => "📭 No hay nada reproduciéndose.".to_string(),
    }
}

pub fn current_prefix(prefix: &str) -> String {
    format!("ℹ️ El prefijo actual es `{}`", prefix)
}

pub fn prefix_changed(prefix: &str) -> String {
    format!("✅ Prefijo cambiado a `{}`", prefix)
}

pub fn prefix_save_failed() -> String {
    "❌ No se pudo guardar el prefijo, intentá de nuevo.".to_string()
}

pub fn left_channel() -> String {
    "👋 Me fui del canal de voz.".to_string()
}

pub fn help(prefix: &str) -> String {
    format!(
        "**Comandos:**\n\
         `{p}play <búsqueda|URL>` — reproduce o encola un track (alias `{p}p`)\n\
         `{p}skip` — salta al siguiente track (alias `{p}s`)\n\
         `{p}pause` / `{p}resume` — pausa o reanuda\n\
         `{p}queue` — muestra la cola (alias `{p}q`)\n\
         `{p}np` — qué está sonando\n\
         `{p}shuffle` — activa/desactiva el modo aleatorio\n\
         `{p}prefix [nuevo]` — muestra o cambia el prefijo\n\
         `{p}leave` — desconecta al bot",
        p = prefix
    )
}
