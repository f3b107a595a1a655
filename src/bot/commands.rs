use anyhow::Result;
use serenity::all::{ChannelId, Context, GuildId, Message};
use std::sync::Arc;
use tracing::warn;

use super::EnsembleBot;
use crate::{
    audio::{
        registry::SessionKey,
        session::{EnqueueOutcome, PauseOutcome, PlaybackSession, ResumeOutcome, SkipOutcome},
        voice::SongbirdConnector,
    },
    error::{ConnectError, PlayerError},
    ui::messages,
};

/// Despacha un comando ya parseado (sin prefijo) a su handler.
pub async fn dispatch(
    ctx: &Context,
    msg: &Message,
    bot: &EnsembleBot,
    command: &str,
    args: &str,
) -> Result<()> {
    match command {
        "play" | "p" => play(ctx, msg, bot, args).await,
        "skip" | "s" => skip(ctx, msg, bot).await,
        "pause" => pause(ctx, msg, bot).await,
        "resume" | "r" => resume(ctx, msg, bot).await,
        "queue" | "q" => view_queue(ctx, msg, bot).await,
        "np" => now_playing(ctx, msg, bot).await,
        "shuffle" => shuffle(ctx, msg, bot).await,
        "prefix" | "change_prefix" => change_prefix(ctx, msg, bot, args).await,
        "leave" => leave(ctx, msg, bot).await,
        "help" => help(ctx, msg, bot).await,
        // Cualquier otra cosa no es un comando nuestro.
        _ => Ok(()),
    }
}

fn session_key(ctx: &Context, guild_id: GuildId) -> SessionKey {
    SessionKey {
        bot_id: ctx.cache.current_user().id.get(),
        guild_id: guild_id.get(),
    }
}

/// Canal de voz del autor del mensaje, si está en uno.
fn author_voice_channel(ctx: &Context, msg: &Message) -> Option<ChannelId> {
    let guild = msg.guild(&ctx.cache)?;
    guild
        .voice_states
        .get(&msg.author.id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn require_session(
    ctx: &Context,
    bot: &EnsembleBot,
    guild_id: GuildId,
) -> Result<Arc<PlaybackSession>, PlayerError> {
    bot.sessions
        .get(&session_key(ctx, guild_id))
        .ok_or(PlayerError::NotConnected)
}

async fn say(ctx: &Context, msg: &Message, text: String) {
    if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
        warn!("No se pudo enviar el mensaje: {:?}", e);
    }
}

async fn play(ctx: &Context, msg: &Message, bot: &EnsembleBot, query: &str) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    if query.is_empty() {
        return help(ctx, msg, bot).await;
    }

    let Some(channel_id) = author_voice_channel(ctx, msg) else {
        say(ctx, msg, messages::not_in_voice()).await;
        return Ok(());
    };

    say(ctx, msg, messages::searching(query)).await;

    // La resolución ocurre antes de tocar la sesión: un fallo acá la
    // deja en el estado previo.
    let track = match bot.resolver.resolve(query).await {
        Ok(track) => track,
        Err(e) => {
            let error = PlayerError::TrackUnavailable(e.to_string());
            say(ctx, msg, messages::player_error(&error)).await;
            return Ok(());
        }
    };

    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("songbird no inicializado"))?;
    let connector = SongbirdConnector::new(manager, bot.http.clone());

    let key = session_key(ctx, guild_id);
    let session = match bot
        .sessions
        .get_or_create(key, channel_id.get(), &connector)
        .await
    {
        Ok(session) => session,
        Err(ConnectError::Busy) => {
            say(ctx, msg, messages::player_error(&PlayerError::ChannelBusy)).await;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let text = match session.enqueue(track.clone()) {
        EnqueueOutcome::Started => messages::now_playing(track.title()),
        EnqueueOutcome::Queued(position) => messages::queued(track.title(), position),
    };
    say(ctx, msg, text).await;
    Ok(())
}

async fn skip(ctx: &Context, msg: &Message, bot: &EnsembleBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let session = match require_session(ctx, bot, guild_id) {
        Ok(session) => session,
        Err(e) => {
            say(ctx, msg, messages::player_error(&e)).await;
            return Ok(());
        }
    };

    let text = match session.skip() {
        SkipOutcome::Started(title) => messages::skipping(Some(&title)),
        SkipOutcome::Drained => messages::skipping(None),
        SkipOutcome::NothingPlaying => messages::player_error(&PlayerError::NothingPlaying),
    };
    say(ctx, msg, text).await;
    Ok(())
}

async fn pause(ctx: &Context, msg: &Message, bot: &EnsembleBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let session = match require_session(ctx, bot, guild_id) {
        Ok(session) => session,
        Err(e) => {
            say(ctx, msg, messages::player_error(&e)).await;
            return Ok(());
        }
    };

    let text = match session.pause() {
        PauseOutcome::Paused => messages::paused(),
        PauseOutcome::NoEffect => messages::pause_no_effect(),
    };
    say(ctx, msg, text).await;
    Ok(())
}

async fn resume(ctx: &Context, msg: &Message, bot: &EnsembleBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let session = match require_session(ctx, bot, guild_id) {
        Ok(session) => session,
        Err(e) => {
            say(ctx, msg, messages::player_error(&e)).await;
            return Ok(());
        }
    };

    let text = match session.resume() {
        ResumeOutcome::Resumed => messages::resumed(),
        ResumeOutcome::NoEffect => messages::resume_no_effect(),
    };
    say(ctx, msg, text).await;
    Ok(())
}

async fn view_queue(ctx: &Context, msg: &Message, bot: &EnsembleBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let session = match require_session(ctx, bot, guild_id) {
        Ok(session) => session,
        Err(e) => {
            say(ctx, msg, messages::player_error(&e)).await;
            return Ok(());
        }
    };

    let titles = session.list_queue();
    say(ctx, msg, messages::queue_listing(&titles)).await;
    Ok(())
}

async fn now_playing(ctx: &Context, msg: &Message, bot: &EnsembleBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let session = match require_session(ctx, bot, guild_id) {
        Ok(session) => session,
        Err(e) => {
            say(ctx, msg, messages::player_error(&e)).await;
            return Ok(());
        }
    };

    let text = match (session.now_playing(), session.started_at()) {
        (Some(track), Some(started_at)) => {
            let elapsed = (chrono::Utc::now() - started_at).num_seconds().max(0);
            messages::now_playing_status(track.title(), elapsed)
        }
        _ => messages::player_error(&PlayerError::NothingPlaying),
    };
    say(ctx, msg, text).await;
    Ok(())
}

async fn shuffle(ctx: &Context, msg: &Message, bot: &EnsembleBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let session = match require_session(ctx, bot, guild_id) {
        Ok(session) => session,
        Err(e) => {
            say(ctx, msg, messages::player_error(&e)).await;
            return Ok(());
        }
    };

    let enabled = session.toggle_shuffle();
    say(ctx, msg, messages::shuffle_toggled(enabled)).await;
    Ok(())
}

async fn change_prefix(ctx: &Context, msg: &Message, bot: &EnsembleBot, args: &str) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let new_prefix = args.split_whitespace().next().unwrap_or("");
    if new_prefix.is_empty() {
        let current = bot
            .prefixes
            .get(
                &bot.identity.nickname,
                guild_id.get(),
                &bot.identity.default_prefix,
            )
            .await;
        say(ctx, msg, messages::current_prefix(&current)).await;
        return Ok(());
    }

    match bot
        .prefixes
        .set(&bot.identity.nickname, guild_id.get(), new_prefix)
        .await
    {
        Ok(()) => say(ctx, msg, messages::prefix_changed(new_prefix)).await,
        Err(e) => {
            warn!("No se pudo guardar el prefijo: {}", e);
            say(ctx, msg, messages::prefix_save_failed()).await;
        }
    }
    Ok(())
}

async fn leave(ctx: &Context, msg: &Message, bot: &EnsembleBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let key = session_key(ctx, guild_id);
    if bot.sessions.get(&key).is_none() {
        say(ctx, msg, messages::player_error(&PlayerError::NotConnected)).await;
        return Ok(());
    }

    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow::anyhow!("songbird no inicializado"))?;
    if let Err(e) = manager.remove(guild_id).await {
        warn!("Error al salir del canal de voz: {:?}", e);
    }
    bot.sessions.remove(&key);

    say(ctx, msg, messages::left_channel()).await;
    Ok(())
}

async fn help(ctx: &Context, msg: &Message, bot: &EnsembleBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let prefix = bot
        .prefixes
        .get(
            &bot.identity.nickname,
            guild_id.get(),
            &bot.identity.default_prefix,
        )
        .await;
    say(ctx, msg, messages::help(&prefix)).await;
    Ok(())
}
