use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::player::PlayerState,
    bot::JukeboxBot,
    error::PlaybackError,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Las notificaciones del reproductor van al último canal usado
    bot.notifier.set_channel(guild_id, command.channel_id);

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await?,
        "loopqueue" => handle_loopqueue(ctx, &command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await?,
        "disconnect" => handle_disconnect(ctx, &command, bot, guild_id).await?,
        _ => respond(ctx, &command, "❌ Comando no reconocido", true).await?,
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Verificar que el usuario esté en un canal de voz
    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, command, "❌ Debes estar en un canal de voz", true).await;
    };

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // La búsqueda puede tardar; el canal de voz se une justo antes de encolar
    let voice = bot.voice(guild_id);
    match bot
        .registry
        .enqueue_query(
            guild_id,
            bot.resolver.as_ref(),
            query,
            command.user.id,
            &voice,
            voice_channel_id,
        )
        .await
    {
        Ok((track, position)) => {
            let embed = embeds::create_track_added_embed(&track, position);
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
        }
        Err(e) => reject_deferred(ctx, command, &e).await?,
    }

    Ok(())
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id) else {
        return respond(ctx, command, "❌ No hay nada reproduciéndose", true).await;
    };

    match session.controller.skip().await {
        Ok(()) => respond(ctx, command, "⏭️ Canción saltada", false).await,
        Err(e) => reject(ctx, command, &e).await,
    }
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id) else {
        return respond(ctx, command, "❌ No hay nada reproduciéndose", true).await;
    };

    match session.controller.pause().await {
        Ok(()) => respond(ctx, command, "⏸️ Reproducción pausada", false).await,
        Err(e) => reject(ctx, command, &e).await,
    }
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id) else {
        return respond(ctx, command, "❌ No hay nada en pausa", true).await;
    };

    match session.controller.resume().await {
        Ok(()) => respond(ctx, command, "▶️ Reproducción reanudada", false).await,
        Err(e) => reject(ctx, command, &e).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id) else {
        return respond(ctx, command, "❌ El bot no está conectado", true).await;
    };

    match session.controller.stop(true).await {
        Ok(()) => {
            respond(
                ctx,
                command,
                "⏹️ Reproducción detenida y cola limpiada",
                false,
            )
            .await
        }
        Err(e) => reject(ctx, command, &e).await,
    }
}

async fn handle_disconnect(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id) else {
        return respond(ctx, command, "❌ El bot no está conectado", true).await;
    };

    match session.controller.stop(true).await {
        Ok(()) => respond(ctx, command, "👋 Desconectado del canal de voz", false).await,
        Err(e) => reject(ctx, command, &e).await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let page = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "page")
        .and_then(|opt| opt.value.as_i64())
        .map(|page| page.max(1) as usize)
        .unwrap_or(1);

    let session = bot.registry.get_or_create(guild_id);
    match session.controller.queue_info().await {
        Ok(queue) => {
            let state = session.controller.state();
            let embed = embeds::create_queue_embed(&queue, state, page);
            respond_embed(ctx, command, embed).await
        }
        Err(e) => reject(ctx, command, &e).await,
    }
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id) else {
        return respond(ctx, command, "❌ No hay nada reproduciéndose", true).await;
    };

    let status = match session.controller.status().await {
        Ok(status) => status,
        Err(e) => return reject(ctx, command, &e).await,
    };

    match status.queue.current {
        Some(track) if matches!(status.state, PlayerState::Playing | PlayerState::Paused) => {
            respond_embed(ctx, command, embeds::create_now_playing_embed(&track)).await
        }
        _ => respond(ctx, command, "❌ No hay nada reproduciéndose", true).await,
    }
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let session = bot.registry.get_or_create(guild_id);

    match session.controller.toggle_loop().await {
        Ok(enabled) => {
            let status = if enabled { "activado" } else { "desactivado" };
            respond(
                ctx,
                command,
                &format!("🔂 Loop {} para la canción actual", status),
                false,
            )
            .await
        }
        Err(e) => reject(ctx, command, &e).await,
    }
}

async fn handle_loopqueue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let session = bot.registry.get_or_create(guild_id);

    match session.controller.toggle_loop_queue().await {
        Ok(enabled) => {
            let status = if enabled { "activado" } else { "desactivado" };
            respond(ctx, command, &format!("🔁 Loop de cola {}", status), false).await
        }
        Err(e) => reject(ctx, command, &e).await,
    }
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Nivel de volumen no proporcionado"))?;

    if !(0..=100).contains(&level) {
        return respond(ctx, command, "❌ El volumen debe estar entre 0 y 100", true).await;
    }

    let Some(session) = bot.registry.get(guild_id) else {
        return respond(ctx, command, "❌ No hay nada reproduciéndose", true).await;
    };

    match session.controller.set_volume(level as f32 / 100.0).await {
        Ok(applied) => {
            respond(
                ctx,
                command,
                &format!("🔊 Volumen ajustado a {}%", (applied * 100.0).round() as u32),
                false,
            )
            .await
        }
        Err(e) => reject(ctx, command, &e).await,
    }
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: &str, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

async fn respond_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;

    Ok(())
}

fn rejection_message(error: &PlaybackError) -> String {
    if error.is_user_facing() {
        format!("❌ {}", error)
    } else {
        "❌ Ocurrió un error interno".to_string()
    }
}

async fn reject(ctx: &Context, command: &CommandInteraction, error: &PlaybackError) -> Result<()> {
    warn!("Comando /{} rechazado: {}", command.data.name, error);
    respond(ctx, command, &rejection_message(error), true).await
}

/// Rejections after a defer replace the public placeholder with an
/// ephemeral followup.
async fn reject_deferred(ctx: &Context, command: &CommandInteraction, error: &PlaybackError) -> Result<()> {
    warn!("Comando /{} rechazado: {}", command.data.name, error);
    command.delete_response(&ctx.http).await?;
    command
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .content(rejection_message(error))
                .ephemeral(true),
        )
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_hides_internal_errors() {
        let rejected = PlaybackError::InvalidState {
            operation: "pausar",
            state: PlayerState::Idle,
        };
        assert_eq!(
            rejection_message(&rejected),
            "❌ no se puede pausar mientras el reproductor está inactivo"
        );

        let defect = PlaybackError::ConcurrencyGuard("doble inicio".into());
        assert_eq!(rejection_message(&defect), "❌ Ocurrió un error interno");
    }
}
