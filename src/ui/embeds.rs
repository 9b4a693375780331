use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{player::PlayerState, queue::QueueInfo, track::Track};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Pending tracks listed per queue page.
pub const QUEUE_PAGE_SIZE: usize = 10;

fn duration_label(duration: Option<Duration>) -> String {
    match duration {
        Some(duration) => format_duration(duration),
        None => "🔴 En vivo / desconocida".to_string(),
    }
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title()))
        .color(colors::INFO_BLUE)
        .field("⏱️ Duración", duration_label(track.duration()), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true)
        .field("🔊 Volumen", format!("{}%", (track.volume() * 100.0).round() as u8), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(track.url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Agregada a la Cola")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_label(track.duration()), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true)
        .field("📍 Posición", position.to_string(), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(track.url())
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Se reproducirá automáticamente si no hay música sonando",
        ))
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(queue_info: &QueueInfo, state: PlayerState, page: usize) -> CreateEmbed {
    let queue_page = queue_info.get_page(page, QUEUE_PAGE_SIZE);

    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::MUSIC_PURPLE);

    if queue_info.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &queue_info.current {
        if matches!(state, PlayerState::Playing | PlayerState::Paused) {
            let status = if queue_info.loop_current {
                "🔂"
            } else if state == PlayerState::Paused {
                "⏸️"
            } else {
                "▶️"
            };

            embed = embed.field(
                format!("{} Reproduciendo", status),
                format!(
                    "**{}**\nSolicitado por <@{}>",
                    current.title(),
                    current.requested_by()
                ),
                false,
            );
        }
    }

    if !queue_page.items.is_empty() {
        let mut description = String::new();

        for (i, item) in queue_page.items.iter().enumerate() {
            description.push_str(&queue_line(queue_page.first_position + i, item));
        }

        embed = embed.field(
            format!("Próximas ({} canciones)", queue_info.pending.len()),
            description,
            false,
        );
    }

    let mut info = String::new();
    if queue_info.total_duration > Duration::ZERO {
        info.push_str(&format!(
            "**Duración:** {}",
            format_duration(queue_info.total_duration)
        ));
    }
    if queue_info.loop_queue {
        if !info.is_empty() {
            info.push_str(" • ");
        }
        info.push_str("🔁 **Cola en bucle**");
    }
    if !info.is_empty() {
        embed = embed.field("Información", info, false);
    }

    let footer = if queue_page.remaining > 0 {
        format!(
            "Y {} canciones más... • Página {} de {}",
            queue_page.remaining, queue_page.current_page, queue_page.total_pages
        )
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Una línea de la cola: posición, título, duración, solicitante y hace cuánto se agregó.
fn queue_line(position: usize, item: &Track) -> String {
    let duration = item
        .duration()
        .map(|d| format!(" `[{}]`", format_duration(d)))
        .unwrap_or_default();

    format!(
        "**{}**. {}{}\n   Solicitado por <@{}> • <t:{}:R>\n",
        position,
        item.title(),
        duration,
        item.requested_by(),
        item.added_at().timestamp()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::model::id::UserId;

    #[test]
    fn test_queue_line_shows_when_track_was_added() {
        let track = Track::new("Lofi", "https://cdn.example/lofi", UserId::new(42));
        let line = queue_line(3, &track);

        assert_eq!(
            line,
            format!(
                "**3**. Lofi\n   Solicitado por <@42> • <t:{}:R>\n",
                track.added_at().timestamp()
            )
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(212)), "3:32");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");
    }

    #[test]
    fn test_duration_label_for_live_tracks() {
        assert_eq!(duration_label(None), "🔴 En vivo / desconocida");
        assert_eq!(duration_label(Some(Duration::from_secs(61))), "1:01");
    }
}
