use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::player::PlayerSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,

    // Reproductor
    pub idle_timeout_secs: u64,
    pub command_buffer: usize,

    // yt-dlp
    pub ytdlp_path: String,
    pub resolve_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Reproductor
            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            command_buffer: std::env::var("COMMAND_BUFFER")
                .unwrap_or_else(|_| "64".to_string())
                .parse()?,

            // yt-dlp
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Queue size, idle timeout, command buffer and resolve timeout must be > 0
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 1.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.command_buffer == 0 {
            anyhow::bail!("Command buffer must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, {} max queue\n  \
            Player: {}s idle timeout, {} command buffer\n  \
            yt-dlp: {} ({}s timeout)",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.idle_timeout_secs,
            self.command_buffer,
            self.ytdlp_path,
            self.resolve_timeout_secs
        )
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            default_volume: self.default_volume,
            max_queue_size: self.max_queue_size,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            command_buffer: self.command_buffer,
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,

            idle_timeout_secs: 60,
            command_buffer: 64,

            ytdlp_path: "yt-dlp".to_string(),
            resolve_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let loud = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(loud.validate().is_err());

        let no_queue = Config {
            max_queue_size: 0,
            ..Config::default()
        };
        assert!(no_queue.validate().is_err());

        let no_timeout = Config {
            idle_timeout_secs: 0,
            ..Config::default()
        };
        assert!(no_timeout.validate().is_err());

        let no_buffer = Config {
            command_buffer: 0,
            ..Config::default()
        };
        assert!(no_buffer.validate().is_err());
    }

    #[test]
    fn test_player_settings_projection() {
        let config = Config {
            default_volume: 0.8,
            max_queue_size: 20,
            idle_timeout_secs: 90,
            command_buffer: 8,
            ..Config::default()
        };

        let settings = config.player_settings();
        assert_eq!(settings.default_volume, 0.8);
        assert_eq!(settings.max_queue_size, 20);
        assert_eq!(settings.idle_timeout, Duration::from_secs(90));
        assert_eq!(settings.command_buffer, 8);
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: "secret-token".to_string(),
            ..Config::default()
        };

        let summary = config.summary();
        assert!(!summary.contains("secret-token"));
        assert!(summary.contains("Guild: global"));
    }
}
