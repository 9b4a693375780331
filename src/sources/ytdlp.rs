use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{MetadataResolver, TrackMetadata};
use crate::error::{PlaybackError, PlaybackResult};

/// Resolves queries by shelling out to yt-dlp.
pub struct YtDlpResolver {
    binary: String,
    timeout: Duration,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    is_live: Option<bool>,
    entries: Option<Vec<YtDlpInfo>>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            rate_limiter: Semaphore::new(3),
        }
    }

    /// URLs pass through; anything else becomes a single-result YouTube search.
    pub fn search_target(query: &str) -> String {
        let query = query.trim();
        match url::Url::parse(query) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => query.to_string(),
            _ => format!("ytsearch1:{}", query),
        }
    }

    /// Parses `--dump-json` output, taking the first entry of playlists and searches.
    fn parse_output(stdout: &str) -> PlaybackResult<TrackMetadata> {
        let line = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| PlaybackError::Resolution("yt-dlp no devolvió resultados".into()))?;

        let mut info: YtDlpInfo = serde_json::from_str(line).map_err(|e| {
            PlaybackError::Resolution(format!("respuesta de yt-dlp inválida: {}", e))
        })?;

        if let Some(entries) = info.entries.take() {
            info = entries
                .into_iter()
                .next()
                .ok_or_else(|| PlaybackError::Resolution("la playlist está vacía".into()))?;
        }

        Self::info_to_metadata(info)
    }

    fn info_to_metadata(info: YtDlpInfo) -> PlaybackResult<TrackMetadata> {
        let stream_url = info
            .url
            .ok_or_else(|| PlaybackError::Resolution("sin URL de stream".into()))?;

        let duration = match info.is_live {
            Some(true) => None,
            _ => info
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(Duration::from_secs_f64),
        };

        Ok(TrackMetadata {
            title: info.title.unwrap_or_else(|| "Desconocido".to_string()),
            stream_url,
            url: info.webpage_url,
            duration,
            thumbnail: info.thumbnail,
        })
    }
}

#[async_trait]
impl MetadataResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> PlaybackResult<TrackMetadata> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| PlaybackError::Resolution(e.to_string()))?;

        let target = Self::search_target(query);
        info!("🔍 Resolviendo: {}", target);

        let output = Command::new(&self.binary)
            .args([
                "--dump-json",
                "--no-playlist",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                target.as_str(),
            ])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| {
                warn!("⏱️ yt-dlp excedió {}s para {}", self.timeout.as_secs(), target);
                PlaybackError::Resolution("tiempo de espera agotado".into())
            })?
            .map_err(|e| PlaybackError::Resolution(format!("error al ejecutar yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(PlaybackError::Resolution(format!(
                "yt-dlp error: {}",
                error.trim()
            )));
        }

        let metadata = Self::parse_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!("✅ Resuelto: {} ({:?})", metadata.title, metadata.duration);
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_target() {
        assert_eq!(
            YtDlpResolver::search_target("https://youtu.be/dQw4w9WgXcQ"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(
            YtDlpResolver::search_target("  never gonna give you up "),
            "ytsearch1:never gonna give you up"
        );
        assert_eq!(
            YtDlpResolver::search_target("ftp://example.com/a.mp3"),
            "ytsearch1:ftp://example.com/a.mp3"
        );
    }

    #[test]
    fn test_parse_single_video() {
        let json = r#"{"title":"Song","url":"https://rr1.googlevideo.com/a","webpage_url":"https://www.youtube.com/watch?v=x","duration":212.0,"thumbnail":"https://i.ytimg.com/x.jpg"}"#;
        let meta = YtDlpResolver::parse_output(json).unwrap();

        assert_eq!(
            meta,
            TrackMetadata {
                title: "Song".into(),
                stream_url: "https://rr1.googlevideo.com/a".into(),
                url: Some("https://www.youtube.com/watch?v=x".into()),
                duration: Some(Duration::from_secs(212)),
                thumbnail: Some("https://i.ytimg.com/x.jpg".into()),
            }
        );
    }

    #[test]
    fn test_parse_takes_first_playlist_entry() {
        let json = r#"{"title":"Playlist","entries":[{"title":"First","url":"https://a/1"},{"title":"Second","url":"https://a/2"}]}"#;
        let meta = YtDlpResolver::parse_output(json).unwrap();
        assert_eq!(meta.title, "First");
        assert_eq!(meta.stream_url, "https://a/1");
    }

    #[test]
    fn test_parse_live_stream_has_no_duration() {
        let json = r#"{"title":"Radio","url":"https://a/live.m3u8","duration":0,"is_live":true}"#;
        let meta = YtDlpResolver::parse_output(json).unwrap();
        assert_eq!(meta.duration, None);
    }

    #[test]
    fn test_parse_failures_are_resolution_errors() {
        assert!(matches!(
            YtDlpResolver::parse_output(""),
            Err(PlaybackError::Resolution(_))
        ));
        assert!(matches!(
            YtDlpResolver::parse_output("not json"),
            Err(PlaybackError::Resolution(_))
        ));
        assert!(matches!(
            YtDlpResolver::parse_output(r#"{"title":"No stream"}"#),
            Err(PlaybackError::Resolution(_))
        ));
        assert!(matches!(
            YtDlpResolver::parse_output(r#"{"entries":[]}"#),
            Err(PlaybackError::Resolution(_))
        ));
    }
}
