use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::{
    audio::{AudioBuffer, AudioDecoder},
    fetch::{media_url, Fetcher},
    HuesError, Result,
};

/// Fetches `Songs/<track>.<format>` for each format in order and returns the
/// first one that both fetches and decodes. Failures of earlier formats are
/// logged and skipped; only exhausting the list is an error.
pub async fn fetch_track<F: Fetcher>(
    fetcher: &F,
    decoder: &dyn AudioDecoder,
    pack: &Url,
    track: &str,
    formats: &[String],
) -> Result<Arc<AudioBuffer>> {
    for format in formats {
        let url = media_url(pack, "Songs", &format!("{track}.{format}"))?;
        match fetcher.fetch(&url).await {
            Ok(response) if response.is_success() => match decoder.decode(response.body, format) {
                Ok(buffer) => {
                    debug!(track, %format, duration = buffer.duration(), "decoded track");
                    return Ok(Arc::new(buffer));
                }
                Err(err) => warn!(track, %format, error = %err, "track failed to decode"),
            },
            Ok(response) => warn!(
                track,
                %format,
                status = response.status,
                reason = %response.reason,
                "track failed to load"
            ),
            Err(err) => warn!(track, %format, error = %err, "track failed to load"),
        }
    }

    Err(HuesError::UnsupportedTrack {
        track: track.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fetch::{MemoryFetcher, Response},
        testing::{formats, put_track, test_pack_url, SecondsDecoder},
    };
    use approx::assert_relative_eq;

    #[tokio::test]
    async fn falls_back_to_last_format() {
        let pack = test_pack_url("Fallback");
        let mut fetcher = MemoryFetcher::new();
        put_track(&mut fetcher, &pack, "loop_Song", "mp3", 3.0);

        let buffer = fetch_track(&fetcher, &SecondsDecoder, &pack, "loop_Song", &formats())
            .await
            .unwrap();
        assert_relative_eq!(buffer.duration(), 3.0);

        let tried: Vec<String> = fetcher
            .requests()
            .iter()
            .map(|url| url.path().rsplit('.').next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(tried, vec!["opus", "ogg", "mp3"]);
    }

    #[tokio::test]
    async fn decode_failure_advances_to_next_format() {
        let pack = test_pack_url("Fallback");
        let mut fetcher = MemoryFetcher::new();
        let opus = media_url(&pack, "Songs", "loop_Song.opus").unwrap();
        fetcher.insert(&opus, "not a number");
        put_track(&mut fetcher, &pack, "loop_Song", "ogg", 2.0);
        put_track(&mut fetcher, &pack, "loop_Song", "mp3", 9.0);

        let buffer = fetch_track(&fetcher, &SecondsDecoder, &pack, "loop_Song", &formats())
            .await
            .unwrap();
        assert_relative_eq!(buffer.duration(), 2.0);
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn exhausting_formats_is_an_error() {
        let pack = test_pack_url("Fallback");
        let mut fetcher = MemoryFetcher::new();
        let ogg = media_url(&pack, "Songs", "loop_Song.ogg").unwrap();
        fetcher.insert_response(&ogg, Response::with_status(500, "Internal Server Error"));

        let err = fetch_track(&fetcher, &SecondsDecoder, &pack, "loop_Song", &formats())
            .await
            .unwrap_err();
        assert!(matches!(err, HuesError::UnsupportedTrack { ref track } if track == "loop_Song"));
    }
}
