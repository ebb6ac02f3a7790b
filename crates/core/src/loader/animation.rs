use tracing::debug;
use url::Url;

use crate::{
    assets::ImageFrame,
    fetch::{animation_frame_url, Fetcher},
    HuesError, Result,
};

/// Discovers an animation's frames by fetching `<name>_01.png`,
/// `<name>_02.png`, ... until the first one that is not found. Any other
/// failure aborts the probe, and so does a missing first frame.
pub async fn probe_animation<F: Fetcher>(
    fetcher: &F,
    pack: &Url,
    respack: &str,
    image: &str,
) -> Result<Vec<ImageFrame>> {
    let mut frames = Vec::new();

    for frame in 1usize.. {
        let url = animation_frame_url(pack, image, frame)?;
        let response = fetcher.fetch(&url).await?;

        if response.is_not_found() {
            break;
        }
        if !response.is_success() {
            return Err(HuesError::FrameFetch {
                image: image.to_string(),
                respack: respack.to_string(),
                frame,
                status: response.status,
                reason: response.reason,
            });
        }

        frames.push(ImageFrame::new(url, response.body));
    }

    if frames.is_empty() {
        return Err(HuesError::EmptyAnimation {
            image: image.to_string(),
            respack: respack.to_string(),
        });
    }

    debug!(image, frames = frames.len(), "probed animation");
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fetch::{MemoryFetcher, Response},
        testing::{put_frames, test_pack_url},
    };

    #[tokio::test]
    async fn collects_frames_in_ascending_order() {
        let pack = test_pack_url("Anim");
        let mut fetcher = MemoryFetcher::new();
        put_frames(&mut fetcher, &pack, "Dance", 12);

        let frames = probe_animation(&fetcher, &pack, "Anim", "Dance").await.unwrap();
        assert_eq!(frames.len(), 12);
        assert!(frames[0].url.as_str().ends_with("Dance_01.png"));
        assert!(frames[11].url.as_str().ends_with("Dance_12.png"));
        assert_eq!(&*frames[4].bytes, b"frame 5");
        // Twelve frames plus the probe that found nothing.
        assert_eq!(fetcher.requests().len(), 13);
    }

    #[tokio::test]
    async fn missing_first_frame_is_an_error() {
        let pack = test_pack_url("Anim");
        let fetcher = MemoryFetcher::new();

        let err = probe_animation(&fetcher, &pack, "Anim", "Ghost").await.unwrap_err();
        assert!(matches!(err, HuesError::EmptyAnimation { .. }));
    }

    #[tokio::test]
    async fn server_error_mid_animation_is_fatal() {
        let pack = test_pack_url("Anim");
        let mut fetcher = MemoryFetcher::new();
        put_frames(&mut fetcher, &pack, "Dance", 3);
        let broken = animation_frame_url(&pack, "Dance", 2).unwrap();
        fetcher.insert_response(&broken, Response::with_status(503, "Service Unavailable"));

        let err = probe_animation(&fetcher, &pack, "Anim", "Dance").await.unwrap_err();
        assert!(matches!(err, HuesError::FrameFetch { frame: 2, status: 503, .. }));
    }
}
