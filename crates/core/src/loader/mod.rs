//! Resource pack loading.
//!
//! A pack is loaded as one info fetch followed by three concurrent
//! sub-pipelines (hues, songs, images). Within the song and image pipelines
//! every entity's media is fetched concurrently as well. All of it runs as
//! one structured future: the pack resolves once every branch has settled,
//! and the first failure fails the whole pack.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};
use url::Url;

use crate::{
    assets::{
        manifest::{self, ImageEntry, Manifest, SongEntry},
        Hue, Image, ImageFrame, ImageMedia, ResourcePack, Song,
    },
    audio::AudioDecoder,
    fetch::{media_url, pack_url, Fetcher},
    HuesError, Result,
};

mod animation;
mod track;

pub use animation::probe_animation;
pub use track::fetch_track;

/// Progress delta: `added` units of work appeared, `completed` finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadProgress {
    pub completed: usize,
    pub added: usize,
}

impl LoadProgress {
    pub fn added(units: usize) -> Self {
        Self {
            completed: 0,
            added: units,
        }
    }

    pub fn completed(units: usize) -> Self {
        Self {
            completed: units,
            added: 0,
        }
    }
}

#[derive(Clone, Copy)]
struct PackContext<'p> {
    url: &'p Url,
    name: &'p str,
}

/// Loads packs through a [`Fetcher`], decoding tracks with an
/// [`AudioDecoder`] and trying `track_formats` in order.
pub struct AssetLoader<'a, F> {
    fetcher: &'a F,
    decoder: &'a dyn AudioDecoder,
    track_formats: &'a [String],
}

impl<'a, F: Fetcher> AssetLoader<'a, F> {
    pub fn new(fetcher: &'a F, decoder: &'a dyn AudioDecoder, track_formats: &'a [String]) -> Self {
        Self {
            fetcher,
            decoder,
            track_formats,
        }
    }

    pub async fn load(&self, url: &Url, progress: &dyn Fn(LoadProgress)) -> Result<ResourcePack> {
        let url = pack_url(url)?;
        info!(%url, "loading respack");

        let metadata = self
            .fetch_manifest(&url, Manifest::Info)
            .await?
            .map(|text| manifest::parse_info(&text))
            .transpose()?
            .unwrap_or_default();
        let name = metadata
            .get("name")
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| name_from_url(&url));
        info!(respack = %name, "loaded respack info");

        let pack = PackContext {
            url: &url,
            name: &name,
        };
        let (hues, songs, images) = futures::try_join!(
            self.load_hues(pack),
            self.load_songs(pack, progress),
            self.load_images(pack, progress),
        )?;

        info!(respack = %name, "all content from respack has loaded");
        Ok(ResourcePack {
            url: url.clone(),
            name,
            metadata,
            hues,
            songs,
            images,
        })
    }

    /// Fetches a manifest's text. A missing optional manifest yields `None`;
    /// any other unsuccessful status is an error.
    async fn fetch_manifest(&self, pack: &Url, manifest: Manifest) -> Result<Option<String>> {
        let response = self.fetcher.fetch(&pack.join(manifest.file_name())?).await?;
        if response.is_not_found() && manifest.is_optional() {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(HuesError::ManifestStatus {
                manifest: manifest.file_name(),
                status: response.status,
                reason: response.reason,
            });
        }
        response.into_text().map(Some)
    }

    async fn load_hues(&self, pack: PackContext<'_>) -> Result<Option<Vec<Arc<Hue>>>> {
        let Some(text) = self.fetch_manifest(pack.url, Manifest::Hues).await? else {
            info!(respack = pack.name, "respack contains no hues");
            return Ok(None);
        };

        let hues: Vec<_> = manifest::parse_hues(&text)?
            .into_iter()
            .map(Arc::new)
            .collect();
        info!(respack = pack.name, count = hues.len(), "loaded hues");
        Ok(Some(hues))
    }

    async fn load_songs(
        &self,
        pack: PackContext<'_>,
        progress: &dyn Fn(LoadProgress),
    ) -> Result<Option<Vec<Arc<Song>>>> {
        let Some(text) = self.fetch_manifest(pack.url, Manifest::Songs).await? else {
            info!(respack = pack.name, "respack contains no songs");
            return Ok(None);
        };

        let loads = manifest::parse_songs(&text)?.into_iter().map(move |entry| {
            progress(LoadProgress::added(1));
            async move {
                let song = self.load_song(pack, entry).await?;
                progress(LoadProgress::completed(1));
                Ok::<_, HuesError>(Arc::new(song))
            }
        });
        let songs = try_join_all(loads).await?;

        info!(respack = pack.name, count = songs.len(), "loaded songs");
        Ok(Some(songs))
    }

    async fn load_song(&self, pack: PackContext<'_>, entry: SongEntry) -> Result<Song> {
        let looped = fetch_track(
            self.fetcher,
            self.decoder,
            pack.url,
            &entry.loop_name,
            self.track_formats,
        );
        let buildup = async {
            match entry.buildup.as_deref() {
                Some(name) => {
                    fetch_track(self.fetcher, self.decoder, pack.url, name, self.track_formats)
                        .await
                        .map(Some)
                }
                None => Ok(None),
            }
        };
        let (loop_buffer, buildup_buffer) = futures::try_join!(looped, buildup)?;
        debug!(respack = pack.name, song = %entry.title, "loaded song media");

        Ok(Song {
            title: entry.title,
            source: entry.source,
            loop_name: entry.loop_name,
            buildup_name: entry.buildup,
            rhythm: entry.rhythm,
            buildup_rhythm: entry.buildup_rhythm,
            chars_per_beat: entry.chars_per_beat,
            loop_buffer,
            buildup_buffer,
        })
    }

    async fn load_images(
        &self,
        pack: PackContext<'_>,
        progress: &dyn Fn(LoadProgress),
    ) -> Result<Option<Vec<Arc<Image>>>> {
        let Some(text) = self.fetch_manifest(pack.url, Manifest::Images).await? else {
            info!(respack = pack.name, "respack has no images");
            return Ok(None);
        };

        let loads = manifest::parse_images(&text)?.into_iter().map(move |entry| {
            progress(LoadProgress::added(1));
            async move {
                let image = self.load_image(pack, entry).await?;
                progress(LoadProgress::completed(1));
                Ok::<_, HuesError>(Arc::new(image))
            }
        });
        let images = try_join_all(loads).await?;

        info!(respack = pack.name, count = images.len(), "loaded images");
        Ok(Some(images))
    }

    async fn load_image(&self, pack: PackContext<'_>, entry: ImageEntry) -> Result<Image> {
        let media = if entry.frame_duration.is_some() {
            ImageMedia::Animation(
                probe_animation(self.fetcher, pack.url, pack.name, &entry.name).await?,
            )
        } else {
            ImageMedia::Single(self.fetch_still(pack, &entry.name).await?)
        };

        Ok(Image {
            name: entry.name,
            full_name: entry.full_name,
            align: entry.align,
            center_pixel: entry.center_pixel,
            beats_per_anim: entry.beats_per_anim,
            frame_duration: entry.frame_duration,
            media,
        })
    }

    async fn fetch_still(&self, pack: PackContext<'_>, image: &str) -> Result<ImageFrame> {
        let url = media_url(pack.url, "Images", &format!("{image}.png"))?;
        let response = self.fetcher.fetch(&url).await?;
        if !response.is_success() {
            return Err(HuesError::ImageFetch {
                image: image.to_string(),
                respack: pack.name.to_string(),
                status: response.status,
                reason: response.reason,
            });
        }
        Ok(ImageFrame::new(url, response.body))
    }
}

/// Fallback name for packs whose info manifest carries none: the directory
/// name for local packs, the last path segment otherwise.
fn name_from_url(url: &Url) -> String {
    if let Some(name) = url
        .to_file_path()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
    {
        return name;
    }
    url.path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
        .map(str::to_string)
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{
        fetch::{MemoryFetcher, Response},
        testing::{formats, put, put_demo_pack, test_pack_url, SecondsDecoder},
    };
    use approx::assert_relative_eq;

    async fn load(fetcher: &MemoryFetcher, url: &Url) -> (Result<ResourcePack>, LoadProgress) {
        let formats = formats();
        let loader = AssetLoader::new(fetcher, &SecondsDecoder, &formats);
        let added = Cell::new(0);
        let completed = Cell::new(0);
        let result = loader
            .load(url, &|p: LoadProgress| {
                added.set(added.get() + p.added);
                completed.set(completed.get() + p.completed);
            })
            .await;
        (
            result,
            LoadProgress {
                completed: completed.get(),
                added: added.get(),
            },
        )
    }

    #[tokio::test]
    async fn loads_complete_pack() {
        let url = test_pack_url("Demo");
        let mut fetcher = MemoryFetcher::new();
        put_demo_pack(&mut fetcher, &url, "Demo");

        let (pack, progress) = load(&fetcher, &url).await;
        let pack = pack.unwrap();

        assert_eq!(pack.name, "Demo");
        assert_eq!(pack.author(), Some("Tester"));
        assert_eq!(pack.hues.as_ref().map(Vec::len), Some(3));

        let songs = pack.songs.as_ref().unwrap();
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].title, "Alpha");
        assert_relative_eq!(songs[0].loop_buffer.duration(), 4.0);
        assert!(songs[0].buildup_buffer.is_none());
        assert_relative_eq!(songs[1].buildup_duration(), 2.0);

        let images = pack.images.as_ref().unwrap();
        assert_eq!(images.len(), 5);
        assert!(!images[0].is_animated());
        let dance = images.iter().find(|image| image.name == "Dance").unwrap();
        assert_eq!(dance.frames().len(), 3);

        assert_eq!(progress.added, songs.len() + images.len());
        assert_eq!(progress.completed, songs.len() + images.len());
    }

    #[tokio::test]
    async fn missing_category_manifests_are_not_errors() {
        let url = test_pack_url("Sparse");
        let mut fetcher = MemoryFetcher::new();
        put(&mut fetcher, &url, "info.xml", "<info><name>Sparse</name></info>");
        put(
            &mut fetcher,
            &url,
            "hues.xml",
            r##"<hues><hue name="Red">#FF0000</hue></hues>"##,
        );
        put(&mut fetcher, &url, "images.xml", "<images></images>");

        let (pack, progress) = load(&fetcher, &url).await;
        let pack = pack.unwrap();
        assert_eq!(pack.hues.as_ref().map(Vec::len), Some(1));
        assert!(pack.songs.is_none());
        assert_eq!(pack.images.as_ref().map(Vec::len), Some(0));
        assert_eq!(progress, LoadProgress::default());
    }

    #[tokio::test]
    async fn missing_info_is_fatal() {
        let url = test_pack_url("Nothing");
        let fetcher = MemoryFetcher::new();

        let (result, _) = load(&fetcher, &url).await;
        let err = result.unwrap_err();
        assert!(matches!(err, HuesError::ManifestStatus { manifest: "info.xml", status: 404, .. }));
    }

    #[tokio::test]
    async fn server_error_on_category_manifest_is_fatal() {
        let url = test_pack_url("Broken");
        let mut fetcher = MemoryFetcher::new();
        put(&mut fetcher, &url, "info.xml", "<info><name>Broken</name></info>");
        fetcher.insert_response(
            &url.join("songs.xml").unwrap(),
            Response::with_status(500, "Internal Server Error"),
        );

        let (result, _) = load(&fetcher, &url).await;
        let err = result.unwrap_err();
        assert!(format!("{err}").contains("songs.xml: 500"));
    }

    #[tokio::test]
    async fn one_undecodable_song_fails_the_pack() {
        let url = test_pack_url("Demo");
        let mut fetcher = MemoryFetcher::new();
        put_demo_pack(&mut fetcher, &url, "Demo");
        put(
            &mut fetcher,
            &url,
            "songs.xml",
            r#"<songs><song name="loop_Missing"><rhythm>x.</rhythm></song></songs>"#,
        );

        let (result, _) = load(&fetcher, &url).await;
        assert!(matches!(result.unwrap_err(), HuesError::UnsupportedTrack { .. }));
    }

    #[tokio::test]
    async fn unnamed_pack_takes_its_directory_name() {
        let url = Url::parse("file:///respacks/Nameless%20Pack").unwrap();
        let mut fetcher = MemoryFetcher::new();
        put(&mut fetcher, &pack_url(&url).unwrap(), "info.xml", "<info/>");

        let (pack, _) = load(&fetcher, &url).await;
        assert_eq!(pack.unwrap().name, "Nameless Pack");
    }
}
