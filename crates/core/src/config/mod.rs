use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{AutoMode, HuesError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub respacks: RespackConfig,
    pub playback: PlaybackConfig,
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing sections and fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Where resource packs live and which ones load at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespackConfig {
    pub directory: PathBuf,
    /// Absolute base URL; overrides `directory` when set.
    pub base_url: Option<String>,
    pub builtin: String,
    pub default_pack: String,
}

impl Default for RespackConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("respacks"),
            base_url: None,
            builtin: "builtin".to_string(),
            default_pack: "0x40 Hues 5.0 Defaults".to_string(),
        }
    }
}

impl RespackConfig {
    /// Base URL that pack names are resolved against, always ending in `/`.
    pub fn base_url(&self) -> Result<Url> {
        if let Some(base) = &self.base_url {
            return crate::fetch::pack_url(&Url::parse(base)?);
        }
        let directory = std::path::absolute(&self.directory)?;
        Url::from_directory_path(&directory).map_err(|()| {
            HuesError::UnsupportedUrl(directory.display().to_string())
        })
    }

    /// Local directory behind [`Self::base_url`]. Fails for remote bases,
    /// which cannot be listed.
    pub fn local_directory(&self) -> Result<PathBuf> {
        let base = self.base_url()?;
        if base.scheme() != "file" {
            return Err(HuesError::UnsupportedUrl(base.to_string()));
        }
        base.to_file_path()
            .map_err(|()| HuesError::UnsupportedUrl(base.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub default_song: usize,
    /// Image selected after loading; a random one when unset.
    pub default_image: Option<usize>,
    pub auto_mode: AutoMode,
    pub autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_song: 0,
            default_image: None,
            auto_mode: AutoMode::FullAuto,
            autoplay: true,
        }
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Track container formats, tried in order.
    pub track_formats: Vec<String>,
    /// Beat clock ticks per second.
    pub tick_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            track_formats: vec!["opus".to_string(), "ogg".to_string(), "mp3".to_string()],
            tick_rate: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.audio.track_formats, ["opus", "ogg", "mp3"]);
        assert_eq!(config.playback.auto_mode, AutoMode::FullAuto);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "respacks": { "default_pack": "Mine" },
                "playback": { "auto_mode": "normal", "default_image": 2 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.respacks.default_pack, "Mine");
        assert_eq!(config.respacks.builtin, "builtin");
        assert_eq!(config.playback.auto_mode, AutoMode::Normal);
        assert_eq!(config.playback.default_image, Some(2));
        assert!(config.playback.autoplay);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AppConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, HuesError::Config(_)));
    }

    #[test]
    fn explicit_base_url_wins() {
        let respacks = RespackConfig {
            base_url: Some("https://example.com/respacks".to_string()),
            ..RespackConfig::default()
        };
        assert_eq!(respacks.base_url().unwrap().as_str(), "https://example.com/respacks/");

        let local = RespackConfig::default().base_url().unwrap();
        assert_eq!(local.scheme(), "file");
        assert!(local.path().ends_with("/respacks/"));
    }

    #[test]
    fn local_directory_follows_base_url() {
        let default = RespackConfig::default().local_directory().unwrap();
        assert!(default.is_absolute());
        assert!(default.ends_with("respacks"));

        let dir = std::env::temp_dir().join("hues-listing");
        let file_base = RespackConfig {
            base_url: Some(Url::from_directory_path(&dir).unwrap().to_string()),
            ..RespackConfig::default()
        };
        assert_eq!(file_base.local_directory().unwrap(), dir);

        let remote = RespackConfig {
            base_url: Some("https://example.com/respacks".to_string()),
            ..RespackConfig::default()
        };
        assert!(matches!(remote.local_directory(), Err(HuesError::UnsupportedUrl(_))));
    }
}
