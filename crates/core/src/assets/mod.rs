//! Resource pack data model: hues, songs, images and the pack that owns them.

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{audio::AudioBuffer, HuesError, Result};

pub mod manifest;
pub mod xml;

/// The three entity lists a resource pack may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Hues,
    Songs,
    Images,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Hues => "hues",
            Category::Songs => "songs",
            Category::Images => "images",
        })
    }
}

/// A named color. The hex form is always `#`-prefixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hue {
    pub name: String,
    pub hex: String,
    pub rgb: [f32; 3],
}

impl Hue {
    /// Parses a six digit hex color, with or without the leading `#`.
    pub fn parse(name: impl Into<String>, value: &str) -> Result<Self> {
        let name = name.into();
        let trimmed = value.trim();
        let hex = if trimmed.starts_with('#') {
            trimmed.to_string()
        } else {
            format!("#{trimmed}")
        };

        let digits = &hex[1..];
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HuesError::InvalidColor {
                name,
                value: value.to_string(),
            });
        }

        let mut rgb = [0.0; 3];
        for (channel, slot) in rgb.iter_mut().enumerate() {
            let start = channel * 2;
            let byte = u8::from_str_radix(&digits[start..start + 2], 16).map_err(|_| {
                HuesError::InvalidColor {
                    name: name.clone(),
                    value: value.to_string(),
                }
            })?;
            *slot = f32::from(byte) / 255.0;
        }

        Ok(Self { name, hex, rgb })
    }
}

/// A playable song: a looping section and an optional lead-in.
#[derive(Debug, Clone)]
pub struct Song {
    pub title: String,
    pub source: Option<String>,
    pub loop_name: String,
    pub buildup_name: Option<String>,
    pub rhythm: String,
    pub buildup_rhythm: Option<String>,
    pub chars_per_beat: Option<u32>,
    pub loop_buffer: Arc<AudioBuffer>,
    pub buildup_buffer: Option<Arc<AudioBuffer>>,
}

impl Song {
    /// Number of beats in one traversal of the loop.
    pub fn loop_beats(&self) -> usize {
        self.rhythm.chars().count()
    }

    /// Length of a beat in seconds: the loop duration spread over its rhythm.
    pub fn beat_duration(&self) -> f64 {
        self.loop_buffer.duration() / self.loop_beats().max(1) as f64
    }

    /// Duration of the buildup, zero when the song has none.
    pub fn buildup_duration(&self) -> f64 {
        self.buildup_buffer
            .as_ref()
            .map(|buffer| buffer.duration())
            .unwrap_or(0.0)
    }

    /// Returns the buildup rhythm padded with `.` until every beat that
    /// starts inside the buildup has a character, or synthesised entirely when
    /// the manifest had none. Songs without a buildup track yield `None`.
    pub fn padded_buildup_rhythm(&self, beat_duration: f64) -> Option<String> {
        let buildup = self.buildup_buffer.as_ref()?;
        let beats = if beat_duration > 0.0 {
            // Tolerate float noise so exact multiples don't gain a beat.
            (buildup.duration() / beat_duration - 1e-9).ceil().max(0.0) as usize
        } else {
            0
        };

        let mut rhythm = self.buildup_rhythm.clone().unwrap_or_default();
        let current = rhythm.chars().count();
        if current < beats {
            rhythm.extend(std::iter::repeat('.').take(beats - current));
        }
        Some(rhythm)
    }
}

/// One decoded-on-demand image file.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub url: Url,
    pub bytes: Arc<[u8]>,
}

impl ImageFrame {
    pub fn new(url: Url, bytes: Vec<u8>) -> Self {
        Self {
            url,
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ImageMedia {
    Single(ImageFrame),
    Animation(Vec<ImageFrame>),
}

#[derive(Debug, Clone)]
pub struct Image {
    pub name: String,
    pub full_name: Option<String>,
    pub align: Option<String>,
    pub center_pixel: Option<i32>,
    pub beats_per_anim: Option<u32>,
    pub frame_duration: Option<Duration>,
    pub media: ImageMedia,
}

impl Image {
    /// Frames in display order; a still image has exactly one.
    pub fn frames(&self) -> &[ImageFrame] {
        match &self.media {
            ImageMedia::Single(frame) => std::slice::from_ref(frame),
            ImageMedia::Animation(frames) => frames,
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self.media, ImageMedia::Animation(_))
    }
}

/// A fully loaded resource pack. A `None` category means the pack has no
/// manifest for it, which is different from an empty manifest.
#[derive(Debug, Clone)]
pub struct ResourcePack {
    pub url: Url,
    pub name: String,
    pub metadata: BTreeMap<String, String>,
    pub hues: Option<Vec<Arc<Hue>>>,
    pub songs: Option<Vec<Arc<Song>>>,
    pub images: Option<Vec<Arc<Image>>>,
}

impl ResourcePack {
    pub fn author(&self) -> Option<&str> {
        self.metadata.get("author").map(String::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.get("description").map(String::as_str)
    }

    pub fn link(&self) -> Option<&str> {
        self.metadata.get("link").map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn song(rhythm: &str, buildup_rhythm: Option<&str>, buildup_seconds: Option<f64>) -> Song {
        Song {
            title: "Test".to_string(),
            source: None,
            loop_name: "loop_test".to_string(),
            buildup_name: buildup_seconds.map(|_| "build_test".to_string()),
            rhythm: rhythm.to_string(),
            buildup_rhythm: buildup_rhythm.map(str::to_string),
            chars_per_beat: None,
            loop_buffer: Arc::new(AudioBuffer::silence(4.0, 100, 1)),
            buildup_buffer: buildup_seconds.map(|s| Arc::new(AudioBuffer::silence(s, 100, 1))),
        }
    }

    #[test]
    fn parses_hex_with_and_without_prefix() {
        let red = Hue::parse("Red", "#FF0000").unwrap();
        assert_eq!(red.hex, "#FF0000");
        assert_relative_eq!(red.rgb[0], 1.0);
        assert_relative_eq!(red.rgb[1], 0.0);

        let teal = Hue::parse("Teal", " 00ff80 ").unwrap();
        assert_eq!(teal.hex, "#00ff80");
        assert_relative_eq!(teal.rgb[2], 128.0 / 255.0);
    }

    #[test]
    fn rejects_malformed_colors() {
        let err = Hue::parse("Broken", "#12345").unwrap_err();
        assert!(format!("{err}").contains("Broken"));
        assert!(Hue::parse("Bad", "zzzzzz").is_err());
    }

    #[test]
    fn beat_duration_spreads_loop_over_rhythm() {
        let song = song("x---", None, None);
        assert_relative_eq!(song.beat_duration(), 1.0);
        assert_relative_eq!(song.beat_duration() * song.loop_beats() as f64, 4.0);
    }

    #[test]
    fn pads_short_buildup_rhythm() {
        let song = song("x---", Some("x"), Some(3.0));
        assert_eq!(song.padded_buildup_rhythm(1.0).as_deref(), Some("x.."));
    }

    #[test]
    fn synthesises_missing_buildup_rhythm() {
        let song = song("x---", None, Some(2.0));
        assert_eq!(song.padded_buildup_rhythm(1.0).as_deref(), Some(".."));
        assert_eq!(song.padded_buildup_rhythm(0.5).as_deref(), Some("...."));
    }

    #[test]
    fn partial_trailing_beat_gets_a_character() {
        let song = song("x---", Some("o"), Some(2.5));
        assert_eq!(song.padded_buildup_rhythm(1.0).as_deref(), Some("o.."));
    }

    #[test]
    fn leaves_long_buildup_rhythm_untouched() {
        let song = song("x---", Some("x-o-x-"), Some(2.0));
        assert_eq!(song.padded_buildup_rhythm(1.0).as_deref(), Some("x-o-x-"));
        assert_eq!(self::song("x", None, None).padded_buildup_rhythm(1.0), None);
    }
}
