//! Interpretation of the four pack manifests (`info.xml`, `hues.xml`,
//! `songs.xml`, `images.xml`).

use std::{collections::BTreeMap, str::FromStr, time::Duration};

use super::{
    xml::{parse_document, XmlElement},
    Hue,
};
use crate::{HuesError, Result};

/// The manifest documents of a pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manifest {
    Info,
    Hues,
    Songs,
    Images,
}

impl Manifest {
    pub fn file_name(self) -> &'static str {
        match self {
            Manifest::Info => "info.xml",
            Manifest::Hues => "hues.xml",
            Manifest::Songs => "songs.xml",
            Manifest::Images => "images.xml",
        }
    }

    fn root(self) -> &'static str {
        match self {
            Manifest::Info => "info",
            Manifest::Hues => "hues",
            Manifest::Songs => "songs",
            Manifest::Images => "images",
        }
    }

    /// A missing optional manifest means the pack lacks that category.
    pub fn is_optional(self) -> bool {
        !matches!(self, Manifest::Info)
    }
}

/// A `<song>` entry before its audio has been fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct SongEntry {
    pub loop_name: String,
    pub title: String,
    pub source: Option<String>,
    pub rhythm: String,
    pub buildup: Option<String>,
    pub buildup_rhythm: Option<String>,
    pub chars_per_beat: Option<u32>,
}

/// An `<image>` entry before its frames have been fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEntry {
    pub name: String,
    pub full_name: Option<String>,
    pub align: Option<String>,
    pub center_pixel: Option<i32>,
    pub frame_duration: Option<Duration>,
    pub beats_per_anim: Option<u32>,
}

/// Flattens the children of `<info>` into a key to text map.
pub fn parse_info(text: &str) -> Result<BTreeMap<String, String>> {
    let root = parse_root(text, Manifest::Info)?;
    Ok(root
        .children
        .iter()
        .map(|child| (child.name.clone(), child.text.trim().to_string()))
        .collect())
}

pub fn parse_hues(text: &str) -> Result<Vec<Hue>> {
    let root = parse_root(text, Manifest::Hues)?;
    root.children_named("hue")
        .map(|node| Hue::parse(node.attribute("name").unwrap_or_default(), &node.text))
        .collect()
}

pub fn parse_songs(text: &str) -> Result<Vec<SongEntry>> {
    let root = parse_root(text, Manifest::Songs)?;
    root.children_named("song").map(song_entry).collect()
}

pub fn parse_images(text: &str) -> Result<Vec<ImageEntry>> {
    let root = parse_root(text, Manifest::Images)?;
    root.children_named("image").map(image_entry).collect()
}

fn parse_root(text: &str, manifest: Manifest) -> Result<XmlElement> {
    let root = parse_document(text)?;
    if root.name != manifest.root() {
        return Err(HuesError::Xml(format!(
            "{} has root <{}>, expected <{}>",
            manifest.file_name(),
            root.name,
            manifest.root()
        )));
    }
    Ok(root)
}

fn song_entry(node: &XmlElement) -> Result<SongEntry> {
    let loop_name = required_name(node)?;
    let title = optional_text(node, "title").unwrap_or_else(|| loop_name.clone());
    // Older packs spell the element `rythm`.
    let rhythm = node
        .child_text("rhythm")
        .or_else(|| node.child_text("rythm"))
        .unwrap_or_default()
        .to_string();
    if rhythm.is_empty() {
        return Err(HuesError::EmptyRhythm { title });
    }

    Ok(SongEntry {
        source: optional_text(node, "source"),
        buildup: optional_text(node, "buildup"),
        buildup_rhythm: optional_text(node, "buildupRhythm"),
        chars_per_beat: optional_number(node, "charsPerBeat", &loop_name)?,
        loop_name,
        title,
        rhythm,
    })
}

fn image_entry(node: &XmlElement) -> Result<ImageEntry> {
    let name = required_name(node)?;
    let frame_duration =
        optional_number::<u64>(node, "frameDuration", &name)?.map(Duration::from_millis);

    Ok(ImageEntry {
        full_name: optional_text(node, "fullname"),
        align: optional_text(node, "align"),
        center_pixel: optional_number(node, "centerPixel", &name)?,
        beats_per_anim: optional_number(node, "beatsPerAnim", &name)?,
        frame_duration,
        name,
    })
}

fn required_name(node: &XmlElement) -> Result<String> {
    node.attribute("name")
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| HuesError::Xml(format!("<{}> without a name attribute", node.name)))
}

fn optional_text(node: &XmlElement, field: &str) -> Option<String> {
    node.child_text(field)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn optional_number<T: FromStr>(node: &XmlElement, field: &str, owner: &str) -> Result<Option<T>> {
    match node.child_text(field).filter(|text| !text.is_empty()) {
        Some(text) => text.parse().map(Some).map_err(|_| {
            HuesError::msg(format!("invalid {field} `{text}` for `{owner}`"))
        }),
        None => Ok(None),
    }
}
