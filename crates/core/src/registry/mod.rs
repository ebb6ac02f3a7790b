use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{
    assets::{Category, Hue, Image, ResourcePack, Song},
    HuesError, Result,
};

/// Loaded packs by name, plus the active hue, song and image lists that
/// playback and effects draw from.
#[derive(Debug, Default)]
pub struct RespackRegistry {
    packs: HashMap<String, ResourcePack>,
    hues: Vec<Arc<Hue>>,
    songs: Vec<Arc<Song>>,
    images: Vec<Arc<Image>>,
}

impl RespackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pack, replacing any earlier pack of the same name.
    pub fn insert(&mut self, pack: ResourcePack) {
        self.packs.insert(pack.name.clone(), pack);
    }

    pub fn get(&self, name: &str) -> Option<&ResourcePack> {
        self.packs.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.packs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn hues(&self) -> &[Arc<Hue>] {
        &self.hues
    }

    pub fn songs(&self) -> &[Arc<Song>] {
        &self.songs
    }

    pub fn images(&self) -> &[Arc<Image>] {
        &self.images
    }

    /// Adds hues from `respack` (all of them, or those at `indices`) to the
    /// active list, skipping ones already present.
    pub fn add_hues(&mut self, respack: &str, indices: Option<&[usize]>) -> Result<()> {
        let pack = lookup(&self.packs, respack)?;
        add_from(&mut self.hues, pack.hues.as_deref(), respack, Category::Hues, indices)
    }

    pub fn add_songs(&mut self, respack: &str, indices: Option<&[usize]>) -> Result<()> {
        let pack = lookup(&self.packs, respack)?;
        add_from(&mut self.songs, pack.songs.as_deref(), respack, Category::Songs, indices)
    }

    pub fn add_images(&mut self, respack: &str, indices: Option<&[usize]>) -> Result<()> {
        let pack = lookup(&self.packs, respack)?;
        add_from(&mut self.images, pack.images.as_deref(), respack, Category::Images, indices)
    }
}

fn lookup<'p>(packs: &'p HashMap<String, ResourcePack>, name: &str) -> Result<&'p ResourcePack> {
    packs
        .get(name)
        .ok_or_else(|| HuesError::UnknownRespack(name.to_string()))
}

/// Appends entities by identity, keeping first-occurrence order. Entities
/// before an out-of-range index stay added.
fn add_from<T>(
    active: &mut Vec<Arc<T>>,
    source: Option<&[Arc<T>]>,
    respack: &str,
    category: Category,
    indices: Option<&[usize]>,
) -> Result<()> {
    let source = source.ok_or_else(|| HuesError::MissingCategory {
        respack: respack.to_string(),
        category,
    })?;

    let mut push = |entity: &Arc<T>| {
        if !active.iter().any(|existing| Arc::ptr_eq(existing, entity)) {
            active.push(entity.clone());
        }
    };

    match indices {
        Some(indices) => {
            for &index in indices {
                let entity = source.get(index).ok_or(HuesError::IndexOutOfRange {
                    what: category_item(category),
                    index,
                    len: source.len(),
                })?;
                push(entity);
            }
        }
        None => source.iter().for_each(push),
    }

    debug!(respack, %category, active = active.len(), "updated active list");
    Ok(())
}

fn category_item(category: Category) -> &'static str {
    match category {
        Category::Hues => "hue",
        Category::Songs => "song",
        Category::Images => "image",
    }
}
