//! Reference library: every known icon prepared once at load time.
//!
//! Entries are kept in insertion order, which is the scan order used by the
//! matcher. When loading from a directory, files are visited sorted by file
//! name so the order (and therefore tie-breaking) is reproducible.

use crate::features::FeatureConfig;
use crate::image::{ColorImage, IconSize};
use crate::preprocess::{PreparedImage, PreprocessConfig, Preprocessor};
use crate::trace::trace_warn;
use crate::util::{IconMatchError, IconMatchResult};
use std::collections::HashMap;
use std::path::PathBuf;

#[cfg(feature = "image-io")]
mod load;

/// Parameters for building a library.
#[derive(Clone, Debug, PartialEq)]
pub struct LibraryConfig {
    pub preprocess: PreprocessConfig,
    pub features: FeatureConfig,
    /// Prepare reference files on the rayon pool when the `rayon` feature is on.
    pub parallel: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            features: FeatureConfig::default(),
            parallel: true,
        }
    }
}

/// A reference file that could not be turned into an entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of [`ReferenceLibrary::load`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries added by this call.
    pub loaded: usize,
    pub skipped: Vec<SkippedFile>,
    /// Loaded files whose size differed from the canonical size.
    pub resized: usize,
}

/// One prepared reference icon.
#[derive(Clone, Debug)]
pub struct ReferenceEntry {
    item_id: String,
    image: PreparedImage,
}

impl ReferenceEntry {
    /// Returns the item identifier.
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Returns the prepared variants and descriptors.
    pub fn image(&self) -> &PreparedImage {
        &self.image
    }
}

/// Searchable set of prepared reference icons.
#[derive(Debug)]
pub struct ReferenceLibrary {
    entries: Vec<ReferenceEntry>,
    index: HashMap<String, usize>,
    preprocessor: Preprocessor,
    config: LibraryConfig,
}

impl ReferenceLibrary {
    /// Creates an empty library.
    pub fn new(config: LibraryConfig) -> IconMatchResult<Self> {
        let preprocessor = Preprocessor::new(config.preprocess.clone(), &config.features)?;
        Ok(Self {
            entries: Vec::new(),
            index: HashMap::new(),
            preprocessor,
            config,
        })
    }

    /// Builds a library from already decoded images.
    ///
    /// Duplicate ids keep the first image.
    pub fn from_images<I, S>(config: LibraryConfig, images: I) -> IconMatchResult<Self>
    where
        I: IntoIterator<Item = (S, ColorImage)>,
        S: Into<String>,
    {
        let mut library = Self::new(config)?;
        for (id, image) in images {
            library.insert(id, &image)?;
        }
        Ok(library)
    }

    /// Prepares `image` and adds it under `item_id`.
    ///
    /// Returns `Ok(false)` without preparing anything if the id is taken.
    pub fn insert(&mut self, item_id: impl Into<String>, image: &ColorImage) -> IconMatchResult<bool> {
        let item_id = item_id.into();
        if self.index.contains_key(&item_id) {
            trace_warn!("duplicate item id {item_id}, keeping the first entry");
            return Ok(false);
        }
        let prepared = self.preprocessor.prepare_reference(image)?;
        Ok(self.push_entry(item_id, prepared))
    }

    /// Adds an image prepared by [`ReferenceLibrary::preprocessor`].
    ///
    /// Fails if the image is not at the canonical size.
    pub fn insert_prepared(
        &mut self,
        item_id: impl Into<String>,
        image: PreparedImage,
    ) -> IconMatchResult<bool> {
        let size = image.size();
        if size != self.icon_size() {
            return Err(IconMatchError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }
        let item_id = item_id.into();
        if self.index.contains_key(&item_id) {
            trace_warn!("duplicate item id {item_id}, keeping the first entry");
            return Ok(false);
        }
        Ok(self.push_entry(item_id, image))
    }

    fn push_entry(&mut self, item_id: String, image: PreparedImage) -> bool {
        self.index.insert(item_id.clone(), self.entries.len());
        self.entries.push(ReferenceEntry { item_id, image });
        true
    }

    /// Looks up an entry by id.
    pub fn get(&self, item_id: &str) -> Option<&ReferenceEntry> {
        self.index.get(item_id).map(|&idx| &self.entries[idx])
    }

    /// Iterates over entries in scan order.
    pub fn all(&self) -> impl ExactSizeIterator<Item = &ReferenceEntry> + '_ {
        self.entries.iter()
    }

    /// Returns the entries in scan order.
    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pipeline shared by references and queries.
    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Canonical size of every entry.
    pub fn icon_size(&self) -> IconSize {
        self.preprocessor.icon_size()
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }
}
