//! Directory loading (requires the `image-io` feature).

use super::{LoadReport, ReferenceLibrary, SkippedFile};
use crate::image::io::{is_supported_image, load_color_image};
use crate::preprocess::PreparedImage;
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{IconMatchError, IconMatchResult};
use std::path::{Path, PathBuf};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

struct Decoded {
    item_id: String,
    image: PreparedImage,
    resized: bool,
}

impl ReferenceLibrary {
    /// Loads every supported image file directly inside `dir`.
    ///
    /// The item id of each entry is the file name without extension. Files
    /// that fail to decode are skipped with a warning and listed in the
    /// report. Fails if `dir` cannot be listed or if the library is still
    /// empty afterwards.
    pub fn load<P: AsRef<Path>>(&mut self, dir: P) -> IconMatchResult<LoadReport> {
        let dir = dir.as_ref();
        let _span = trace_span!("load_library", path = %dir.display()).entered();

        let mut paths = list_images(dir)?;
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let decoded = self.decode_all(&paths);

        let mut report = LoadReport::default();
        for (path, result) in paths.into_iter().zip(decoded) {
            match result {
                Ok(decoded) => {
                    if self.index.contains_key(&decoded.item_id) {
                        trace_warn!(
                            "duplicate item id {} from {}, keeping the first entry",
                            decoded.item_id,
                            path.display()
                        );
                        report.skipped.push(SkippedFile {
                            path,
                            reason: format!("duplicate item id {}", decoded.item_id),
                        });
                        continue;
                    }
                    report.resized += usize::from(decoded.resized);
                    report.loaded += 1;
                    self.push_entry(decoded.item_id, decoded.image);
                }
                Err(reason) => {
                    trace_warn!("skipping reference {}: {}", path.display(), reason);
                    report.skipped.push(SkippedFile { path, reason });
                }
            }
        }

        trace_event!(
            "library_loaded",
            loaded = report.loaded,
            skipped = report.skipped.len()
        );

        if self.is_empty() {
            return Err(IconMatchError::EmptyLibrary {
                path: dir.display().to_string(),
            });
        }
        Ok(report)
    }

    fn decode_all(&self, paths: &[PathBuf]) -> Vec<Result<Decoded, String>> {
        #[cfg(feature = "rayon")]
        if self.config.parallel {
            return paths.par_iter().map(|p| self.decode_one(p)).collect();
        }
        paths.iter().map(|p| self.decode_one(p)).collect()
    }

    fn decode_one(&self, path: &Path) -> Result<Decoded, String> {
        let item_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| "file has no name".to_string())?;
        let color = load_color_image(path).map_err(|err| err.to_string())?;
        let resized = color.size() != self.icon_size();
        let image = self
            .preprocessor
            .prepare_reference(&color)
            .map_err(|err| err.to_string())?;
        Ok(Decoded {
            item_id,
            image,
            resized,
        })
    }
}

fn list_images(dir: &Path) -> IconMatchResult<Vec<PathBuf>> {
    let not_found = || IconMatchError::LibraryNotFound {
        path: dir.display().to_string(),
    };
    let entries = std::fs::read_dir(dir).map_err(|_| not_found())?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|_| not_found())?.path();
        if path.is_file() && is_supported_image(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}
