//! Known-face gallery.
//!
//! A gallery is a folder of `<identifier>.jpg` reference photos. It is loaded
//! once per session into a [`Gallery`] value and handed to whatever needs it;
//! nothing about it is process-wide.

use crate::encoder::{EncodeError, FaceEncoder};
use crate::types::GalleryEntry;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("folder does not exist: {0}")]
    NotFound(PathBuf),
    #[error("no .jpg images found in {0}")]
    NoImages(PathBuf),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// `.jpg` / `.jpeg` files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    if !dir.is_dir() {
        return Err(GalleryError::NotFound(dir.to_path_buf()));
    }

    let io_err = |source| GalleryError::Io { path: dir.to_path_buf(), source };
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_jpeg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
        if is_jpeg && path.is_file() {
            images.push(path);
        }
    }

    if images.is_empty() {
        return Err(GalleryError::NoImages(dir.to_path_buf()));
    }
    images.sort();
    Ok(images)
}

/// Reference encodings for every usable gallery photo.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    /// Encode every photo in `dir`.
    ///
    /// Photos that cannot be decoded, or that do not hold exactly one face,
    /// are skipped with a warning.
    pub fn load(dir: &Path, encoder: &mut dyn FaceEncoder) -> Result<Self, GalleryError> {
        let mut entries = Vec::new();

        for path in list_images(dir)? {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                tracing::warn!(path = %path.display(), "skipping gallery image with non-UTF-8 name");
                continue;
            };

            let image = match image::open(&path) {
                Ok(image) => image.to_rgb8(),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not decode gallery image; skipping");
                    continue;
                }
            };

            match encoder.encode(&image)? {
                Some(embedding) => entries.push(GalleryEntry { name, embedding }),
                None => {
                    tracing::warn!(path = %path.display(), "no face or multiple faces found; skipping");
                }
            }
        }

        if entries.is_empty() {
            tracing::warn!(dir = %dir.display(), "no known faces loaded");
        } else {
            tracing::info!(dir = %dir.display(), faces = entries.len(), "gallery loaded");
        }

        Ok(Self { entries })
    }

    /// Where the reference photo for `identifier` lives.
    pub fn image_path(dir: &Path, identifier: &str) -> PathBuf {
        dir.join(format!("{identifier}.jpg"))
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    /// The known roster: every identifier with a usable reference encoding.
    pub fn names(&self) -> BTreeSet<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;
    use image::{Rgb, RgbImage};

    /// Red channel / 100 faces, green channel as the encoding.
    struct ColourCoded;

    impl FaceEncoder for ColourCoded {
        fn encode_all(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError> {
            let Rgb([r, g, _]) = *image.get_pixel(0, 0);
            let faces = ((r as f32) / 100.0).round() as usize;
            Ok(vec![Embedding::new(vec![g as f32]); faces])
        }
    }

    fn write_photo(dir: &Path, file: &str, red: u8, green: u8) {
        RgbImage::from_pixel(8, 8, Rgb([red, green, 0]))
            .save(dir.join(file))
            .unwrap();
    }

    #[test]
    fn test_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(Gallery::load(&missing, &mut ColourCoded), Err(GalleryError::NotFound(_))));
    }

    #[test]
    fn test_folder_without_jpegs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        assert!(matches!(Gallery::load(dir.path(), &mut ColourCoded), Err(GalleryError::NoImages(_))));
    }

    #[test]
    fn test_ambiguous_photos_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_photo(dir.path(), "S1.jpg", 100, 10);
        write_photo(dir.path(), "S2.jpg", 0, 20);
        write_photo(dir.path(), "S3.jpg", 200, 30);
        write_photo(dir.path(), "S4.jpeg", 100, 40);
        std::fs::write(dir.path().join("S5.jpg"), b"not a jpeg").unwrap();

        let gallery = Gallery::load(dir.path(), &mut ColourCoded).unwrap();
        let names: Vec<String> = gallery.names().into_iter().collect();
        assert_eq!(names, vec!["S1".to_string(), "S4".to_string()]);
    }

    #[test]
    fn test_all_skipped_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_photo(dir.path(), "S1.jpg", 0, 0);
        let gallery = Gallery::load(dir.path(), &mut ColourCoded).unwrap();
        assert!(gallery.entries().is_empty());
    }

    #[test]
    fn test_image_path_uses_identifier() {
        assert_eq!(
            Gallery::image_path(Path::new("/g"), "S12"),
            PathBuf::from("/g/S12.jpg")
        );
    }
}
