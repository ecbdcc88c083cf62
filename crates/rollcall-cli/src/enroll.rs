//! Enrollment and roster maintenance. The gallery folder and the `students`
//! table must agree, so every roster change here also moves the photo.

use anyhow::{bail, Context, Result};
use image::{ImageFormat, RgbImage};
use rollcall_core::{FaceEncoder, Gallery};
use rollcall_store::Store;
use std::io::Cursor;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrollment {
    Enrolled,
    /// The photo held zero or several faces. Nothing was written.
    NoSingleFace,
    /// The identifier is already on the roster. Nothing was written.
    Duplicate,
}

/// Identifiers become gallery file names.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.trim().is_empty() {
        bail!("identifier must not be empty");
    }
    if identifier.starts_with('.') || identifier.contains(['/', '\\', '\0']) {
        bail!("identifier {identifier:?} cannot be used as a file name");
    }
    Ok(())
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Jpeg).context("encoding snapshot")?;
    Ok(bytes.into_inner())
}

/// Enroll one student from a snapshot.
///
/// The gallery photo is written before the roster row; if the roster refuses
/// the identifier the photo is deleted again.
pub fn enroll(
    store: &Store,
    encoder: &mut dyn FaceEncoder,
    gallery_dir: &Path,
    name: &str,
    identifier: &str,
    snapshot: &RgbImage,
) -> Result<Enrollment> {
    validate_identifier(identifier)?;

    if encoder.encode(snapshot)?.is_none() {
        tracing::warn!(identifier, "enrollment photo must contain exactly one face");
        return Ok(Enrollment::NoSingleFace);
    }

    let roster = store.roster();
    if roster.get(identifier)?.is_some() {
        tracing::warn!(identifier, "identifier already enrolled");
        return Ok(Enrollment::Duplicate);
    }

    std::fs::create_dir_all(gallery_dir)
        .with_context(|| format!("creating gallery {}", gallery_dir.display()))?;
    let path = Gallery::image_path(gallery_dir, identifier);
    let jpeg = encode_jpeg(snapshot)?;
    std::fs::write(&path, &jpeg).with_context(|| format!("writing {}", path.display()))?;

    let added = match roster.add(name, identifier) {
        Ok(added) => added,
        Err(err) => {
            discard(&path);
            return Err(err.into());
        }
    };
    if !added {
        discard(&path);
        return Ok(Enrollment::Duplicate);
    }

    store.images().insert(identifier, &jpeg)?;
    tracing::info!(identifier, name, path = %path.display(), "student enrolled");
    Ok(Enrollment::Enrolled)
}

fn discard(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        tracing::error!(path = %path.display(), error = %err, "could not roll back gallery photo");
    }
}

/// Change a student's name and/or identifier.
///
/// The gallery photo is moved before the roster row changes and moved back if
/// the roster refuses, so the two never disagree. Returns `false` if
/// `new_identifier` belongs to someone else.
pub fn rename(
    store: &Store,
    gallery_dir: &Path,
    identifier: &str,
    new_name: Option<&str>,
    new_identifier: Option<&str>,
) -> Result<bool> {
    let roster = store.roster();
    let current = roster
        .get(identifier)?
        .with_context(|| format!("no student with identifier {identifier:?}"))?;

    let name = new_name.unwrap_or(&current.name);
    let target = new_identifier.unwrap_or(identifier);
    validate_identifier(target)?;

    let mut moved = None;
    if target != identifier {
        if roster.get(target)?.is_some() {
            tracing::warn!(identifier, target, "identifier already taken");
            return Ok(false);
        }
        let from = Gallery::image_path(gallery_dir, identifier);
        let to = Gallery::image_path(gallery_dir, target);
        if to.exists() {
            bail!("{} already exists; remove it before renaming", to.display());
        }
        if from.exists() {
            std::fs::rename(&from, &to)
                .with_context(|| format!("renaming {} to {}", from.display(), to.display()))?;
            moved = Some((from, to));
        } else {
            tracing::warn!(path = %from.display(), "student has no gallery photo");
        }
    }

    let updated = roster.update(identifier, name, target);
    if !matches!(updated, Ok(true)) {
        if let Some((from, to)) = &moved {
            if let Err(err) = std::fs::rename(to, from) {
                tracing::error!(path = %to.display(), error = %err, "could not move gallery photo back");
            }
        }
    }
    Ok(updated?)
}

/// Remove a student and their gallery photo. Returns `false` if unknown.
pub fn remove(store: &Store, gallery_dir: &Path, identifier: &str) -> Result<bool> {
    if !store.roster().remove(identifier)? {
        return Ok(false);
    }

    let path = Gallery::image_path(gallery_dir, identifier);
    match std::fs::remove_file(&path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "student had no gallery photo");
        }
        Err(err) => return Err(err).with_context(|| format!("deleting {}", path.display())),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use image::Rgb;
    use rollcall_core::{EncodeError, Embedding};

    /// Green channel / 100 = number of faces.
    struct Faces;

    impl FaceEncoder for Faces {
        fn encode_all(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError> {
            let count = (image.get_pixel(0, 0)[1] as f32 / 100.0).round() as usize;
            Ok(vec![Embedding::new(vec![0.0]); count])
        }
    }

    fn store() -> Store {
        Store::open_in_memory(FixedOffset::east_opt(0).unwrap()).unwrap()
    }

    fn snapshot(faces: u8) -> RgbImage {
        RgbImage::from_pixel(16, 16, Rgb([0, faces * 100, 0]))
    }

    #[test]
    fn test_enroll_writes_photo_roster_and_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();

        let outcome = enroll(&store, &mut Faces, dir.path(), "Ada", "S1", &snapshot(1)).unwrap();

        assert_eq!(outcome, Enrollment::Enrolled);
        assert!(dir.path().join("S1.jpg").exists());
        assert_eq!(store.roster().get("S1").unwrap().unwrap().name, "Ada");
        assert!(store.images().latest("S1").unwrap().is_some());
    }

    #[test]
    fn test_enroll_rejects_ambiguous_photo() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();

        for faces in [0, 2] {
            let outcome = enroll(&store, &mut Faces, dir.path(), "Ada", "S1", &snapshot(faces)).unwrap();
            assert_eq!(outcome, Enrollment::NoSingleFace);
        }
        assert!(!dir.path().join("S1.jpg").exists());
        assert!(store.roster().list_all().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_identifier_keeps_existing_photo() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();
        enroll(&store, &mut Faces, dir.path(), "Ada", "S1", &snapshot(1)).unwrap();
        let before = std::fs::read(dir.path().join("S1.jpg")).unwrap();

        let outcome = enroll(&store, &mut Faces, dir.path(), "Grace", "S1", &snapshot(1)).unwrap();

        assert_eq!(outcome, Enrollment::Duplicate);
        assert_eq!(std::fs::read(dir.path().join("S1.jpg")).unwrap(), before);
        assert_eq!(store.roster().get("S1").unwrap().unwrap().name, "Ada");
        assert_eq!(store.images().count().unwrap(), 1);
    }

    #[test]
    fn test_identifier_must_be_a_file_name() {
        assert!(validate_identifier("S10").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("../S1").is_err());
        assert!(validate_identifier(".hidden").is_err());
    }

    #[test]
    fn test_rename_moves_gallery_photo() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();
        enroll(&store, &mut Faces, dir.path(), "Ada", "S1", &snapshot(1)).unwrap();

        assert!(rename(&store, dir.path(), "S1", None, Some("S9")).unwrap());

        assert!(!dir.path().join("S1.jpg").exists());
        assert!(dir.path().join("S9.jpg").exists());
        assert_eq!(store.roster().get("S9").unwrap().unwrap().name, "Ada");
    }

    #[test]
    fn test_rename_onto_taken_identifier_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();
        enroll(&store, &mut Faces, dir.path(), "Ada", "S1", &snapshot(1)).unwrap();
        enroll(&store, &mut Faces, dir.path(), "Grace", "S2", &snapshot(1)).unwrap();

        assert!(!rename(&store, dir.path(), "S1", Some("Ada L."), Some("S2")).unwrap());

        assert!(dir.path().join("S1.jpg").exists());
        assert_eq!(store.roster().get("S1").unwrap().unwrap().name, "Ada");
    }

    #[test]
    fn test_rename_blocked_by_stray_photo_leaves_roster_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();
        enroll(&store, &mut Faces, dir.path(), "Ada", "S1", &snapshot(1)).unwrap();
        std::fs::write(dir.path().join("S9.jpg"), b"stray").unwrap();

        assert!(rename(&store, dir.path(), "S1", None, Some("S9")).is_err());

        assert!(dir.path().join("S1.jpg").exists());
        assert_eq!(std::fs::read(dir.path().join("S9.jpg")).unwrap(), b"stray");
        assert!(store.roster().get("S1").unwrap().is_some());
        assert!(store.roster().get("S9").unwrap().is_none());
    }

    #[test]
    fn test_rename_unknown_student_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rename(&store(), dir.path(), "S404", Some("Nobody"), None).is_err());
    }

    #[test]
    fn test_remove_deletes_photo() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();
        enroll(&store, &mut Faces, dir.path(), "Ada", "S1", &snapshot(1)).unwrap();

        assert!(remove(&store, dir.path(), "S1").unwrap());
        assert!(!dir.path().join("S1.jpg").exists());
        assert!(!remove(&store, dir.path(), "S1").unwrap());
    }
}
