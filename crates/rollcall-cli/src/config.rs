use anyhow::{bail, Context, Result};
use chrono::FixedOffset;
use rollcall_core::{EuclideanMatcher, DEFAULT_MATCH_THRESHOLD};
use rollcall_store::parse_utc_offset;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration: defaults, then an optional TOML file, then `ROLLCALL_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Folder of `<identifier>.jpg` reference photos.
    pub gallery_dir: PathBuf,
    /// Euclidean distance below which a face matches a gallery entry.
    ///
    /// Embeddings are L2-normalised, so distance `d` is cosine `1 - d²/2`:
    /// the 0.6 default accepts only cosine above 0.82. ArcFace matches of the
    /// same person often land nearer 0.4 to 0.6 cosine; raise this (around
    /// 1.1 for cosine 0.4) after checking it against your own gallery.
    pub match_threshold: f32,
    /// Fixed UTC offset (`±HH:MM`) that defines the operational day.
    pub utc_offset: String,
    /// Frames to discard before an enrollment snapshot (auto-exposure settling).
    pub warmup_frames: usize,
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
}

fn default_config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        })
        .join("rollcall/config.toml")
}

impl Default for Config {
    fn default() -> Self {
        let data = data_dir();
        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: data.join("models"),
            db_path: data.join("attendance.db"),
            gallery_dir: data.join("gallery"),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            utc_offset: "+00:00".to_string(),
            warmup_frames: 4,
        }
    }
}

impl Config {
    /// Resolve the configuration for this invocation.
    ///
    /// An explicit path (flag or `ROLLCALL_CONFIG`) must exist; the default
    /// location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("ROLLCALL_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `ROLLCALL_*` overrides. Unparsable numbers keep the current value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ROLLCALL_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_GALLERY_DIR") {
            self.gallery_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_UTC_OFFSET") {
            self.utc_offset = v;
        }
        self.match_threshold = parse_or(&lookup, "ROLLCALL_MATCH_THRESHOLD", self.match_threshold);
        self.warmup_frames = parse_or(&lookup, "ROLLCALL_WARMUP_FRAMES", self.warmup_frames);
    }

    pub fn validate(&self) -> Result<()> {
        self.offset()?;
        if !(self.match_threshold > 0.0) {
            bail!("match_threshold must be positive, got {}", self.match_threshold);
        }
        Ok(())
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        Ok(parse_utc_offset(&self.utc_offset)?)
    }

    pub fn matcher(&self) -> EuclideanMatcher {
        EuclideanMatcher {
            threshold: self.match_threshold,
        }
    }
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, current: T) -> T {
    match lookup(key) {
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "ignoring unparsable override");
            current
        }),
        None => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("utc_offset = \"+05:30\"\nmatch_threshold = 0.5\n").unwrap();
        assert_eq!(config.utc_offset, "+05:30");
        assert_eq!(config.match_threshold, 0.5);
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!(config.offset().unwrap().local_minus_utc(), 19_800);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::from_toml("treshold = 0.5").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ROLLCALL_DB_PATH", "/srv/roll.db"),
            ("ROLLCALL_MATCH_THRESHOLD", "0.45"),
            ("ROLLCALL_WARMUP_FRAMES", "many"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/srv/roll.db"));
        assert_eq!(config.match_threshold, 0.45);
        assert_eq!(config.warmup_frames, 4);
    }

    #[test]
    fn test_default_threshold_in_cosine_terms() {
        use rollcall_core::{Embedding, GalleryEntry, Matcher};

        let gallery = [GalleryEntry { name: "S1".into(), embedding: Embedding::new(vec![1.0, 0.0]) }];
        let matcher = Config::default().matcher();
        // Unit vectors at cosine 0.85 and 0.80 sit either side of distance 0.6.
        let close = Embedding::new(vec![0.85, (1.0f32 - 0.85 * 0.85).sqrt()]);
        let far = Embedding::new(vec![0.8, 0.6]);

        assert_eq!(matcher.identify(&close, &gallery), Some("S1"));
        assert_eq!(matcher.identify(&far, &gallery), None);
    }

    #[test]
    fn test_invalid_offset_fails_validation() {
        let config = Config { utc_offset: "local".into(), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_threshold_fails_validation() {
        let config = Config { match_threshold: 0.0, ..Config::default() };
        assert!(config.validate().is_err());
    }
}
