//! rollcall-core: Face recognition and attendance reconciliation.
//!
//! SCRFD detection and ArcFace recognition run via ONNX Runtime on the CPU.
//! Matching is nearest-neighbour over Euclidean distance against a gallery
//! loaded per session.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod gallery;
pub mod ledger;
pub mod recognizer;
pub mod session;
pub mod types;

pub use encoder::{EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use gallery::{Gallery, GalleryError};
pub use ledger::{compare_by_key, embedded_digits, reconcile, NumericKey, Reconciliation};
pub use session::{RecognitionSession, SessionStats};
pub use types::{BoundingBox, Embedding, EuclideanMatcher, GalleryEntry, Matcher, DEFAULT_MATCH_THRESHOLD};
