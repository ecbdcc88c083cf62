/// Distance below which a probe is accepted as the gallery entry it is nearest to.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance between two embeddings.
    ///
    /// Embeddings of different length are compared over their common prefix.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A named reference encoding. The name is the student identifier.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub embedding: Embedding,
}

/// Strategy for comparing a probe embedding against the gallery.
pub trait Matcher {
    /// Nearest gallery entry and its distance, or `None` for an empty gallery.
    fn best_match<'g>(&self, probe: &Embedding, gallery: &'g [GalleryEntry]) -> Option<(&'g str, f32)>;

    /// Upper bound (exclusive) on an accepted match distance.
    fn threshold(&self) -> f32;

    /// Name of the nearest entry if it lies strictly within the threshold.
    fn identify<'g>(&self, probe: &Embedding, gallery: &'g [GalleryEntry]) -> Option<&'g str> {
        self.best_match(probe, gallery)
            .filter(|(_, distance)| *distance < self.threshold())
            .map(|(name, _)| name)
    }
}

/// Nearest-neighbour matcher over Euclidean distance.
#[derive(Debug, Clone, Copy)]
pub struct EuclideanMatcher {
    pub threshold: f32,
}

impl Default for EuclideanMatcher {
    fn default() -> Self {
        Self { threshold: DEFAULT_MATCH_THRESHOLD }
    }
}

impl Matcher for EuclideanMatcher {
    fn best_match<'g>(&self, probe: &Embedding, gallery: &'g [GalleryEntry]) -> Option<(&'g str, f32)> {
        gallery
            .iter()
            .map(|entry| (entry.name.as_str(), probe.distance(&entry.embedding)))
            .fold(None, |best: Option<(&str, f32)>, candidate| match best {
                Some(prev) if prev.1 <= candidate.1 => Some(prev),
                _ => Some(candidate),
            })
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }
}
