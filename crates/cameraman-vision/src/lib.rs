pub mod filter;
pub mod geometry;
pub mod live_view;
pub mod pose;
pub mod selection;
pub mod tracker;

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

pub use geometry::{BoundingBox, Point};

/// One detection of the current frame, in image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionCandidate {
    pub label_id: u32,
    pub score: f32,
    pub bounding_box: BoundingBox,
}

impl DetectionCandidate {
    pub fn new(label_id: u32, score: f32, bounding_box: BoundingBox) -> Self {
        Self { label_id, score, bounding_box }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Only candidates of this label are tracked (0 = person for COCO models).
    #[serde(default)]
    pub target_label_id: u32,

    /// Frames a tracked identity may be missing before it is forgotten.
    #[serde(default = "default_max_disappeared")]
    pub max_disappeared: u32,

    /// "first" | "coordinate"
    #[serde(default = "default_select")]
    pub select: String,
}

fn default_max_disappeared() -> u32 {
    25
}

fn default_select() -> String {
    "first".into()
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            target_label_id: 0,
            max_disappeared: default_max_disappeared(),
            select: default_select(),
        }
    }
}

/// Object detection backend. Errors are per frame and never fatal to the caller.
pub trait Detector: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectionCandidate>>;
}

/// Detects nothing; used when no inference backend is available.
#[derive(Debug, Default)]
pub struct DummyDetector;

impl Detector for DummyDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<DetectionCandidate>> {
        Ok(Vec::new())
    }
}

pub fn keep_label(candidates: Vec<DetectionCandidate>, label_id: u32) -> Vec<DetectionCandidate> {
    candidates.into_iter().filter(|c| c.label_id == label_id).collect()
}
