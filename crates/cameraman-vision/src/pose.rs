use anyhow::Result;
use image::RgbImage;

use crate::{BoundingBox, Point};

pub const NUM_KEY_POINTS: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPointType {
    Nose = 0,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyPoint {
    pub y: f64,
    pub x: f64,
    pub confidence: f64,
}

impl KeyPoint {
    pub fn new(y: f64, x: f64, confidence: f64) -> Self {
        Self { y, x, confidence }
    }
}

/// Key points in [`KeyPointType`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    key_points: [KeyPoint; NUM_KEY_POINTS],
}

impl Pose {
    pub fn new(key_points: [KeyPoint; NUM_KEY_POINTS]) -> Self {
        Self { key_points }
    }

    pub fn get(&self, t: KeyPointType) -> KeyPoint {
        self.key_points[t as usize]
    }

    pub fn key_points(&self) -> &[KeyPoint; NUM_KEY_POINTS] {
        &self.key_points
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.key_points.iter().map(|k| Point::new(k.x, k.y)))
    }
}

pub trait PoseMatcher: Send {
    fn is_matching_pose(&self, pose: &Pose) -> bool;
}

/// Matches a person raising both hands above the head and shoulders.
#[derive(Debug, Clone)]
pub struct HandsUpPoseMatcher {
    pub min_hand_confidence: f64,
    pub min_body_confidence: f64,
}

impl Default for HandsUpPoseMatcher {
    fn default() -> Self {
        Self { min_hand_confidence: 0.5, min_body_confidence: 0.3 }
    }
}

const BODY: [KeyPointType; 7] = [
    KeyPointType::Nose,
    KeyPointType::LeftEye,
    KeyPointType::RightEye,
    KeyPointType::LeftEar,
    KeyPointType::RightEar,
    KeyPointType::LeftShoulder,
    KeyPointType::RightShoulder,
];

impl HandsUpPoseMatcher {
    /// Image y grows downwards, so "higher" means a smaller y.
    pub fn are_hands_higher_than_body(hands: &[KeyPoint], body: &[KeyPoint]) -> bool {
        hands.iter().all(|h| body.iter().all(|b| h.y < b.y))
    }
}

impl PoseMatcher for HandsUpPoseMatcher {
    fn is_matching_pose(&self, pose: &Pose) -> bool {
        let hands = [pose.get(KeyPointType::LeftWrist), pose.get(KeyPointType::RightWrist)];
        if hands.iter().any(|h| h.confidence < self.min_hand_confidence) {
            return false;
        }
        let body: Vec<KeyPoint> = BODY
            .iter()
            .map(|t| pose.get(*t))
            .filter(|k| k.confidence >= self.min_body_confidence)
            .collect();
        if body.is_empty() {
            return false;
        }
        Self::are_hands_higher_than_body(&hands, &body)
    }
}

pub trait PoseDetector: Send {
    fn detect_poses(&mut self, image: &RgbImage) -> Result<Vec<Pose>>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    fn pose(points: [(f64, f64, f64); NUM_KEY_POINTS]) -> Pose {
        Pose::new(points.map(|(y, x, c)| KeyPoint::new(y, x, c)))
    }

    pub fn hands_up() -> Pose {
        pose([
            (224.17, 317.26, 0.56),
            (216.31, 325.12, 0.63),
            (218.28, 301.52, 0.36),
            (230.07, 340.85, 0.63),
            (232.04, 291.04, 0.56),
            (277.27, 356.59, 0.70),
            (283.17, 267.44, 0.49),
            (230.07, 411.65, 0.70),
            (228.11, 201.89, 0.70),
            (145.52, 411.65, 0.70),
            (155.35, 183.53, 0.56),
            (420.82, 351.34, 0.19),
            (412.96, 283.17, 0.36),
            (479.82, 356.59, 0.12),
            (471.95, 288.41, 0.07),
            (475.89, 338.23, 0.07),
            (489.65, 283.17, 0.07),
        ])
    }

    pub fn lying() -> Pose {
        pose([
            (281.20, 388.05, 0.36),
            (259.57, 424.76, 0.56),
            (257.61, 353.96, 0.56),
            (275.30, 471.95, 0.43),
            (277.27, 293.66, 0.36),
            (428.69, 492.93, 0.19),
            (438.52, 283.17, 0.19),
            (477.85, 414.27, 0.12),
            (460.15, 275.30, 0.12),
            (291.04, 485.06, 0.02),
            (369.70, 348.72, 0.09),
            (475.89, 450.98, 0.12),
            (481.79, 73.41, 0.07),
            (460.15, 506.04, 0.09),
            (471.95, 26.21, 0.05),
            (458.19, 419.51, 0.12),
            (460.15, 243.84, 0.12),
        ])
    }

    pub fn standing() -> Pose {
        pose([
            (176.98, 235.97, 0.56),
            (173.05, 249.08, 0.63),
            (176.98, 228.11, 0.49),
            (171.08, 259.57, 0.56),
            (178.95, 230.73, 0.43),
            (200.58, 259.57, 0.29),
            (198.61, 217.62, 0.36),
            (234.01, 267.44, 0.36),
            (234.01, 204.51, 0.36),
            (245.81, 238.60, 0.43),
            (245.81, 209.75, 0.49),
            (263.50, 259.57, 0.56),
            (261.54, 228.11, 0.56),
            (308.73, 246.46, 0.56),
            (304.80, 225.49, 0.43),
            (353.96, 249.08, 0.49),
            (357.90, 212.38, 0.49),
        ])
    }
}
