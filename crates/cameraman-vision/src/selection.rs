use std::collections::BTreeMap;

use image::RgbImage;
use tracing::{debug, warn};

use crate::pose::{PoseDetector, PoseMatcher};
use crate::tracker::ObjectId;
use crate::{DetectionCandidate, Point};

/// The tracked identity chosen as subject, with its box of the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: ObjectId,
    pub candidate: DetectionCandidate,
}

pub type Candidates = BTreeMap<ObjectId, DetectionCandidate>;

pub trait SelectTargetStrategy: Send {
    fn select(&mut self, image: &RgbImage, candidates: &Candidates) -> Option<Target>;

    /// Queues a coordinate for strategies that select by position.
    /// Returns false if the strategy ignores coordinates.
    fn request_coordinate(&mut self, _coordinate: Point) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct SelectFirst;

impl SelectTargetStrategy for SelectFirst {
    fn select(&mut self, _image: &RgbImage, candidates: &Candidates) -> Option<Target> {
        candidates
            .iter()
            .next()
            .map(|(id, c)| Target { id: *id, candidate: c.clone() })
    }
}

/// Selects the candidate containing a pending coordinate (e.g. a click).
/// The coordinate is consumed by the next `select`, matched or not.
#[derive(Debug, Default)]
pub struct SelectAtCoordinate {
    pub coordinate: Option<Point>,
}

impl SelectTargetStrategy for SelectAtCoordinate {
    fn select(&mut self, _image: &RgbImage, candidates: &Candidates) -> Option<Target> {
        let coordinate = self.coordinate.take()?;
        let found = candidates
            .iter()
            .find(|(_, c)| c.bounding_box.contains_point(&coordinate))
            .map(|(id, c)| Target { id: *id, candidate: c.clone() });
        if found.is_some() {
            debug!("select target at coordinate {:?}", coordinate);
        }
        found
    }

    fn request_coordinate(&mut self, coordinate: Point) -> bool {
        self.coordinate = Some(coordinate);
        true
    }
}

/// Selects the candidate that overlaps most with the first matching pose.
pub struct PoseSelect {
    detector: Box<dyn PoseDetector>,
    matcher: Box<dyn PoseMatcher>,
}

impl PoseSelect {
    pub fn new(detector: Box<dyn PoseDetector>, matcher: Box<dyn PoseMatcher>) -> Self {
        Self { detector, matcher }
    }
}

impl SelectTargetStrategy for PoseSelect {
    fn select(&mut self, image: &RgbImage, candidates: &Candidates) -> Option<Target> {
        if candidates.is_empty() {
            return None;
        }
        let poses = match self.detector.detect_poses(image) {
            Ok(p) => p,
            Err(e) => {
                warn!("pose detection failed: {:#}", e);
                return None;
            }
        };
        let pose = poses.iter().find(|p| self.matcher.is_matching_pose(p))?;
        let pose_box = pose.bounding_box();

        let mut best: Option<(f64, ObjectId, &DetectionCandidate)> = None;
        for (id, c) in candidates {
            let overlap = c.bounding_box.percental_intersection_area(&pose_box);
            if overlap > 0.0 && best.map_or(true, |(b, _, _)| overlap > b) {
                best = Some((overlap, *id, c));
            }
        }
        best.map(|(_, id, c)| Target { id, candidate: c.clone() })
    }
}
