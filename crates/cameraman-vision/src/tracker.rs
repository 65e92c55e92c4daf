use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{BoundingBox, DetectionCandidate, Point};

pub type ObjectId = u64;

const INTERSECTION_LIMIT: f64 = 0.3;
const MAX_SIZE_CHANGE_FACTOR: f64 = 4.0;

#[derive(Debug, Clone)]
struct TrackedObject {
    centroid: Point,
    candidate: DetectionCandidate,
    disappeared: u32,
}

/// Centroid tracker assigning stable ids to the candidates of consecutive frames.
///
/// Ids are handed out monotonically and never reused. An identity is forgotten
/// once it has been missing for more than `max_disappeared` frames in a row.
#[derive(Debug, Clone)]
pub struct ObjectTracker {
    max_disappeared: u32,
    next_object_id: ObjectId,
    objects: BTreeMap<ObjectId, TrackedObject>,
}

impl Default for ObjectTracker {
    fn default() -> Self {
        Self::new(20)
    }
}

/// Matching position of a box: its top-left corner.
fn centroid(b: &BoundingBox) -> Point {
    Point::new(b.x, b.y)
}

fn size_change_factor(old: &BoundingBox, new: &BoundingBox) -> f64 {
    let (a, b) = (old.area(), new.area());
    a.max(b) / a.min(b)
}

impl ObjectTracker {
    pub fn new(max_disappeared: u32) -> Self {
        Self { max_disappeared, next_object_id: 0, objects: BTreeMap::new() }
    }

    pub fn is_registered(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Returns the objects that were matched or newly registered in this frame.
    pub fn update(&mut self, candidates: &[DetectionCandidate]) -> BTreeMap<ObjectId, DetectionCandidate> {
        let mut seen = BTreeMap::new();

        if candidates.is_empty() {
            let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
            for id in ids {
                self.mark_disappeared(id);
            }
            return seen;
        }

        let centroids: Vec<Point> = candidates.iter().map(|c| centroid(&c.bounding_box)).collect();

        if self.objects.is_empty() {
            for (i, c) in candidates.iter().enumerate() {
                let id = self.register(centroids[i], c);
                seen.insert(id, c.clone());
            }
            return seen;
        }

        let object_ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        let distances: Vec<Vec<f64>> = self
            .objects
            .values()
            .map(|o| centroids.iter().map(|c| o.centroid.distance_to(c)).collect())
            .collect();

        // rows ordered by their smallest distance, each paired with its closest column
        let row_min = |r: &Vec<f64>| r.iter().copied().fold(f64::INFINITY, f64::min);
        let mut rows: Vec<usize> = (0..object_ids.len()).collect();
        rows.sort_by(|a, b| row_min(&distances[*a]).total_cmp(&row_min(&distances[*b])));
        let cols: Vec<usize> = rows
            .iter()
            .map(|r| {
                let row = &distances[*r];
                (0..row.len()).fold(0, |best, i| if row[i] < row[best] { i } else { best })
            })
            .collect();

        let mut used_rows = BTreeSet::new();
        let mut used_cols = BTreeSet::new();
        for (row, col) in rows.into_iter().zip(cols) {
            if used_rows.contains(&row) || used_cols.contains(&col) {
                continue;
            }
            let object_id = object_ids[row];
            let distance = distances[row][col];
            let new = &candidates[col];
            let (limit, intersection, size_change) = match self.objects.get(&object_id) {
                Some(o) => (
                    // recently seen objects do not move far between frames
                    (100.0 * (o.disappeared as f64 + 1.0)).min(500.0),
                    o.candidate.bounding_box.percental_intersection_area(&new.bounding_box),
                    size_change_factor(&o.candidate.bounding_box, &new.bounding_box),
                ),
                None => continue,
            };

            if distance > limit && intersection < INTERSECTION_LIMIT {
                debug!("tracker: {} too far ({:.0} > {:.0}, overlap {:.2})", object_id, distance, limit, intersection);
                let id = self.register(centroids[col], new);
                seen.insert(id, new.clone());
            } else if size_change > MAX_SIZE_CHANGE_FACTOR {
                debug!("tracker: {} changed size by {:.2}", object_id, size_change);
                let id = self.register(centroids[col], new);
                seen.insert(id, new.clone());
            } else if let Some(o) = self.objects.get_mut(&object_id) {
                o.centroid = centroids[col];
                o.candidate = new.clone();
                o.disappeared = 0;
                seen.insert(object_id, new.clone());
            }
            used_rows.insert(row);
            used_cols.insert(col);
        }

        if object_ids.len() >= candidates.len() {
            for (row, id) in object_ids.iter().enumerate() {
                if !used_rows.contains(&row) {
                    self.mark_disappeared(*id);
                }
            }
        } else {
            for (col, c) in candidates.iter().enumerate() {
                if !used_cols.contains(&col) {
                    let id = self.register(centroids[col], c);
                    seen.insert(id, c.clone());
                }
            }
        }
        seen
    }

    fn register(&mut self, centroid: Point, candidate: &DetectionCandidate) -> ObjectId {
        let id = self.next_object_id;
        self.objects.insert(id, TrackedObject { centroid, candidate: candidate.clone(), disappeared: 0 });
        self.next_object_id += 1;
        debug!("tracker: registered {}", id);
        id
    }

    fn mark_disappeared(&mut self, id: ObjectId) {
        let Some(o) = self.objects.get_mut(&id) else { return; };
        o.disappeared += 1;
        if o.disappeared > self.max_disappeared {
            self.objects.remove(&id);
            debug!("tracker: deregistered {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_coordinates(x1: f64, y1: f64, x2: f64, y2: f64) -> DetectionCandidate {
        DetectionCandidate::new(0, 1.0, BoundingBox::from_coordinates(x1, y1, x2, y2))
    }

    fn from_center(x: f64, y: f64, width: f64, height: f64) -> DetectionCandidate {
        DetectionCandidate::new(0, 1.0, BoundingBox::from_center_and_size(Point::new(x, y), width, height))
    }

    #[test]
    fn nothing_registered_by_default() {
        let tracker = ObjectTracker::default();
        assert!(!tracker.is_registered(0));
        assert!(!tracker.is_registered(1));
    }

    #[test]
    fn first_candidate_gets_fresh_id() {
        let mut tracker = ObjectTracker::default();
        let c0 = from_coordinates(0.0, 0.0, 10.0, 10.0);
        let out = tracker.update(&[c0.clone()]);
        assert_eq!(out.get(&0), Some(&c0));
        assert!(tracker.is_registered(0));
    }

    #[test]
    fn candidate_is_updated() {
        let mut tracker = ObjectTracker::default();
        tracker.update(&[from_coordinates(0.0, 0.0, 10.0, 10.0)]);
        let c1 = from_coordinates(0.0, 0.0, 11.0, 11.0);
        let out = tracker.update(&[c1.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(&0), Some(&c1));
    }

    #[test]
    fn deregistered_after_max_disappeared_is_exceeded() {
        let mut tracker = ObjectTracker::new(1);
        tracker.update(&[from_coordinates(0.0, 0.0, 10.0, 10.0)]);
        assert!(tracker.update(&[]).is_empty());
        assert!(tracker.is_registered(0));
        assert!(tracker.update(&[]).is_empty());
        assert!(!tracker.is_registered(0), "object should be deregistered");
    }

    #[test]
    fn ids_are_not_reused_after_deregistration() {
        let mut tracker = ObjectTracker::new(0);
        tracker.update(&[from_coordinates(0.0, 0.0, 10.0, 10.0)]);
        tracker.update(&[]);
        assert!(!tracker.is_registered(0));
        let out = tracker.update(&[from_coordinates(0.0, 0.0, 10.0, 10.0)]);
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn candidate_further_apart_is_another_object() {
        let mut tracker = ObjectTracker::default();
        let c0 = from_center(10.0, 10.0, 10.0, 10.0);
        let c1 = from_center(111.0, 10.0, 10.0, 10.0);
        tracker.update(&[c0]);
        let out = tracker.update(&[c1.clone()]);
        assert_eq!(out.get(&1), Some(&c1));
        assert!(!out.contains_key(&0));
        assert!(tracker.is_registered(0));
        assert!(tracker.is_registered(1));
    }

    #[test]
    fn mostly_overlapping_far_candidate_is_same_object() {
        let mut tracker = ObjectTracker::default();
        let c0 = from_coordinates(0.0, 0.0, 200.0, 200.0);
        let c1 = from_coordinates(-110.0, 0.0, 150.0, 200.0);
        // top-left corners are 110 px apart, but the boxes overlap by 75 %
        assert!(c0.bounding_box.percental_intersection_area(&c1.bounding_box) > 0.7);
        tracker.update(&[c0]);
        let out = tracker.update(&[c1.clone()]);
        assert_eq!(out.get(&0), Some(&c1));
        assert!(!tracker.is_registered(1));
    }

    #[test]
    fn overlapping_candidate_with_too_different_size_is_new_object() {
        let mut tracker = ObjectTracker::default();
        let c0 = from_center(10.0, 10.0, 10.0, 10.0);
        let c1 = from_center(111.0, 10.0, 200.0, 10.0);
        assert!(c0.bounding_box.percental_intersection_area(&c1.bounding_box) >= 0.3);
        tracker.update(&[c0]);
        let out = tracker.update(&[c1.clone()]);
        assert_eq!(out.get(&1), Some(&c1));
    }

    #[test]
    fn each_candidate_gets_fresh_id() {
        let mut tracker = ObjectTracker::default();
        let c0 = from_center(10.0, 10.0, 10.0, 10.0);
        let c1 = from_center(600.0, 10.0, 10.0, 10.0);
        let out = tracker.update(&[c0.clone(), c1.clone()]);
        assert_eq!(out.get(&0), Some(&c0));
        assert_eq!(out.get(&1), Some(&c1));
    }

    #[test]
    fn closer_object_is_associated() {
        let mut tracker = ObjectTracker::default();
        let c0 = from_center(10.0, 10.0, 10.0, 10.0);
        let c1 = from_center(600.0, 10.0, 10.0, 10.0);
        let c2 = from_center(20.0, 10.0, 10.0, 10.0);
        tracker.update(&[c0, c1]);
        let out = tracker.update(&[c2.clone()]);
        assert!(!out.contains_key(&2));
        assert_eq!(out.get(&0), Some(&c2));
        assert!(!out.contains_key(&1));
        assert!(tracker.is_registered(1));
    }

    #[test]
    fn extra_inputs_are_registered() {
        let mut tracker = ObjectTracker::default();
        let c0 = from_center(10.0, 10.0, 10.0, 10.0);
        tracker.update(&[c0.clone()]);
        let c1 = from_center(400.0, 10.0, 10.0, 10.0);
        let out = tracker.update(&[c1.clone(), c0.clone()]);
        assert_eq!(out.get(&0), Some(&c0));
        assert_eq!(out.get(&1), Some(&c1));
    }

    #[test]
    fn too_different_size_is_another_object() {
        let mut tracker = ObjectTracker::default();
        let c0 = from_coordinates(0.0, 0.0, 5.0, 5.0);
        let c1 = from_coordinates(6.0, 0.0, 16.0, 10.1);
        assert_eq!(c0.bounding_box.area(), 25.0);
        assert!((c1.bounding_box.area() - 101.0).abs() < 1e-9);
        tracker.update(&[c0]);
        let out = tracker.update(&[c1.clone()]);
        assert_eq!(out.get(&1), Some(&c1));
        assert!(!out.contains_key(&0));
        assert!(tracker.is_registered(0));
        assert!(tracker.is_registered(1));
    }
}
