use std::collections::BTreeSet;

use crate::DetectionCandidate;

const INTERSECTION_THRESHOLD: f64 = 0.3;

/// Drops candidates whose box overlaps a larger candidate by more than 30 %
/// of the smaller area. Relative order of the survivors is preserved.
pub fn filter_intersections(candidates: &[DetectionCandidate]) -> Vec<DetectionCandidate> {
    let count = candidates.len();
    if count == 0 {
        return Vec::new();
    }
    let mut excluded = BTreeSet::new();
    let mut result = Vec::with_capacity(count);

    'current: for c in 0..count - 1 {
        if excluded.contains(&c) {
            continue;
        }
        let current = &candidates[c].bounding_box;
        for o in c + 1..count {
            let other = &candidates[o].bounding_box;
            if current.percental_intersection_area(other) > INTERSECTION_THRESHOLD {
                if current.area() < other.area() {
                    excluded.insert(c);
                    continue 'current;
                }
                excluded.insert(o);
            }
        }
        result.push(candidates[c].clone());
    }
    if !excluded.contains(&(count - 1)) {
        result.push(candidates[count - 1].clone());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn candidate(x1: f64, y1: f64, x2: f64, y2: f64) -> DetectionCandidate {
        DetectionCandidate::new(0, 1.0, BoundingBox::from_coordinates(x1, y1, x2, y2))
    }

    #[test]
    fn empty_input() {
        assert!(filter_intersections(&[]).is_empty());
    }

    #[test]
    fn single_candidate_is_kept() {
        let c = candidate(0.0, 0.0, 10.0, 10.0);
        assert_eq!(filter_intersections(&[c.clone()]), vec![c]);
    }

    #[test]
    fn smaller_overlapping_candidate_is_removed() {
        let small = candidate(0.0, 0.0, 10.0, 10.0);
        let large = candidate(2.0, 2.0, 30.0, 30.0);
        assert_eq!(filter_intersections(&[small.clone(), large.clone()]), vec![large.clone()]);
        assert_eq!(filter_intersections(&[large.clone(), small]), vec![large]);
    }

    #[test]
    fn slight_overlap_keeps_both() {
        let a = candidate(0.0, 0.0, 10.0, 10.0);
        let b = candidate(8.0, 0.0, 18.0, 10.0);
        assert_eq!(filter_intersections(&[a.clone(), b.clone()]).len(), 2);
    }

    #[test]
    fn disjoint_candidates_of_different_size_are_kept() {
        let a = candidate(0.0, 0.0, 5.0, 5.0);
        let b = candidate(6.0, 0.0, 16.0, 10.1);
        assert_eq!(filter_intersections(&[a.clone(), b.clone()]), vec![a, b]);
    }

    #[test]
    fn excluded_candidate_is_not_compared_again() {
        // b lies inside a and c; a is larger than b but smaller than c
        let a = candidate(0.0, 0.0, 20.0, 20.0);
        let b = candidate(5.0, 5.0, 10.0, 10.0);
        let c = candidate(0.0, 0.0, 40.0, 40.0);
        let d = candidate(100.0, 100.0, 110.0, 110.0);
        let out = filter_intersections(&[a, b, c.clone(), d.clone()]);
        assert_eq!(out, vec![c, d]);
    }
}
