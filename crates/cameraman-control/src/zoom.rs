use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::limits::DEFAULT_ZOOM_RATIO_LIMITS;

/// Range of zoom motor indices a camera reports for one zoom ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRatioIndexRange {
    pub zoom_ratio: f64,
    pub min_index: u32,
    pub max_index: u32,
}

/// Collects ranges while the zoom is swept from one end to the other.
#[derive(Debug, Default)]
pub struct ZoomRatioIndexRangesBuilder {
    ranges: Vec<ZoomRatioIndexRange>,
}

impl ZoomRatioIndexRangesBuilder {
    pub fn add(&mut self, zoom_index: u32, zoom_ratio: f64) {
        match self.ranges.iter_mut().find(|r| r.zoom_ratio == zoom_ratio) {
            Some(range) => range.max_index = zoom_index,
            None => self.ranges.push(ZoomRatioIndexRange {
                zoom_ratio,
                min_index: zoom_index,
                max_index: zoom_index,
            }),
        }
    }

    pub fn build(self) -> Vec<ZoomRatioIndexRange> {
        self.ranges
    }
}

/// Zoom ratio whose index range contains `zoom_index`.
pub fn zoom_ratio_of_index(ranges: &[ZoomRatioIndexRange], zoom_index: u32) -> Option<f64> {
    ranges
        .iter()
        .find(|r| r.min_index <= zoom_index && zoom_index <= r.max_index)
        .map(|r| r.zoom_ratio)
}

/// (min, max) zoom ratio of the configured ranges.
pub fn zoom_ratio_limits(ranges: &[ZoomRatioIndexRange]) -> (f64, f64) {
    let mut ratios = ranges.iter().map(|r| r.zoom_ratio);
    let Some(first) = ratios.next() else {
        warn!(
            "default zoom limits {:?} are used, since no zoom ratio index ranges are configured",
            DEFAULT_ZOOM_RATIO_LIMITS
        );
        return DEFAULT_ZOOM_RATIO_LIMITS;
    };
    ratios.fold((first, first), |(min, max), r| (min.min(r), max.max(r)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep() -> Vec<ZoomRatioIndexRange> {
        let mut b = ZoomRatioIndexRangesBuilder::default();
        for (index, ratio) in [(0, 1.0), (3, 1.0), (5, 1.0), (6, 2.0), (11, 2.0), (48, 14.3)] {
            b.add(index, ratio);
        }
        b.build()
    }

    #[test]
    fn builder_widens_ranges() {
        assert_eq!(
            sweep(),
            vec![
                ZoomRatioIndexRange { zoom_ratio: 1.0, min_index: 0, max_index: 5 },
                ZoomRatioIndexRange { zoom_ratio: 2.0, min_index: 6, max_index: 11 },
                ZoomRatioIndexRange { zoom_ratio: 14.3, min_index: 48, max_index: 48 },
            ]
        );
    }

    #[test]
    fn limits_of_ranges() {
        assert_eq!(zoom_ratio_limits(&sweep()), (1.0, 14.3));
        assert_eq!(zoom_ratio_limits(&[]), (1.0, 14.3));
        let single = [ZoomRatioIndexRange { zoom_ratio: 3.0, min_index: 1, max_index: 2 }];
        assert_eq!(zoom_ratio_limits(&single), (3.0, 3.0));
    }

    #[test]
    fn ratio_lookup() {
        let ranges = sweep();
        assert_eq!(zoom_ratio_of_index(&ranges, 4), Some(1.0));
        assert_eq!(zoom_ratio_of_index(&ranges, 11), Some(2.0));
        assert_eq!(zoom_ratio_of_index(&ranges, 30), None);
    }
}
