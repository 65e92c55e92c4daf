use cameraman_vision::{BoundingBox, Point};

/// Where and how large the target should appear in the live view.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub center: Point,
    /// Dead zone around the center in which no rotation is needed.
    pub dead_zone: BoundingBox,
    pub variance: f64,
    pub min_size_box: BoundingBox,
    pub max_size_box: BoundingBox,
}

impl Destination {
    pub fn new(width: u32, height: u32, variance: f64) -> Self {
        let (width, height) = (f64::from(width), f64::from(height));
        let center = Point::new(width / 2.0, height / 2.0);
        let x_padding = 0.3 * width;
        let y_padding = 0.2 * height;
        let max_w = width - 2.0 * x_padding;
        let max_h = height - 2.0 * y_padding;
        let mut destination = Self {
            center,
            dead_zone: BoundingBox::from_center_and_size(center, variance * 2.0, variance * 2.0),
            variance,
            min_size_box: BoundingBox { width: max_w - 2.0 * variance, height: max_h - 2.0 * variance, ..Default::default() },
            max_size_box: BoundingBox { width: max_w, height: max_h, ..Default::default() },
        };
        destination.update_size_box_center(center.x, center.y);
        destination
    }

    pub fn update_size_box_center(&mut self, x: f64, y: f64) {
        self.max_size_box.set_center(Point::new(x, y));
        self.min_size_box.set_center(Point::new(x, y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_envelope_of_vga_frame() {
        let d = Destination::new(640, 480, 50.0);
        assert_eq!(d.center, Point::new(320.0, 240.0));
        assert_eq!(d.dead_zone, BoundingBox::from_coordinates(270.0, 190.0, 370.0, 290.0));
        assert_eq!((d.max_size_box.width, d.max_size_box.height), (256.0, 288.0));
        assert_eq!((d.min_size_box.width, d.min_size_box.height), (156.0, 188.0));
        assert_eq!(d.max_size_box.center(), d.center);
        assert_eq!(d.min_size_box.center(), d.center);
    }

    #[test]
    fn size_boxes_follow_target() {
        let mut d = Destination::new(640, 480, 50.0);
        d.update_size_box_center(100.0, 50.0);
        assert_eq!(d.max_size_box.center(), Point::new(100.0, 50.0));
        assert_eq!(d.min_size_box.center(), Point::new(100.0, 50.0));
        assert_eq!(d.max_size_box.height, 288.0);
        // dead zone stays where it is
        assert_eq!(d.dead_zone.center(), Point::new(320.0, 240.0));
    }
}
