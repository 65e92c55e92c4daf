use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned rectangle; `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn from_coordinates(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    pub fn from_center_and_size(center: Point, width: f64, height: f64) -> Self {
        Self {
            x: center.x - width / 2.0,
            y: center.y - height / 2.0,
            width,
            height,
        }
    }

    /// Smallest box enclosing all points. No points yield an empty box at the origin.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Self {
        let mut it = points.into_iter();
        let Some(first) = it.next() else { return Self::default(); };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in it {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self::from_coordinates(min_x, min_y, max_x, max_y)
    }

    /// Flat `[x1, y1, x2, y2, ...]` list; a trailing odd value is ignored.
    pub fn from_coordinate_list(coordinates: &[f64]) -> Self {
        Self::from_points(coordinates.chunks_exact(2).map(|c| Point::new(c[0], c[1])))
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Moves the box so that its center is `center`, keeping its size.
    pub fn set_center(&mut self, center: Point) {
        self.x = center.x - self.width / 2.0;
        self.y = center.y - self.height / 2.0;
    }

    pub fn coordinates(&self) -> (f64, f64, f64, f64) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.x <= p.x && p.x <= self.x + self.width && self.y <= p.y && p.y <= self.y + self.height
    }

    /// Without overlap the result is an empty box at the would-be top-left corner.
    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        if x1 > x2 || y1 > y2 {
            return BoundingBox::from_coordinates(x1, y1, x1, y1);
        }
        BoundingBox::from_coordinates(x1, y1, x2, y2)
    }

    /// Intersection area relative to the smaller of both boxes.
    pub fn percental_intersection_area(&self, other: &BoundingBox) -> f64 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            return 0.0;
        }
        self.intersect(other).area() / smaller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_point_box() {
        let b = BoundingBox::from_coordinates(10.0, 20.0, 30.0, 60.0);
        assert_eq!((b.x, b.y, b.width, b.height), (10.0, 20.0, 20.0, 40.0));
        assert_eq!(b.center(), Point::new(20.0, 40.0));
        assert_eq!(b.coordinates(), (10.0, 20.0, 30.0, 60.0));
        assert_eq!(BoundingBox::from_coordinates(30.0, 60.0, 10.0, 20.0), b);
    }

    #[test]
    fn center_and_size_box() {
        let b = BoundingBox::from_center_and_size(Point::new(10.0, 10.0), 10.0, 4.0);
        assert_eq!(b.coordinates(), (5.0, 8.0, 15.0, 12.0));
        assert_eq!(b.area(), 40.0);
    }

    #[test]
    fn enclosing_box_of_coordinates() {
        let b = BoundingBox::from_coordinate_list(&[5.0, 9.0, 1.0, 3.0, 4.0, 12.0]);
        assert_eq!(b.coordinates(), (1.0, 3.0, 5.0, 12.0));
    }

    #[test]
    fn containment_includes_edges() {
        let b = BoundingBox::from_coordinates(20.0, 20.0, 25.0, 25.0);
        assert!(b.contains_point(&Point::new(20.0, 25.0)));
        assert!(b.contains_point(&Point::new(21.0, 21.0)));
        assert!(!b.contains_point(&Point::new(5.0, 10.0)));
    }

    #[test]
    fn disjoint_boxes_have_empty_intersection() {
        let a = BoundingBox::from_coordinates(0.0, 0.0, 5.0, 5.0);
        let b = BoundingBox::from_coordinates(6.0, 0.0, 16.0, 10.1);
        assert_eq!(a.intersect(&b).area(), 0.0);
        assert_eq!(a.percental_intersection_area(&b), 0.0);
    }

    #[test]
    fn intersection_is_relative_to_smaller_box() {
        let small = BoundingBox::from_center_and_size(Point::new(10.0, 10.0), 10.0, 10.0);
        let wide = BoundingBox::from_center_and_size(Point::new(111.0, 10.0), 200.0, 10.0);
        assert!((small.percental_intersection_area(&wide) - 0.4).abs() < 1e-9);
        assert!((wide.percental_intersection_area(&small) - 0.4).abs() < 1e-9);
        assert_eq!(small.center().distance_to(&wide.center()), 101.0);
    }

    #[test]
    fn zero_area_box_never_intersects() {
        let a = BoundingBox::from_coordinates(0.0, 0.0, 0.0, 10.0);
        let b = BoundingBox::from_coordinates(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.percental_intersection_area(&b), 0.0);
    }
}
