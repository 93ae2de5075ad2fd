use proptest::prelude::*;

use super::{Point, Rect};

#[test]
fn new_rect_clamps_negative_dimensions() {
	let rect = Rect::new(4.0, 4.0, -3.0, 10.0);
	assert_eq!(rect.width, 0.0);
	assert_eq!(rect.height, 10.0);
	assert!(rect.is_empty());
}

#[test]
fn contains_uses_inclusive_origin_exclusive_max() {
	let rect = Rect::new(10.0, 5.0, 3.0, 2.0);
	assert!(rect.contains(Point::new(10.0, 5.0)));
	assert!(rect.contains(Point::new(12.5, 6.5)));
	assert!(!rect.contains(Point::new(13.0, 6.0)));
	assert!(!rect.contains(Point::new(12.0, 7.0)));
}

#[test]
fn inflate_expands_every_edge() {
	let rect = Rect::new(10.0, 10.0, 20.0, 20.0).inflate(4.0);
	assert_eq!(rect, Rect::new(6.0, 6.0, 28.0, 28.0));
}

#[test]
fn touching_rects_do_not_intersect() {
	let a = Rect::new(0.0, 0.0, 10.0, 10.0);
	let b = Rect::new(10.0, 0.0, 10.0, 10.0);
	assert!(!a.intersects(&b));
	assert!(a.intersects(&Rect::new(9.0, 9.0, 2.0, 2.0)));
}

proptest! {
	#[test]
	fn inflated_rect_contains_original_points(
		x in -500.0f64..500.0,
		y in -500.0f64..500.0,
		w in 1.0f64..200.0,
		h in 1.0f64..200.0,
		margin in 0.0f64..50.0,
	) {
		let rect = Rect::new(x, y, w, h);
		let grown = rect.inflate(margin);
		prop_assert!(grown.contains(Point::new(x, y)));
		prop_assert!(grown.contains(Point::new(x + w / 2.0, y + h / 2.0)));
	}
}
