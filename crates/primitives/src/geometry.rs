use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// A point in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}
}

/// Axis-aligned bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl Rect {
	/// Creates a rectangle, clamping negative dimensions to zero.
	pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
		Self {
			x,
			y,
			width: width.max(0.0),
			height: height.max(0.0),
		}
	}

	pub fn left(&self) -> f64 {
		self.x
	}

	pub fn right(&self) -> f64 {
		self.x + self.width
	}

	pub fn top(&self) -> f64 {
		self.y
	}

	pub fn bottom(&self) -> f64 {
		self.y + self.height
	}

	/// Returns true when the rectangle covers no area.
	///
	/// Hosts report zero-sized boxes for detached or `display: none` elements.
	pub fn is_empty(&self) -> bool {
		self.width <= 0.0 || self.height <= 0.0
	}

	/// Inclusive origin, exclusive far edges.
	pub fn contains(&self, point: Point) -> bool {
		point.x >= self.left() && point.x < self.right() && point.y >= self.top() && point.y < self.bottom()
	}

	/// Grows the rectangle by `margin` on every side.
	pub fn inflate(&self, margin: f64) -> Self {
		Self::new(self.x - margin, self.y - margin, self.width + margin * 2.0, self.height + margin * 2.0)
	}

	/// Returns true when the two rectangles overlap with non-zero area.
	pub fn intersects(&self, other: &Rect) -> bool {
		self.left() < other.right() && other.left() < self.right() && self.top() < other.bottom() && other.top() < self.bottom()
	}
}
