//! Translate a point on the image into a spatial phrase.
//!
//! Each axis is split into three bands at 33 and 66 percent. The comparisons are
//! strict, so exactly 33 or 66 falls into the center band:
//!
//! | x / y   | top                      | center             | bottom                      |
//! |---------|--------------------------|--------------------|-----------------------------|
//! | left    | in the top-left corner   | on the left side   | in the bottom-left corner   |
//! | center  | at the top edge          | in the center      | at the bottom edge          |
//! | right   | in the top-right corner  | on the right side  | in the bottom-right corner  |

/// Lower band threshold, in percent.
const LOW_THRESHOLD: f32 = 33.0;
/// Upper band threshold, in percent.
const HIGH_THRESHOLD: f32 = 66.0;

/// Phrase used for the default target and for any input outside `[0, 100]`.
pub const FALLBACK_PHRASE: &str = "in the bottom-right corner";

/// Every phrase [`classify`] can produce, rows top to bottom, columns left to right.
pub const PHRASES: [[&str; 3]; 3] = [
    [
        "in the top-left corner",
        "at the top edge",
        "in the top-right corner",
    ],
    ["on the left side", "in the center", "on the right side"],
    [
        "in the bottom-left corner",
        "at the bottom edge",
        FALLBACK_PHRASE,
    ],
];

/// Map a point given in percentages to one of nine spatial phrases.
///
/// Total and deterministic. Non-finite or out-of-range coordinates return
/// [`FALLBACK_PHRASE`], which matches the default target.
#[must_use]
pub fn classify(x: f32, y: f32) -> &'static str {
    let in_range = |v: f32| (0.0..=100.0).contains(&v);
    if !in_range(x) || !in_range(y) {
        return FALLBACK_PHRASE;
    }
    PHRASES[band(y)][band(x)]
}

/// Band index for one axis: 0 = left/top, 1 = center, 2 = right/bottom.
fn band(v: f32) -> usize {
    if v < LOW_THRESHOLD {
        0
    } else if v > HIGH_THRESHOLD {
        2
    } else {
        1
    }
}

/// Strip the leading preposition from a phrase for compact display.
///
/// `"in the bottom-right corner"` becomes `"bottom-right corner"`.
#[must_use]
pub fn short_label(phrase: &str) -> &str {
    ["in the ", "at the ", "on the "]
        .iter()
        .find_map(|prefix| phrase.strip_prefix(prefix))
        .unwrap_or(phrase)
}

/// A pointer position in display coordinates (e.g. pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    /// Horizontal position.
    pub x: f32,
    /// Vertical position.
    pub y: f32,
}

/// Bounding box of the displayed image, in the same units as [`Pointer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
}

impl Bounds {
    /// Bounds of an image displayed at its natural size with its origin at `(0, 0)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn of_size(width: u32, height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }
}

/// Target position as percentages of the displayed image, both in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPoint {
    /// Horizontal percentage from the left edge.
    pub x: f32,
    /// Vertical percentage from the top edge.
    pub y: f32,
}

impl TargetPoint {
    /// Default target, biased toward the bottom-right where watermarks usually sit.
    pub const DEFAULT: TargetPoint = TargetPoint { x: 85.0, y: 85.0 };

    /// Build a target from percentages, clamping each axis into `[0, 100]`.
    ///
    /// NaN coordinates are replaced by the default target.
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        if x.is_nan() || y.is_nan() {
            return Self::DEFAULT;
        }
        Self {
            x: x.clamp(0.0, 100.0),
            y: y.clamp(0.0, 100.0),
        }
    }

    /// Convert a pointer position relative to `bounds` into percentages.
    ///
    /// Positions outside the box are clamped to its edges. A box without area
    /// yields [`TargetPoint::DEFAULT`].
    #[must_use]
    pub fn from_pointer(pointer: Pointer, bounds: Bounds) -> Self {
        let has_area = bounds.width > 0.0 && bounds.height > 0.0;
        if !has_area {
            return Self::DEFAULT;
        }
        Self::new(
            (pointer.x - bounds.left) / bounds.width * 100.0,
            (pointer.y - bounds.top) / bounds.height * 100.0,
        )
    }

    /// The spatial phrase for this point, always derived from the coordinates.
    #[must_use]
    pub fn phrase(&self) -> &'static str {
        classify(self.x, self.y)
    }
}

impl Default for TargetPoint {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_points() {
        assert_eq!(classify(50.0, 50.0), "in the center");
        assert_eq!(classify(90.0, 90.0), "in the bottom-right corner");
        assert_eq!(classify(10.0, 50.0), "on the left side");
        assert_eq!(classify(20.0, 20.0), "in the top-left corner");
        assert_eq!(classify(50.0, 10.0), "at the top edge");
        assert_eq!(classify(90.0, 10.0), "in the top-right corner");
        assert_eq!(classify(90.0, 50.0), "on the right side");
        assert_eq!(classify(10.0, 90.0), "in the bottom-left corner");
        assert_eq!(classify(50.0, 90.0), "at the bottom edge");
    }

    #[test]
    fn thresholds_fall_on_center_side() {
        assert_eq!(classify(33.0, 33.0), "in the center");
        assert_eq!(classify(66.0, 66.0), "in the center");
        assert_eq!(classify(32.9, 50.0), "on the left side");
        assert_eq!(classify(66.1, 50.0), "on the right side");
    }

    #[test]
    fn classify_covers_exactly_nine_phrases() {
        let all: Vec<&str> = PHRASES.iter().flatten().copied().collect();
        let mut seen = std::collections::HashSet::new();
        for x in 0..=100u8 {
            for y in 0..=100u8 {
                let phrase = classify(f32::from(x), f32::from(y));
                assert!(all.contains(&phrase), "unexpected phrase {phrase}");
                seen.insert(phrase);
            }
        }
        assert_eq!(seen.len(), 9);
    }

    #[test]
    fn out_of_range_input_falls_back_to_bottom_right() {
        assert_eq!(classify(f32::NAN, 50.0), FALLBACK_PHRASE);
        assert_eq!(classify(50.0, f32::INFINITY), FALLBACK_PHRASE);
        assert_eq!(classify(-5.0, 10.0), FALLBACK_PHRASE);
        assert_eq!(classify(10.0, 140.0), FALLBACK_PHRASE);
    }

    #[test]
    fn default_target_is_bottom_right() {
        let target = TargetPoint::default();
        assert_eq!(target, TargetPoint { x: 85.0, y: 85.0 });
        assert_eq!(target.phrase(), "in the bottom-right corner");
    }

    #[test]
    fn pointer_is_converted_to_percentages() {
        let bounds = Bounds {
            left: 100.0,
            top: 50.0,
            width: 400.0,
            height: 200.0,
        };
        let target = TargetPoint::from_pointer(Pointer { x: 180.0, y: 90.0 }, bounds);
        assert!((target.x - 20.0).abs() < 1e-4);
        assert!((target.y - 20.0).abs() < 1e-4);
        assert_eq!(target.phrase(), "in the top-left corner");
    }

    #[test]
    fn pointer_outside_bounds_is_clamped() {
        let bounds = Bounds::of_size(200, 100);
        let target = TargetPoint::from_pointer(Pointer { x: -30.0, y: 500.0 }, bounds);
        assert_eq!(target, TargetPoint { x: 0.0, y: 100.0 });
    }

    #[test]
    fn degenerate_bounds_yield_default() {
        let bounds = Bounds::of_size(0, 100);
        let target = TargetPoint::from_pointer(Pointer { x: 10.0, y: 10.0 }, bounds);
        assert_eq!(target, TargetPoint::DEFAULT);
    }

    #[test]
    fn short_label_strips_preposition() {
        assert_eq!(short_label("in the bottom-right corner"), "bottom-right corner");
        assert_eq!(short_label("at the top edge"), "top edge");
        assert_eq!(short_label("on the left side"), "left side");
        assert_eq!(short_label("somewhere"), "somewhere");
    }
}
