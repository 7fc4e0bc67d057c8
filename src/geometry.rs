//! Box geometry shared by both matching policies.

use crate::schema::BBox;

/// Area of a box; zero for inverted or empty boxes
pub fn area(b: &BBox) -> f64 {
    (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)
}

/// Finite coordinates with `x1 < x2` and `y1 < y2`
pub fn is_well_formed(b: &BBox) -> bool {
    b.iter().all(|v| v.is_finite()) && b[0] < b[2] && b[1] < b[3]
}

/// Intersection-over-union of two boxes, always in `[0, 1]`.
///
/// Non-overlapping boxes and a zero union both yield 0.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    let inter_w = a[2].min(b[2]) - a[0].max(b[0]);
    let inter_h = a[3].min(b[3]) - a[1].max(b[1]);
    if inter_w <= 0.0 || inter_h <= 0.0 {
        return 0.0;
    }

    let intersection = inter_w * inter_h;
    let union = area(a) + area(b) - intersection;
    if union <= 0.0 {
        return 0.0;
    }

    (intersection / union).clamp(0.0, 1.0)
}
