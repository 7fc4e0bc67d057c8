use crate::schema::{BBox, Detection};

/// Build a prediction for tests
///
/// # Example
///
/// ```rust
/// use deteval::test_utils::pred;
///
/// let p = pred("img-1", 0, 0.9, [0.0, 0.0, 10.0, 10.0]);
/// assert_eq!(p.confidence, 0.9);
/// ```
pub fn pred(image_id: &str, class_id: usize, confidence: f64, bbox: BBox) -> Detection {
    Detection::prediction(image_id, class_id, confidence, bbox)
}

/// Build a ground-truth annotation for tests
pub fn gt(image_id: &str, class_id: usize, bbox: BBox) -> Detection {
    Detection::ground_truth(image_id, class_id, bbox)
}

/// Non-overlapping 10x10 boxes laid out 16 per row, one per index
///
/// Handy for building many independent detections in one image.
pub fn grid_box(index: usize) -> BBox {
    let x = (index % 16) as f64 * 20.0;
    let y = (index / 16) as f64 * 20.0;
    [x, y, x + 10.0, y + 10.0]
}

/// Predictions that exactly reproduce `ground_truths`, with descending confidence
pub fn perfect_predictions(ground_truths: &[Detection]) -> Vec<Detection> {
    let n = ground_truths.len().max(1) as f64;
    ground_truths
        .iter()
        .enumerate()
        .map(|(i, g)| {
            Detection::prediction(
                g.image_id.clone(),
                g.class_id,
                1.0 - i as f64 / (2.0 * n),
                g.bbox,
            )
        })
        .collect()
}
