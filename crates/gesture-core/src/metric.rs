//! Pinch metric between thumb tip and index tip.

use crate::{
    GestureError,
    landmarks::{Hand, Landmark},
};

/// Euclidean pixel distance between the thumb tip and index tip.
pub fn pinch_distance(hand: &Hand) -> f32 {
    distance(hand.thumb_tip(), hand.index_tip())
}

/// Same as [`pinch_distance`] for an untyped landmark list straight from an
/// estimator.
pub fn pinch_distance_from_points(points: &[Landmark]) -> Result<f32, GestureError> {
    let hand = Hand::try_from(points)?;
    Ok(pinch_distance(&hand))
}

/// Integer midpoint of the thumb and index tips.
pub fn midpoint(hand: &Hand) -> (i32, i32) {
    let thumb = hand.thumb_tip();
    let index = hand.index_tip();
    (half_sum(thumb.x, index.x), half_sum(thumb.y, index.y))
}

// The floored mean of two i32 values always fits back into i32.
fn half_sum(a: i32, b: i32) -> i32 {
    (i64::from(a) + i64::from(b)).div_euclid(2) as i32
}

fn distance(a: Landmark, b: Landmark) -> f32 {
    let dx = f64::from(b.x) - f64::from(a.x);
    let dy = f64::from(b.y) - f64::from(a.y);
    dx.hypot(dy) as f32
}
