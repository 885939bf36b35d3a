use nalgebra::Vector2;

/// A scored pixel location produced by probing the current camera frame.
/// Immutable once created; the store only ever inserts or removes whole
/// candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub position: Vector2<i64>,
    pub probability: f64,
}

impl Candidate {
    pub fn new(x: i64, y: i64, probability: f64) -> Candidate {
        Candidate {
            position: Vector2::new(x, y),
            probability,
        }
    }

    /// Euclidean pixel distance to a reference point.
    pub fn distance_to(&self, point: &Vector2<i64>) -> f64 {
        let delta = self.position - point;
        ((delta.x * delta.x + delta.y * delta.y) as f64).sqrt()
    }
}
