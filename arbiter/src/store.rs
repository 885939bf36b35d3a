use nalgebra::Vector2;

use crate::candidate::Candidate;
use crate::error::ArbiterError;

/// Growing set of scored candidate points. Insertion order is preserved so
/// the best-of tie-break is deterministic; removal only happens through
/// radius invalidation.
#[derive(Debug, Default)]
pub struct PredictionStore {
    predictions: Vec<Candidate>,
}

impl PredictionStore {
    pub fn new() -> PredictionStore {
        PredictionStore { predictions: Vec::new() }
    }

    pub fn insert(&mut self, candidate: Candidate) {
        self.predictions.push(candidate);
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// The candidate with the highest success probability. Ties resolve to
    /// the earliest inserted one.
    pub fn best(&self) -> Result<Candidate, ArbiterError> {
        let mut iter = self.predictions.iter();
        let mut best = *iter.next().ok_or(ArbiterError::EmptyStore)?;
        for candidate in iter {
            if candidate.probability > best.probability {
                best = *candidate;
            }
        }

        Ok(best)
    }

    /// Drop every candidate within `radius` pixels of `center`. Only
    /// candidates strictly farther than the radius survive.
    pub fn invalidate_around(&mut self, center: Vector2<i64>, radius: i64) {
        self.predictions
            .retain(|candidate| candidate.distance_to(&center) > radius as f64);
    }

    pub fn snapshot(&self) -> Vec<Candidate> {
        self.predictions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_returns_highest_probability() {
        let mut store = PredictionStore::new();
        store.insert(Candidate::new(10, 10, 0.3));
        store.insert(Candidate::new(20, 20, 0.9));
        store.insert(Candidate::new(30, 30, 0.5));

        let best = store.best().unwrap();
        assert_eq!(best.position, nalgebra::Vector2::new(20, 20));
    }

    #[test]
    fn best_tie_break_is_earliest_inserted() {
        let mut store = PredictionStore::new();
        store.insert(Candidate::new(1, 1, 0.8));
        store.insert(Candidate::new(2, 2, 0.8));

        let best = store.best().unwrap();
        assert_eq!(best.position, nalgebra::Vector2::new(1, 1));
    }

    #[test]
    fn best_on_empty_store_fails() {
        let store = PredictionStore::new();
        assert!(matches!(store.best(), Err(ArbiterError::EmptyStore)));
    }

    #[test]
    fn invalidation_boundary_is_strict() {
        let mut store = PredictionStore::new();
        // Distance 5 from origin, exactly on the boundary.
        store.insert(Candidate::new(3, 4, 0.5));
        // Distance 6, outside.
        store.insert(Candidate::new(0, 6, 0.5));

        store.invalidate_around(Vector2::new(0, 0), 5);

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].position, Vector2::new(0, 6));
    }

    #[test]
    fn invalidation_is_idempotent() {
        let mut store = PredictionStore::new();
        store.insert(Candidate::new(0, 0, 0.2));
        store.insert(Candidate::new(100, 100, 0.9));

        store.invalidate_around(Vector2::new(0, 0), 10);
        let after_once = store.snapshot();
        store.invalidate_around(Vector2::new(0, 0), 10);

        assert_eq!(store.snapshot(), after_once);
    }

    #[test]
    fn zero_radius_keeps_non_coincident_points() {
        let mut store = PredictionStore::new();
        store.insert(Candidate::new(5, 5, 0.1));
        store.insert(Candidate::new(6, 6, 0.2));
        store.insert(Candidate::new(7, 7, 0.3));

        store.invalidate_around(Vector2::new(50, 50), 0);

        assert_eq!(store.len(), 3);
    }
}
