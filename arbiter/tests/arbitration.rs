use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use arbiter::{
    Arbiter, ArbiterConfig, ArbiterError, ArbitrationMode, BoxSensor, Candidate, CoordProvider,
    FrameSource, PredictionSink, PredictionStore, Scorer, ServiceState,
};
use nalgebra::Vector2;

struct NullFrame;

impl FrameSource for NullFrame {
    fn refresh(&mut self) -> Result<(), ArbiterError> {
        Ok(())
    }
}

/// Records every published snapshot.
#[derive(Default)]
struct RecordingSink {
    published: Vec<Vec<Candidate>>,
}

impl PredictionSink for RecordingSink {
    fn publish(&mut self, predictions: &[Candidate]) {
        self.published.push(predictions.to_vec());
    }
}

/// Reports the box as non-empty a fixed number of times, then empty.
struct CountdownSensor {
    remaining: usize,
}

impl BoxSensor for CountdownSensor {
    fn box_is_empty(&mut self) -> Result<bool, ArbiterError> {
        if self.remaining == 0 {
            Ok(true)
        } else {
            self.remaining -= 1;
            Ok(false)
        }
    }
}

struct ScriptedProvider {
    coords: VecDeque<(i64, i64)>,
}

impl CoordProvider for ScriptedProvider {
    fn random_on_object(&mut self) -> Result<Vector2<i64>, ArbiterError> {
        let (x, y) = self
            .coords
            .pop_front()
            .ok_or_else(|| ArbiterError::Scoring("no object found".to_string()))?;
        Ok(Vector2::new(x, y))
    }
}

struct ScriptedScorer {
    scores: VecDeque<f64>,
}

impl Scorer for ScriptedScorer {
    fn score(&mut self, _position: Vector2<i64>) -> Result<f64, ArbiterError> {
        self.scores
            .pop_front()
            .ok_or_else(|| ArbiterError::Scoring("scorer exhausted".to_string()))
    }
}

fn test_config() -> ArbiterConfig {
    ArbiterConfig {
        invalidation_radius: 5,
        fixed_invalidation_point: Vector2::new(1000, 1000),
        selection_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(5),
        sample_interval: Duration::from_millis(1),
        ..ArbiterConfig::default()
    }
}

/// Fill the store by running the replenishment loop against scripted
/// collaborators until the box reports empty.
fn populate(arbiter: &Arbiter, samples: &[(i64, i64, f64)]) {
    let mut sensor = CountdownSensor { remaining: samples.len() };
    let mut provider = ScriptedProvider {
        coords: samples.iter().map(|(x, y, _)| (*x, *y)).collect(),
    };
    let mut scorer = ScriptedScorer {
        scores: samples.iter().map(|(_, _, p)| *p).collect(),
    };
    let mut sink = RecordingSink::default();
    arbiter.run_sampling(&mut sensor, &mut provider, &mut scorer, &mut sink);
}

#[test]
fn classic_selects_best_and_invalidates_neighborhood() {
    let arbiter = Arbiter::new(test_config()).unwrap();
    populate(&arbiter, &[(10, 10, 0.3), (20, 20, 0.9), (30, 30, 0.95)]);

    let mut sink = RecordingSink::default();
    let selected = arbiter
        .handle_request(ArbitrationMode::Classic, &mut NullFrame, &mut sink)
        .unwrap()
        .unwrap();

    assert_eq!(selected.position, Vector2::new(30, 30));
    assert!((selected.probability - 0.95).abs() < 1e-12);
    assert_eq!(arbiter.picking_point(), Some(Vector2::new(30, 30)));

    // (20,20) is ~14.1 pixels away from the pick, (10,10) even farther; both
    // survive a radius of 5.
    let remaining = arbiter.snapshot();
    assert_eq!(remaining.len(), 2);
    assert!(remaining
        .iter()
        .all(|c| c.distance_to(&Vector2::new(30, 30)) > 5.0));
}

#[test]
fn classic_never_returns_below_threshold() {
    let arbiter = Arbiter::new(test_config()).unwrap();
    populate(&arbiter, &[(10, 10, 0.69), (200, 200, 0.71), (400, 400, 0.2)]);

    let mut sink = RecordingSink::default();
    let selected = arbiter
        .handle_request(ArbitrationMode::Classic, &mut NullFrame, &mut sink)
        .unwrap()
        .unwrap();

    assert!(selected.probability >= arbiter.config().confidence_threshold);
    assert_eq!(selected.position, Vector2::new(200, 200));
}

#[test]
fn classic_on_empty_store_fails_and_changes_nothing() {
    let arbiter = Arbiter::new(test_config()).unwrap();

    let mut sink = RecordingSink::default();
    let result = arbiter.handle_request(ArbitrationMode::Classic, &mut NullFrame, &mut sink);

    assert!(matches!(result, Err(ArbiterError::EmptyStore)));
    assert!(arbiter.snapshot().is_empty());
    assert_eq!(arbiter.picking_point(), None);
    assert!(sink.published.is_empty());
}

#[test]
fn selection_times_out_when_no_candidate_qualifies() {
    let arbiter = Arbiter::new(test_config()).unwrap();
    populate(&arbiter, &[(10, 10, 0.3), (20, 20, 0.4)]);

    let mut sink = RecordingSink::default();
    let result = arbiter.handle_request(ArbitrationMode::Classic, &mut NullFrame, &mut sink);

    assert!(matches!(result, Err(ArbiterError::SelectionTimeout { .. })));
    // Nothing was invalidated by the failed request.
    assert_eq!(arbiter.snapshot().len(), 2);
}

#[test]
fn without_invalidation_keeps_the_selected_neighborhood() {
    let arbiter = Arbiter::new(test_config()).unwrap();
    populate(&arbiter, &[(30, 30, 0.95), (32, 32, 0.8)]);

    let mut sink = RecordingSink::default();
    let selected = arbiter
        .handle_request(ArbitrationMode::WithoutInvalidation, &mut NullFrame, &mut sink)
        .unwrap()
        .unwrap();

    assert_eq!(selected.position, Vector2::new(30, 30));
    // Both candidates sit inside the radius of the selection but survive.
    assert_eq!(arbiter.snapshot().len(), 2);
    assert_eq!(arbiter.picking_point(), Some(Vector2::new(30, 30)));
}

#[test]
fn classic_also_clears_the_fixed_dead_zone() {
    let config = ArbiterConfig {
        fixed_invalidation_point: Vector2::new(230, 230),
        ..test_config()
    };
    let arbiter = Arbiter::new(config).unwrap();
    populate(&arbiter, &[(230, 232, 0.3), (231, 229, 0.4), (400, 400, 0.9)]);

    let mut sink = RecordingSink::default();
    let selected = arbiter
        .handle_request(ArbitrationMode::Classic, &mut NullFrame, &mut sink)
        .unwrap()
        .unwrap();

    assert_eq!(selected.position, Vector2::new(400, 400));
    // The selection removed its own neighborhood and the fixed dead zone
    // swallowed the two candidates near (230, 230).
    assert!(arbiter.snapshot().is_empty());
}

#[test]
fn without_invalidation_still_clears_the_fixed_dead_zone() {
    let config = ArbiterConfig {
        fixed_invalidation_point: Vector2::new(230, 230),
        ..test_config()
    };
    let arbiter = Arbiter::new(config).unwrap();
    populate(&arbiter, &[(230, 232, 0.3), (400, 400, 0.9), (402, 402, 0.8)]);

    let mut sink = RecordingSink::default();
    let selected = arbiter
        .handle_request(ArbitrationMode::WithoutInvalidation, &mut NullFrame, &mut sink)
        .unwrap()
        .unwrap();

    assert_eq!(selected.position, Vector2::new(400, 400));
    // The selection's neighborhood survives untouched, the fixed zone does not.
    let remaining = arbiter.snapshot();
    assert_eq!(remaining.len(), 2);
    assert!(remaining
        .iter()
        .all(|c| c.distance_to(&Vector2::new(230, 230)) > 5.0));
}

#[test]
fn just_invalidation_clears_the_fixed_dead_zone() {
    let config = ArbiterConfig {
        fixed_invalidation_point: Vector2::new(230, 230),
        ..test_config()
    };
    let arbiter = Arbiter::new(config).unwrap();
    populate(&arbiter, &[(230, 231, 0.9), (230, 234, 0.8), (400, 400, 0.1)]);

    let mut sink = RecordingSink::default();
    let result = arbiter
        .handle_request(ArbitrationMode::JustInvalidation, &mut NullFrame, &mut sink)
        .unwrap();

    assert!(result.is_none());
    let remaining = arbiter.snapshot();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].position, Vector2::new(400, 400));
    // The force-cleared coordinate becomes the picking point.
    assert_eq!(arbiter.picking_point(), Some(Vector2::new(230, 230)));
}

#[test]
fn box_empty_freezes_the_store_but_keeps_serving() {
    let arbiter = Arbiter::new(test_config()).unwrap();
    populate(&arbiter, &[(10, 10, 0.9), (500, 500, 0.85)]);
    assert_eq!(arbiter.state(), ServiceState::Stopped);

    let mut sink = RecordingSink::default();
    let first = arbiter
        .handle_request(ArbitrationMode::Classic, &mut NullFrame, &mut sink)
        .unwrap()
        .unwrap();
    let second = arbiter
        .handle_request(ArbitrationMode::Classic, &mut NullFrame, &mut sink)
        .unwrap()
        .unwrap();

    assert_eq!(first.position, Vector2::new(10, 10));
    assert_eq!(second.position, Vector2::new(500, 500));

    // The frozen store is now exhausted.
    let result = arbiter.handle_request(ArbitrationMode::Classic, &mut NullFrame, &mut sink);
    assert!(matches!(result, Err(ArbiterError::EmptyStore)));
}

#[test]
fn immediate_box_empty_produces_no_samples() {
    let arbiter = Arbiter::new(test_config()).unwrap();
    populate(&arbiter, &[]);

    assert_eq!(arbiter.state(), ServiceState::Stopped);
    assert!(arbiter.snapshot().is_empty());
}

#[test]
fn failed_probes_are_skipped_not_fatal() {
    let arbiter = Arbiter::new(test_config()).unwrap();
    // Three loop iterations but only one scripted coordinate; the other two
    // iterations fail inside the provider and must be skipped.
    let mut sensor = CountdownSensor { remaining: 3 };
    let mut provider = ScriptedProvider { coords: VecDeque::from([(50, 50)]) };
    let mut scorer = ScriptedScorer { scores: VecDeque::from([0.8]) };
    let mut sink = RecordingSink::default();
    arbiter.run_sampling(&mut sensor, &mut provider, &mut scorer, &mut sink);

    assert_eq!(arbiter.snapshot().len(), 1);
    assert_eq!(sink.published.len(), 1);
    assert_eq!(arbiter.state(), ServiceState::Stopped);
}

#[test]
fn every_store_mutation_is_published() {
    let arbiter = Arbiter::new(test_config()).unwrap();
    populate(&arbiter, &[(10, 10, 0.9)]);

    let mut sink = RecordingSink::default();
    arbiter
        .handle_request(ArbitrationMode::Classic, &mut NullFrame, &mut sink)
        .unwrap();

    // The selection invalidated around (10,10); the published snapshot
    // reflects the post-invalidation store.
    assert_eq!(sink.published.len(), 1);
    assert!(sink.published[0].is_empty());
}

#[test]
fn interleaved_inserts_and_invalidations_stay_consistent() {
    let store = Arc::new(Mutex::new(PredictionStore::new()));
    let center = Vector2::new(0, 0);

    let mut handles = Vec::new();
    for t in 0..4i64 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            for i in 0..50i64 {
                // All inserted points lie far outside every invalidation
                // circle, so each one must survive any interleaving.
                let offset = 1000 + t * 100 + i;
                store
                    .lock()
                    .unwrap()
                    .insert(Candidate::new(offset, offset, 0.5));
            }
        }));
    }
    for _ in 0..2 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                store.lock().unwrap().invalidate_around(center, 10);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let store = store.lock().unwrap();
    assert_eq!(store.len(), 200);
    assert!(store
        .snapshot()
        .iter()
        .all(|c| c.distance_to(&center) > 10.0));
}
