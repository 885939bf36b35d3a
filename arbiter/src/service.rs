use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use nalgebra::Vector2;

use crate::candidate::Candidate;
use crate::config::ArbiterConfig;
use crate::error::ArbiterError;
use crate::store::PredictionStore;

/// Answers "is the picking box empty". Polled once per replenishment
/// iteration; `true` is terminal.
pub trait BoxSensor {
    fn box_is_empty(&mut self) -> Result<bool, ArbiterError>;
}

/// Produces one random pixel location lying on a detected object inside the
/// picking box.
pub trait CoordProvider {
    fn random_on_object(&mut self) -> Result<Vector2<i64>, ArbiterError>;
}

/// Scores the crop centered at a pixel location with a success probability
/// in [0, 1].
pub trait Scorer {
    fn score(&mut self, position: Vector2<i64>) -> Result<f64, ArbiterError>;
}

/// Triggers a fresh camera frame so arbitration never evaluates stale state.
pub trait FrameSource {
    fn refresh(&mut self) -> Result<(), ArbiterError>;
}

/// Receives the full candidate set after every store mutation, for external
/// visualization.
pub trait PredictionSink {
    fn publish(&mut self, predictions: &[Candidate]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrationMode {
    /// Confidence-gated selection, then invalidate around the selected point.
    Classic,
    /// Confidence-gated selection without disturbing its neighborhood.
    WithoutInvalidation,
    /// Only clear the fixed dead zone; no selection.
    JustInvalidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Replenishment loop active.
    Sampling,
    /// Box confirmed empty; no further samples, existing store still served.
    Draining,
    /// Replenishment loop exited.
    Stopped,
}

struct Shared {
    store: PredictionStore,
    picking_point: Option<Vector2<i64>>,
    state: ServiceState,
}

/// The arbitration service. Owns the prediction store and the current
/// picking point behind one coarse lock; a background replenishment loop and
/// the request path are the only mutators.
pub struct Arbiter {
    config: ArbiterConfig,
    shared: Mutex<Shared>,
}

impl Arbiter {
    pub fn new(config: ArbiterConfig) -> Result<Arbiter, ArbiterError> {
        config.validate()?;

        Ok(Arbiter {
            config,
            shared: Mutex::new(Shared {
                store: PredictionStore::new(),
                picking_point: None,
                state: ServiceState::Sampling,
            }),
        })
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        self.shared.lock().unwrap().state
    }

    pub fn picking_point(&self) -> Option<Vector2<i64>> {
        self.shared.lock().unwrap().picking_point
    }

    pub fn snapshot(&self) -> Vec<Candidate> {
        self.shared.lock().unwrap().store.snapshot()
    }

    /// Replenishment loop: probe random on-object locations, score them and
    /// grow the store until the box-empty signal fires. A failed probe skips
    /// one iteration, it never stops the loop.
    pub fn run_sampling(
        &self,
        sensor: &mut impl BoxSensor,
        provider: &mut impl CoordProvider,
        scorer: &mut impl Scorer,
        sink: &mut impl PredictionSink,
    ) {
        loop {
            match sensor.box_is_empty() {
                Ok(true) => {
                    self.shared.lock().unwrap().state = ServiceState::Draining;
                    log::info!("Picking box is empty, no more candidates will be sampled");
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    log::error!("Box sensor query failed: {e}");
                    thread::sleep(self.config.sample_interval);
                    continue;
                }
            }

            if let Err(e) = self.sample_once(provider, scorer, sink) {
                log::warn!("Skipping probe: {e}");
            }

            thread::sleep(self.config.sample_interval);
        }

        self.shared.lock().unwrap().state = ServiceState::Stopped;
    }

    fn sample_once(
        &self,
        provider: &mut impl CoordProvider,
        scorer: &mut impl Scorer,
        sink: &mut impl PredictionSink,
    ) -> Result<(), ArbiterError> {
        let position = provider.random_on_object()?;
        let probability = scorer.score(position)?;

        let mut shared = self.shared.lock().unwrap();
        shared.store.insert(Candidate { position, probability });
        let snapshot = shared.store.snapshot();
        drop(shared);

        sink.publish(&snapshot);
        Ok(())
    }

    /// Serve one arbitration request. Always refreshes the camera frame
    /// first; selection modes return the chosen candidate, pure invalidation
    /// returns `None`.
    pub fn handle_request(
        &self,
        mode: ArbitrationMode,
        frame: &mut impl FrameSource,
        sink: &mut impl PredictionSink,
    ) -> Result<Option<Candidate>, ArbiterError> {
        frame.refresh()?;

        match mode {
            ArbitrationMode::Classic => self.select_best(true, sink).map(Some),
            ArbitrationMode::WithoutInvalidation => self.select_best(false, sink).map(Some),
            ArbitrationMode::JustInvalidation => {
                let fixed = self.config.fixed_invalidation_point;
                let mut shared = self.shared.lock().unwrap();
                shared.store.invalidate_around(fixed, self.config.invalidation_radius);
                shared.picking_point = Some(fixed);
                let snapshot = shared.store.snapshot();
                drop(shared);

                sink.publish(&snapshot);
                Ok(None)
            }
        }
    }

    /// Confidence-gated selection: poll `best()` until it clears the
    /// threshold, then invalidate and record the picking point under the
    /// same lock acquisition. Fails fast on an empty store and with
    /// `SelectionTimeout` once the bounded wait runs out.
    fn select_best(
        &self,
        invalidate_selection: bool,
        sink: &mut impl PredictionSink,
    ) -> Result<Candidate, ArbiterError> {
        let deadline = Instant::now() + self.config.selection_timeout;

        loop {
            {
                let mut shared = self.shared.lock().unwrap();
                let best = shared.store.best()?;
                if best.probability >= self.config.confidence_threshold {
                    if invalidate_selection {
                        shared
                            .store
                            .invalidate_around(best.position, self.config.invalidation_radius);
                    }
                    shared.store.invalidate_around(
                        self.config.fixed_invalidation_point,
                        self.config.invalidation_radius,
                    );
                    shared.picking_point = Some(best.position);
                    let snapshot = shared.store.snapshot();
                    drop(shared);

                    sink.publish(&snapshot);
                    return Ok(best);
                }
            }

            if Instant::now() >= deadline {
                return Err(ArbiterError::SelectionTimeout {
                    waited: self.config.selection_timeout,
                });
            }
            thread::sleep(self.config.poll_interval);
        }
    }
}
