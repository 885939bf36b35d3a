mod candidate;
mod config;
mod error;
mod service;
mod store;

pub use candidate::Candidate;
pub use config::ArbiterConfig;
pub use error::ArbiterError;
pub use service::{
    Arbiter, ArbitrationMode, BoxSensor, CoordProvider, FrameSource, PredictionSink, Scorer,
    ServiceState,
};
pub use store::PredictionStore;
