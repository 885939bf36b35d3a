use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Typed failures surfaced by the arbitration service.
#[derive(Debug)]
pub enum ArbiterError {
    /// Selection was requested against an empty store. Recoverable; the
    /// caller should retry later or switch to a pure invalidation request.
    EmptyStore,
    /// The confidence-gated wait ran out before any candidate reached the
    /// threshold.
    SelectionTimeout { waited: Duration },
    /// A collaborator call (coordinate provider, scorer, box sensor, frame
    /// source) failed. Non-fatal for the replenishment loop.
    Scoring(String),
    /// Invalid configuration values at startup. Fatal.
    InvalidConfig(String),
}

impl fmt::Display for ArbiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArbiterError::EmptyStore => write!(f, "prediction store is empty"),
            ArbiterError::SelectionTimeout { waited } => {
                write!(f, "no candidate reached the confidence threshold within {waited:?}")
            }
            ArbiterError::Scoring(message) => write!(f, "scoring failed: {message}"),
            ArbiterError::InvalidConfig(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ArbiterError {}
