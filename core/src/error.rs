use thiserror::Error;

/// Failures surfaced by the pipeline and its components. A negative
/// verification outcome is not among them; that is an expected result and is
/// reported through [`VerificationResult`](crate::engine::VerificationResult).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("engine is not ready")]
    EngineNotReady,

    #[error("cannot {action} in the {state} state")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("proof generation failed: {0}")]
    ProofGeneration(#[from] ProveError),

    #[error("result for superseded generation {submitted} discarded, current is {current}")]
    StaleState { submitted: u64, current: u64 },
}

/// Internal failures of the proof engine.
#[derive(Debug, Error)]
pub enum ProveError {
    #[error("failed to encode journal: {0}")]
    Serialize(#[from] bincode::Error),
}
