//! Error types for the life-cycle model.

use crate::herd::CowId;
use crate::state::LifePhase;
use thiserror::Error;

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building or querying the model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A state was constructed with a days-pregnant value that contradicts its phase.
    #[error("invalid state: {life_phase} with {days_pregnant} days pregnant")]
    InvalidState {
        life_phase: LifePhase,
        days_pregnant: u32,
    },

    /// A state was constructed with a negative or non-finite milk output.
    #[error("invalid milk output: {milk_output}")]
    InvalidMilkOutput { milk_output: f64 },

    /// A life-phase name did not match any known phase.
    #[error("unknown life phase: {0:?}")]
    UnknownLifePhase(String),

    /// Herd policy parameters are inconsistent.
    #[error("invalid herd policy: {message}")]
    InvalidPolicy { message: String },

    /// The cow's state space was queried before `generate_total_states`.
    #[error("total states have not been generated")]
    StatesNotGenerated,

    /// A state is missing from the generated state space.
    #[error("state not in state space: {state:?}")]
    StateNotFound { state: String },

    /// An operation needed at least one cow in the herd.
    #[error("herd has no cows")]
    EmptyHerd,

    /// A cow handle did not refer to a cow in the herd.
    #[error("cow not found: {0:?}")]
    CowNotFound(CowId),

    /// A distribution vector did not match the state space.
    #[error("vector length must be {expected}, but is {actual}")]
    VectorLength { expected: usize, actual: usize },

    /// Normal distribution parameters were rejected.
    #[error("invalid normal distribution: {0}")]
    Distribution(#[from] rand_distr::NormalError),

    /// The operating system could not seed the random number generator.
    #[error("failed to seed random number generator: {0}")]
    Entropy(#[from] rand::rand_core::OsError),
}
