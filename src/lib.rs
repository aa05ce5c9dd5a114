//! Finite-state Markov chain of the dairy cow life cycle.
//!
//! A [`Cow`] enumerates every day-state reachable under a [`HerdPolicy`]
//! (its [`StateSpace`]), and the [`TransitionModel`] assigns daily
//! transition probabilities between them. [`generate_edges`] flattens the
//! chain into `(from, to, probability)` triples for matrix assembly.

pub mod analysis;
pub mod biology;
pub mod cow;
pub mod edges;
pub mod error;
pub mod herd;
pub mod policy;
pub mod space;
pub mod state;
pub mod stats;
pub mod transition;

pub use analysis::ChainReport;
pub use biology::{Diet, DietPhase, MilkBot, NitrogenRange};
pub use cow::{Cow, CowTraits};
pub use edges::{Edge, Edges, generate_edges};
pub use error::{ModelError, ModelResult};
pub use herd::{CowId, Herd};
pub use policy::{ExitPolicy, HerdPolicy};
pub use space::{GenerationLimits, StateSpace, generate_total_states};
pub use state::{CowState, LifePhase};
pub use transition::{ProbabilityTerms, TransitionModel};
