//! State management module - stability-gated key/value state
//!
//! Observed values pass through a per-key debounce gate before they become
//! authoritative. The committed state, the staged candidates and the
//! subscriber broadcast sender are all owned by a single actor task.

mod actor;
mod actor_handle;
mod commands;
mod stability;
mod store;
mod types;

pub use actor::StateActor;
pub use actor_handle::StateActorHandle;
pub use commands::{ReconcileReport, StateStats};
pub use stability::{StabilityTracker, DEFAULT_STABLE_READS};
pub use store::StateStore;
pub use types::{Candidate, KeyPhase, Observation, Origin, StateMap};
