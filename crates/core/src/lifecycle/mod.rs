pub mod engine;
pub mod states;

pub use engine::{LifecycleError, RequestLifecycle};
pub use states::{Actor, Disposition, LifecycleEvent, TransitionOutcome};
