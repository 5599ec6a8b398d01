pub mod lifecycle;

pub use lifecycle::{RequestEvent, RequestStage, StageTransition, StageTransitionError};
