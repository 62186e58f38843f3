//! The evaluation pipeline: stages, routing policy and the runner.

pub mod composer;
pub mod policy;
pub mod runner;
pub mod stage;
pub mod state;

pub use composer::{ComposedAnswer, ResponseComposer};
pub use policy::{NextStep, RoutingPolicy};
pub use runner::Pipeline;
pub use stage::{
    ComposerStage, EvaluationStage, PipelineStage, ProfileStage, RetrievalStage, ScoringStage,
};
pub use state::{DEFAULT_CANDIDATE_COUNT, PipelineState};
