//! Run orchestration: drives a request through transcription, extraction,
//! retrieval, drafting, and action preview, then executes confirmed
//! actions on a second call.

pub mod collaborators;
pub mod runner;

pub use collaborators::{
    Drafter, Extractor, PassthroughTranscriber, RuleBasedExtractor, TemplateDrafter, Transcriber,
};
pub use runner::{PipelineRunner, RunOutput, RunRequest};
