//! Processing pipeline
//!
//! `VoiceEngine` runs jobs; `job` holds the per-job state machine, workspace
//! and result types.

mod job;
mod orchestrator;

pub use job::{
    CompletionFlag, JobStage, JobWorkspace, ProcessingJob, ProcessingResult, StageFailure,
    PART_SUFFIX, WORKSPACE_PREFIX,
};
pub use orchestrator::{JobHandle, VoiceEngine};
