//! Per-job state
//!
//! A job owns its identifier, its filter spec and a private workspace
//! directory. Nothing here is shared between jobs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use serde::Serialize;
use uuid::Uuid;

use crate::dsp::{FilterKind, FilterSpec};
use crate::error::{ErrorCategory, Result, VoiceFxError};

/// Prefix of every job workspace directory
pub const WORKSPACE_PREFIX: &str = "job-";

/// Suffix of partially written output files
pub const PART_SUFFIX: &str = ".part";

/// Stage of the processing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Ingesting,
    Filtering,
    Normalizing,
    Encoding,
    /// Encoded output delivered
    Done,
    /// Original input returned, all artifacts discarded
    Fallback,
}

impl JobStage {
    /// Short name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Ingesting => "INGEST",
            JobStage::Filtering => "FILTER",
            JobStage::Normalizing => "NORMALIZE",
            JobStage::Encoding => "ENCODE",
            JobStage::Done => "DONE",
            JobStage::Fallback => "FALLBACK",
        }
    }

    /// Whether the state machine stops here
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Done | JobStage::Fallback)
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong, and where
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: JobStage,
    pub category: ErrorCategory,
    /// Stable error code, e.g. `DECODE_ERROR`
    pub code: String,
    pub message: String,
}

impl StageFailure {
    pub fn from_error(stage: JobStage, error: &VoiceFxError) -> Self {
        Self {
            stage,
            category: error.category(),
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }

    pub(crate) fn other(stage: JobStage, code: &str, message: impl Into<String>) -> Self {
        Self {
            stage,
            category: ErrorCategory::Other,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Outcome of one `process` call
///
/// `output_path` is always a readable file: the encoded artifact on `Done`,
/// the untouched original input on `Fallback`.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub job_id: Uuid,
    pub output_path: PathBuf,
    /// Filter name as the caller passed it
    pub requested: String,
    /// Filter that actually shaped the output
    pub applied: FilterKind,
    pub stage: JobStage,
    pub failure: Option<StageFailure>,
    pub elapsed: Duration,
}

impl ProcessingResult {
    /// The caller got its original input back
    pub fn is_fallback(&self) -> bool {
        self.stage == JobStage::Fallback
    }

    /// Output was produced, but without the requested filter
    pub fn is_degraded(&self) -> bool {
        self.stage == JobStage::Done && self.failure.is_some()
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// Scratch directory owned by a single job
///
/// Removed when dropped, whichever way the job ends.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: PathBuf,
}

impl JobWorkspace {
    /// Create `<temp_dir>/job-<id>/`
    pub fn create(temp_dir: &Path, job_id: Uuid) -> Result<Self> {
        let dir = temp_dir.join(format!("{}{}", WORKSPACE_PREFIX, job_id));
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Path of a file inside the workspace
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!("Removed workspace {}", self.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!("Could not remove workspace {}: {}", self.dir.display(), e),
        }
    }
}

const RUNNING: u8 = 0;
const COMPLETED: u8 = 1;
const ABANDONED: u8 = 2;

/// Settles who owns a finished job's output: the job or a caller that gave up
///
/// Exactly one of `complete` and `abandon` succeeds.
#[derive(Debug, Clone, Default)]
pub struct CompletionFlag(Arc<AtomicU8>);

impl CompletionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the output for the caller; false if the job was abandoned first
    pub fn complete(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give up on the job; false if it already completed
    pub fn abandon(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A single run of the pipeline
#[derive(Debug)]
pub struct ProcessingJob {
    id: Uuid,
    input: PathBuf,
    requested: String,
    spec: FilterSpec,
    stage: JobStage,
    started: Instant,
}

impl ProcessingJob {
    pub fn new(input: impl Into<PathBuf>, requested: impl Into<String>, spec: FilterSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            input: input.into(),
            requested: requested.into(),
            spec,
            stage: JobStage::Ingesting,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// First eight hex digits of the id
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn requested(&self) -> &str {
        &self.requested
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    /// Log prefix carried by every line this job emits
    pub fn tag(&self) -> String {
        format!("[job {}]", self.short_id())
    }

    /// Move to the next stage
    pub fn advance(&mut self, next: JobStage) {
        debug!("{} {} -> {}", self.tag(), self.stage, next);
        self.stage = next;
    }

    /// Terminal `Done` result
    pub fn done(
        self,
        output_path: PathBuf,
        applied: FilterKind,
        failure: Option<StageFailure>,
    ) -> ProcessingResult {
        ProcessingResult {
            job_id: self.id,
            output_path,
            requested: self.requested,
            applied,
            stage: JobStage::Done,
            failure,
            elapsed: self.started.elapsed(),
        }
    }

    /// Terminal `Fallback` result carrying the original input path
    pub fn fallback(self, failure: StageFailure) -> ProcessingResult {
        ProcessingResult {
            job_id: self.id,
            output_path: self.input,
            requested: self.requested,
            applied: FilterKind::PassThrough,
            stage: JobStage::Fallback,
            failure: Some(failure),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Fallback result for a job whose worker never reported back
pub(crate) fn detached_fallback(
    job_id: Uuid,
    input: PathBuf,
    requested: String,
    failure: StageFailure,
    started: Instant,
) -> ProcessingResult {
    ProcessingResult {
        job_id,
        output_path: input,
        requested,
        applied: FilterKind::PassThrough,
        stage: JobStage::Fallback,
        failure: Some(failure),
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_removed_on_drop() {
        let temp = tempdir().unwrap();
        let path = {
            let workspace = JobWorkspace::create(temp.path(), Uuid::new_v4()).unwrap();
            std::fs::write(workspace.file("ingest.wav"), b"data").unwrap();
            assert!(workspace.path().exists());
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_workspace_drop_tolerates_missing_dir() {
        let temp = tempdir().unwrap();
        let workspace = JobWorkspace::create(temp.path(), Uuid::new_v4()).unwrap();
        std::fs::remove_dir_all(workspace.path()).unwrap();
        drop(workspace);
    }

    #[test]
    fn test_workspace_names_are_unique() {
        let temp = tempdir().unwrap();
        let a = JobWorkspace::create(temp.path(), Uuid::new_v4()).unwrap();
        let b = JobWorkspace::create(temp.path(), Uuid::new_v4()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORKSPACE_PREFIX));
    }

    #[test]
    fn test_completion_flag_is_exclusive() {
        let flag = CompletionFlag::new();
        assert!(flag.complete());
        assert!(!flag.abandon());
        assert!(!flag.complete());

        let flag = CompletionFlag::new();
        assert!(flag.abandon());
        assert!(!flag.complete());
        assert!(!flag.abandon());
    }

    #[test]
    fn test_fallback_returns_input() {
        let mut job = ProcessingJob::new("/clips/voice.ogg", "deep", FilterSpec::PassThrough);
        job.advance(JobStage::Filtering);
        assert_eq!(job.stage(), JobStage::Filtering);

        let failure = StageFailure::from_error(JobStage::Ingesting, &VoiceFxError::EmptyAudio);
        let result = job.fallback(failure);

        assert!(result.is_fallback());
        assert!(!result.is_degraded());
        assert_eq!(result.output_path(), Path::new("/clips/voice.ogg"));
        assert_eq!(result.applied, FilterKind::PassThrough);
        let failure = result.failure.unwrap();
        assert_eq!(failure.category, ErrorCategory::Decode);
        assert_eq!(failure.code, "EMPTY_AUDIO");
    }

    #[test]
    fn test_short_id_and_tag() {
        let job = ProcessingJob::new("a.wav", "echo", FilterSpec::PassThrough);
        assert_eq!(job.short_id().len(), 8);
        assert_eq!(job.tag(), format!("[job {}]", job.short_id()));
        assert!(!job.stage().is_terminal());
        assert!(JobStage::Fallback.is_terminal());
    }
}
