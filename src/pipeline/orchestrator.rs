//! Processing orchestrator
//!
//! Drives one job through `Ingesting → Filtering → Normalizing → Encoding`
//! and guarantees the caller gets back a readable path. A filter failure
//! degrades the job to pass-through; a decode or encode failure ends it in
//! `Fallback` with the original input path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;
use walkdir::WalkDir;

use super::job::{
    detached_fallback, CompletionFlag, JobStage, JobWorkspace, ProcessingJob, ProcessingResult,
    StageFailure, PART_SUFFIX, WORKSPACE_PREFIX,
};
use crate::config::EngineConfig;
use crate::dsp::{normalize, FilterKind, FilterSpec};
use crate::engine::{encode, ingest, SampleBuffer};
use crate::error::{Result, VoiceFxError};

/// Name of the canonical intermediate inside a job workspace
const INGEST_FILE: &str = "ingest.wav";

/// Voice effect engine
///
/// Cheap to clone; clones share the same configuration.
#[derive(Debug, Clone)]
pub struct VoiceEngine {
    config: Arc<EngineConfig>,
}

impl VoiceEngine {
    /// Create an engine after validating `config`
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply the named filter to a clip
    ///
    /// Never fails: unknown names run as pass-through, and any decode or
    /// encode failure returns the original path as a `Fallback` result.
    pub fn process(&self, input: &Path, filter_name: &str) -> ProcessingResult {
        let job = self.prepare(input, filter_name);
        self.run(job, None)
    }

    /// Apply an explicit filter spec instead of a named preset
    pub fn process_with_spec(&self, input: &Path, spec: FilterSpec) -> ProcessingResult {
        let job = ProcessingJob::new(input, spec.kind().name(), spec);
        self.run(job, None)
    }

    /// Run a job on its own thread
    pub fn process_in_background(&self, input: &Path, filter_name: &str) -> JobHandle {
        let job = self.prepare(input, filter_name);
        let job_id = job.id();
        let completion = CompletionFlag::new();
        let (tx, rx) = mpsc::channel();

        let engine = self.clone();
        let flag = completion.clone();
        let worker = thread::spawn(move || {
            let result = engine.run(job, Some(&flag));
            // Receiver is gone once the caller timed out
            let _ = tx.send(result);
        });

        JobHandle {
            job_id,
            input: input.to_path_buf(),
            requested: filter_name.to_string(),
            started: Instant::now(),
            completion,
            rx,
            worker,
        }
    }

    /// Run a job on tokio's blocking pool
    #[cfg(feature = "async")]
    pub async fn process_async(&self, input: PathBuf, filter_name: String) -> ProcessingResult {
        let job = self.prepare(&input, &filter_name);
        let job_id = job.id();
        let started = Instant::now();
        let engine = self.clone();

        match tokio::task::spawn_blocking(move || engine.run(job, None)).await {
            Ok(result) => result,
            Err(e) => {
                warn!("[job {}] worker failed: {}", short(job_id), e);
                detached_fallback(
                    job_id,
                    input,
                    filter_name,
                    StageFailure::other(JobStage::Fallback, "WORKER_FAILED", e.to_string()),
                    started,
                )
            }
        }
    }

    /// Like `process_async`, but give up after `timeout`
    ///
    /// An abandoned job keeps running to completion in the background and
    /// then deletes its own output.
    #[cfg(feature = "async")]
    pub async fn process_async_with_timeout(
        &self,
        input: PathBuf,
        filter_name: String,
        timeout: Duration,
    ) -> ProcessingResult {
        let job = self.prepare(&input, &filter_name);
        let job_id = job.id();
        let started = Instant::now();
        let completion = CompletionFlag::new();

        let engine = self.clone();
        let flag = completion.clone();
        let mut task = tokio::task::spawn_blocking(move || engine.run(job, Some(&flag)));

        let waited = tokio::time::timeout(timeout, &mut task).await;
        let joined = match waited {
            Ok(joined) => joined,
            Err(_) if completion.abandon() => {
                warn!(
                    "[job {}] abandoned after {:?}, returning original input",
                    short(job_id),
                    timeout
                );
                return detached_fallback(
                    job_id,
                    input,
                    filter_name,
                    StageFailure::other(
                        JobStage::Fallback,
                        "TIMEOUT",
                        format!("job did not finish within {:?}", timeout),
                    ),
                    started,
                );
            }
            // Finished between the deadline and the abandon attempt
            Err(_) => task.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("[job {}] worker failed: {}", short(job_id), e);
                detached_fallback(
                    job_id,
                    input,
                    filter_name,
                    StageFailure::other(JobStage::Fallback, "WORKER_FAILED", e.to_string()),
                    started,
                )
            }
        }
    }

    /// Release a delivered artifact
    ///
    /// A missing file is fine. Paths outside the engine's output and temp
    /// directories are refused and left alone; returns false in that case.
    pub fn cleanup(&self, path: &Path) -> bool {
        if !self.is_managed(path) {
            warn!("Refusing to remove {}: not an engine artifact", path.display());
            return false;
        }

        match fs::remove_file(path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} already gone", path.display())
            }
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
        true
    }

    /// Remove job workspaces and part files older than `max_age`
    ///
    /// Returns how many entries were removed.
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let mut roots = vec![self.config.temp_dir.clone()];
        if self.config.output_dir() != self.config.temp_dir.as_path() {
            roots.push(self.config.output_dir().to_path_buf());
        }

        let now = SystemTime::now();
        let mut removed = 0;

        for root in roots.iter().filter(|r| r.exists()) {
            let stale = WalkDir::new(root)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    let name = entry.file_name().to_string_lossy();
                    (entry.file_type().is_dir() && name.starts_with(WORKSPACE_PREFIX))
                        || (entry.file_type().is_file() && name.ends_with(PART_SUFFIX))
                })
                .filter(|entry| {
                    entry
                        .metadata()
                        .ok()
                        .and_then(|m| m.modified().ok())
                        .and_then(|modified| now.duration_since(modified).ok())
                        .map_or(false, |age| age >= max_age)
                });

            for entry in stale {
                let outcome = if entry.file_type().is_dir() {
                    fs::remove_dir_all(entry.path())
                } else {
                    fs::remove_file(entry.path())
                };
                match outcome {
                    Ok(()) => {
                        debug!("Swept {}", entry.path().display());
                        removed += 1;
                    }
                    Err(e) => warn!("Could not sweep {}: {}", entry.path().display(), e),
                }
            }
        }

        if removed > 0 {
            info!("Swept {} stale entries", removed);
        }
        removed
    }

    fn prepare(&self, input: &Path, filter_name: &str) -> ProcessingJob {
        let kind = FilterKind::from_name(filter_name);
        ProcessingJob::new(input, filter_name, self.config.filters.spec_for(kind))
    }

    fn noise_rng(&self) -> ChaCha8Rng {
        match self.config.noise_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Whether `path` lives under the output or temp directory
    fn is_managed(&self, path: &Path) -> bool {
        let target = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => {
                let parent = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
                match fs::canonicalize(parent) {
                    Ok(parent) => parent.join(name),
                    Err(_) => return false,
                }
            }
            _ => return false,
        };

        [self.config.output_dir(), self.config.temp_dir.as_path()]
            .iter()
            .filter_map(|root| fs::canonicalize(root).ok())
            .any(|root| target.starts_with(root))
    }

    fn run(&self, mut job: ProcessingJob, completion: Option<&CompletionFlag>) -> ProcessingResult {
        let tag = job.tag();
        info!(
            "{} Processing {} with filter '{}'",
            tag,
            job.input().display(),
            job.requested()
        );

        // Dropped on every return path below
        let workspace = match JobWorkspace::create(&self.config.temp_dir, job.id()) {
            Ok(workspace) => workspace,
            Err(e) => return self.fail(job, e),
        };

        let ingested = match ingest(
            job.input(),
            &workspace.file(INGEST_FILE),
            &self.config.ingest_options(),
        ) {
            Ok(buffer) => buffer,
            Err(e) => return self.fail(job, e),
        };
        debug!(
            "{} Ingested {} samples ({:.2}s)",
            tag,
            ingested.len(),
            ingested.duration_secs()
        );

        job.advance(JobStage::Filtering);
        let (filtered, applied, degraded) = self.apply_filter(&job, ingested);

        job.advance(JobStage::Normalizing);
        let normalized = match normalize(filtered) {
            Ok(buffer) => buffer,
            Err(e) => return self.fail(job, e),
        };

        job.advance(JobStage::Encoding);
        let output_path = match self.deliver(&job, &normalized, applied) {
            Ok(path) => path,
            Err(e) => return self.fail(job, e),
        };

        if let Some(flag) = completion {
            if !flag.complete() {
                debug!("{} Caller gave up, discarding {}", tag, output_path.display());
                self.cleanup(&output_path);
                return job.fallback(StageFailure::other(
                    JobStage::Encoding,
                    "ABANDONED",
                    "caller stopped waiting",
                ));
            }
        }

        job.advance(JobStage::Done);
        let result = job.done(output_path, applied, degraded);
        info!(
            "{} Done: {} ({}) in {:?}",
            tag,
            result.output_path.display(),
            result.applied,
            result.elapsed
        );
        result
    }

    /// Run the job's filter; on failure continue with the ingested audio
    fn apply_filter(
        &self,
        job: &ProcessingJob,
        ingested: SampleBuffer,
    ) -> (SampleBuffer, FilterKind, Option<StageFailure>) {
        let spec = job.spec();
        let mut rng = self.noise_rng();

        match spec.apply(&ingested, &mut rng) {
            Ok(filtered) => (filtered, spec.kind(), None),
            Err(e) => {
                warn!(
                    "{} {} failed ({}): {}; continuing as passthrough",
                    job.tag(),
                    job.stage(),
                    e.error_code(),
                    e
                );
                let failure = StageFailure::from_error(job.stage(), &e);
                (ingested, FilterKind::PassThrough, Some(failure))
            }
        }
    }

    /// Encode to a part file, then move it into place
    fn deliver(
        &self,
        job: &ProcessingJob,
        buffer: &SampleBuffer,
        applied: FilterKind,
    ) -> Result<PathBuf> {
        let output_dir = self.config.output_dir();
        fs::create_dir_all(output_dir)
            .map_err(|e| VoiceFxError::encode(output_dir, e.to_string()))?;

        let stem = job
            .input()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "voice".to_string());
        let name = format!(
            "{}_{}_{}.{}",
            stem,
            applied.name(),
            job.short_id(),
            self.config.output.format.extension()
        );
        let final_path = output_dir.join(&name);
        let part_path = output_dir.join(format!(".{}{}", name, PART_SUFFIX));

        let written = encode(
            buffer,
            &part_path,
            self.config.output.format,
            self.config.output.bitrate_kbps,
        )
        .and_then(|()| {
            fs::rename(&part_path, &final_path)
                .map_err(|e| VoiceFxError::encode(&final_path, e.to_string()))
        });

        if let Err(e) = written {
            if let Err(remove_err) = fs::remove_file(&part_path) {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    debug!("{} Could not remove {}: {}", job.tag(), part_path.display(), remove_err);
                }
            }
            return Err(e);
        }

        Ok(final_path)
    }

    fn fail(&self, job: ProcessingJob, error: VoiceFxError) -> ProcessingResult {
        warn!(
            "{} {} failed ({}): {}; returning original input",
            job.tag(),
            job.stage(),
            error.error_code(),
            error
        );
        let failure = StageFailure::from_error(job.stage(), &error);
        job.fallback(failure)
    }
}

/// A job running on a background thread
#[derive(Debug)]
pub struct JobHandle {
    job_id: Uuid,
    input: PathBuf,
    requested: String,
    started: Instant,
    completion: CompletionFlag,
    rx: mpsc::Receiver<ProcessingResult>,
    worker: thread::JoinHandle<()>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Wait for the job to finish
    pub fn join(self) -> ProcessingResult {
        match self.rx.recv() {
            Ok(result) => {
                let _ = self.worker.join();
                result
            }
            Err(_) => self.worker_lost(),
        }
    }

    /// Wait at most `timeout`, then abandon the job
    ///
    /// The abandoned job finishes on its own thread and removes its output.
    pub fn join_timeout(self, timeout: Duration) -> ProcessingResult {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) if self.completion.abandon() => {
                warn!(
                    "[job {}] abandoned after {:?}, returning original input",
                    short(self.job_id),
                    timeout
                );
                let failure = StageFailure::other(
                    JobStage::Fallback,
                    "TIMEOUT",
                    format!("job did not finish within {:?}", timeout),
                );
                detached_fallback(self.job_id, self.input, self.requested, failure, self.started)
            }
            // Completed just after the deadline
            Err(mpsc::RecvTimeoutError::Timeout) => self.join(),
            Err(mpsc::RecvTimeoutError::Disconnected) => self.worker_lost(),
        }
    }

    fn worker_lost(self) -> ProcessingResult {
        warn!("[job {}] worker thread died", short(self.job_id));
        let failure = StageFailure::other(
            JobStage::Fallback,
            "WORKER_FAILED",
            "worker thread exited without a result",
        );
        detached_fallback(self.job_id, self.input, self.requested, failure, self.started)
    }
}

fn short(job_id: Uuid) -> String {
    job_id.simple().to_string()[..8].to_string()
}
