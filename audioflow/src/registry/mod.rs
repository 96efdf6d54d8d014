//! In-process job registry.
//!
//! Tracks every submission by job id, runs the pipeline for it and serves
//! status and result queries. State lives only as long as the registry.

mod job;

pub use job::{ResultsView, StatusView, SubmitRequest, SubmitResult};

use crate::cancellation::CancellationToken;
use crate::config::{JobConfig, PipelineConfig};
use crate::core::{JobStatus, PipelineResult};
use crate::errors::{AudioflowError, Result};
use crate::events::{EventSink, LoggingEventSink};
use crate::pipeline::PipelineExecutor;
use crate::stages::StageSet;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use job::Job;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

static JOB_ID_PATTERN: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$"));

/// Returns true if `job_id` can be used as a job directory name.
#[must_use]
pub fn is_valid_job_id(job_id: &str) -> bool {
    JOB_ID_PATTERN
        .as_ref()
        .is_ok_and(|pattern| pattern.is_match(job_id))
}

/// Generates a fresh, time-ordered job id.
#[must_use]
pub fn generate_job_id() -> String {
    format!("job_{}", Uuid::now_v7().simple())
}

/// Registry of pipeline jobs.
pub struct JobRegistry {
    config: PipelineConfig,
    stages: Arc<StageSet>,
    events: Arc<dyn EventSink>,
    jobs: Arc<RwLock<BTreeMap<String, Job>>>,
    running: Arc<DashMap<String, Arc<CancellationToken>>>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("config", &self.config)
            .field("jobs", &self.jobs.read().len())
            .field("running", &self.running.len())
            .finish_non_exhaustive()
    }
}

/// Holds a job id in the running table until dropped.
struct Reservation {
    running: Arc<DashMap<String, Arc<CancellationToken>>>,
    job_id: String,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.running.remove(&self.job_id);
    }
}

fn finish_job(
    jobs: &RwLock<BTreeMap<String, Job>>,
    config: &Arc<JobConfig>,
    result: Option<PipelineResult>,
    fault: Option<String>,
) -> JobStatus {
    let mut jobs = jobs.write();
    let job = jobs
        .entry(config.job_id().to_string())
        .or_insert_with(|| Job::started(Arc::clone(config)));
    job.finish(result, fault);
    job.status
}

impl JobRegistry {
    /// Creates a registry that runs jobs with `stages`.
    #[must_use]
    pub fn new(config: PipelineConfig, stages: StageSet) -> Self {
        Self {
            config,
            stages: Arc::new(stages),
            events: Arc::new(LoggingEventSink::debug()),
            jobs: Arc::new(RwLock::new(BTreeMap::new())),
            running: Arc::new(DashMap::new()),
        }
    }

    /// Sets the event sink handed to every executor.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The pipeline configuration jobs are derived from.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline for one audio file and waits for it to terminate.
    ///
    /// Stage failures are reported in the returned result, not as errors.
    /// The run lives in its own task: dropping the returned future detaches
    /// it, and the job record is still finished and the id released when
    /// the run terminates.
    ///
    /// # Errors
    ///
    /// Returns `InvalidJobId` for an unusable caller id, `JobInProgress` if
    /// the id is already running, or `Config` if no audio path is known or
    /// the job configuration cannot be derived.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitResult> {
        let job_id = match request.job_id {
            Some(job_id) if is_valid_job_id(&job_id) => job_id,
            Some(job_id) => return Err(AudioflowError::InvalidJobId { job_id }),
            None => generate_job_id(),
        };

        let token = Arc::new(CancellationToken::new());
        let reservation = self.reserve(&job_id, Arc::clone(&token))?;

        let audio_path = if request.audio_path.as_os_str().is_empty() {
            self.config
                .audio_path
                .clone()
                .ok_or_else(|| AudioflowError::config("no audio path given"))?
        } else {
            request.audio_path
        };
        let config = Arc::new(self.config.job_config(
            job_id.as_str(),
            audio_path,
            request.output_dir,
        )?);

        if self
            .jobs
            .write()
            .insert(job_id.clone(), Job::started(Arc::clone(&config)))
            .is_some()
        {
            warn!(job_id = %job_id, "Replacing previous record for resubmitted job");
        }
        info!(
            job_id = %job_id,
            audio_path = %config.audio_path().display(),
            output_dir = %config.output_dir().display(),
            "Job submitted"
        );

        let executor = PipelineExecutor::new(Arc::clone(&config), Arc::clone(&self.stages))
            .with_force_rerun(request.force_rerun)
            .with_event_sink(Arc::clone(&self.events))
            .with_cancellation(token);
        let jobs = Arc::clone(&self.jobs);
        let job_config = Arc::clone(&config);
        let span = tracing::info_span!("job", job_id = %job_id);

        let lifecycle = tokio::spawn(
            async move {
                let pipeline = async move { executor.run().await }.in_current_span();
                let joined = tokio::spawn(pipeline).await;
                let (result, fault) = match joined {
                    Ok(result) => (Some(result), None),
                    Err(err) => {
                        error!(error = %err, "Pipeline task crashed");
                        (None, Some(format!("pipeline task failed: {err}")))
                    }
                };

                let status = finish_job(&jobs, &job_config, result.clone(), fault.clone());
                info!(%status, "Job finished");
                drop(reservation);

                SubmitResult {
                    job_id: job_config.job_id().to_string(),
                    status,
                    output_dir: job_config.output_dir().to_path_buf(),
                    result,
                    error: fault,
                }
            }
            .instrument(span),
        );

        match lifecycle.await {
            Ok(submitted) => Ok(submitted),
            Err(err) => {
                error!(job_id = %job_id, error = %err, "Job task crashed");
                let fault = format!("job task failed: {err}");
                let status = finish_job(&self.jobs, &config, None, Some(fault.clone()));
                Ok(SubmitResult {
                    job_id,
                    status,
                    output_dir: config.output_dir().to_path_buf(),
                    result: None,
                    error: Some(fault),
                })
            }
        }
    }

    fn reserve(&self, job_id: &str, token: Arc<CancellationToken>) -> Result<Reservation> {
        match self.running.entry(job_id.to_string()) {
            Entry::Occupied(_) => Err(AudioflowError::JobInProgress {
                job_id: job_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(Reservation {
                    running: Arc::clone(&self.running),
                    job_id: job_id.to_string(),
                })
            }
        }
    }

    /// Returns the current status of a job.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub fn status(&self, job_id: &str) -> Result<StatusView> {
        self.jobs
            .read()
            .get(job_id)
            .map(Job::view)
            .ok_or_else(|| AudioflowError::not_found(job_id))
    }

    /// Loads the artifacts of a finished job.
    ///
    /// Artifacts that cannot be read are reported inline.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, or `NotReady` unless the job
    /// completed or partially completed.
    pub async fn results(&self, job_id: &str) -> Result<ResultsView> {
        let (config, status, pipeline) = {
            let jobs = self.jobs.read();
            let job = jobs
                .get(job_id)
                .ok_or_else(|| AudioflowError::not_found(job_id))?;
            (Arc::clone(&job.config), job.status, job.result.clone())
        };

        let pipeline = match pipeline {
            Some(pipeline) if status.has_results() => pipeline,
            _ => return Err(AudioflowError::not_ready(job_id, status)),
        };

        let executor = PipelineExecutor::new(config, Arc::clone(&self.stages));
        let outputs = executor.collect_results(&pipeline).await;

        Ok(ResultsView {
            job_id: job_id.to_string(),
            status,
            pipeline,
            outputs,
        })
    }

    /// Snapshot of every known job, ordered by id.
    #[must_use]
    pub fn list(&self) -> BTreeMap<String, StatusView> {
        self.jobs
            .read()
            .iter()
            .map(|(job_id, job)| (job_id.clone(), job.view()))
            .collect()
    }

    /// Requests cancellation of a running job.
    ///
    /// The job stops before its next stage level. Returns true if this call
    /// signalled a running job.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub fn cancel(&self, job_id: &str) -> Result<bool> {
        if let Some(token) = self.running.get(job_id) {
            let signalled = token.cancel("cancelled by caller");
            if signalled {
                info!(job_id, "Cancellation requested");
            }
            return Ok(signalled);
        }

        if self.jobs.read().contains_key(job_id) {
            Ok(false)
        } else {
            Err(AudioflowError::not_found(job_id))
        }
    }

    /// Returns true if a job with this id is currently running.
    #[must_use]
    pub fn is_running(&self, job_id: &str) -> bool {
        self.running.contains_key(job_id)
    }
}
