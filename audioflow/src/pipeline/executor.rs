//! Pipeline executor.
//!
//! Runs the stage graph for one job level by level. Stages inside a level run
//! concurrently as separate tasks; a level starts only once the previous one
//! has fully terminated.

use super::StageGraph;
use crate::cancellation::CancellationToken;
use crate::config::JobConfig;
use crate::core::{
    artifact_exists, artifact_written, load_artifact, ArtifactContent, ArtifactKey, PipelineResult,
    PipelineStatus, StageOutcome,
};
use crate::errors::StageFault;
use crate::events::{
    EventSink, LoggingEventSink, PIPELINE_COMPLETED, STAGE_CACHED, STAGE_COMPLETED, STAGE_FAILED,
    STAGE_STARTED,
};
use crate::stages::{FailurePolicy, StageId, StageSet};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs the analysis pipeline for one job.
pub struct PipelineExecutor {
    config: Arc<JobConfig>,
    stages: Arc<StageSet>,
    graph: StageGraph,
    force_rerun: bool,
    events: Arc<dyn EventSink>,
    cancellation: Option<Arc<CancellationToken>>,
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("job_id", &self.config.job_id())
            .field("force_rerun", &self.force_rerun)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl PipelineExecutor {
    /// Creates an executor over the standard stage graph.
    #[must_use]
    pub fn new(config: Arc<JobConfig>, stages: Arc<StageSet>) -> Self {
        Self {
            config,
            stages,
            graph: StageGraph::standard(),
            force_rerun: false,
            events: Arc::new(LoggingEventSink::debug()),
            cancellation: None,
        }
    }

    /// Invokes every stage even when its artifacts already exist.
    #[must_use]
    pub fn with_force_rerun(mut self, force_rerun: bool) -> Self {
        self.force_rerun = force_rerun;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the cancellation token checked between levels.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The job configuration.
    #[must_use]
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Runs the pipeline to termination.
    ///
    /// Stage faults are recorded in the result, never returned.
    pub async fn run(&self) -> PipelineResult {
        let started = Instant::now();
        let job_id = self.config.job_id();
        let mut result = PipelineResult::new();

        info!(job_id, force_rerun = self.force_rerun, "Pipeline started");

        if let Err(err) = tokio::fs::create_dir_all(self.config.output_dir()).await {
            result.record_fault(&StageFault::pipeline(format!(
                "creating output directory {}: {err}",
                self.config.output_dir().display()
            )));
            return self.finish(result, PipelineStatus::Failed, started);
        }

        for level in self.graph.levels() {
            if let Some(reason) = self.cancel_reason() {
                result.record_fault(&StageFault::pipeline(format!("cancelled: {reason}")));
                return self.finish(result, PipelineStatus::Failed, started);
            }

            let (runnable, blocked): (Vec<StageId>, Vec<StageId>) = level
                .iter()
                .copied()
                .partition(|stage| stage.dependencies().iter().all(|dep| result.succeeded(*dep)));
            for stage in blocked {
                debug!(job_id, %stage, "Skipping stage with unmet prerequisites");
            }

            let outcomes = join_all(runnable.into_iter().map(|stage| self.run_stage(stage))).await;

            let mut required_failed = false;
            for outcome in outcomes {
                if !outcome.success && outcome.stage.failure_policy() == FailurePolicy::Required {
                    required_failed = true;
                }
                result.record(outcome);
            }

            if required_failed {
                error!(job_id, errors = ?result.errors, "Required stage failed, aborting pipeline");
                return self.finish(result, PipelineStatus::Failed, started);
            }
        }

        let all_succeeded = self
            .graph
            .execution_order()
            .into_iter()
            .all(|stage| result.succeeded(stage));
        let status = if all_succeeded && result.errors.is_empty() {
            PipelineStatus::Completed
        } else {
            PipelineStatus::PartiallyCompleted
        };

        self.finish(result, status, started)
    }

    /// Loads every artifact listed in `result.output_files`.
    ///
    /// A failure to load one artifact is recorded inline for that key.
    pub async fn collect_results(
        &self,
        result: &PipelineResult,
    ) -> BTreeMap<ArtifactKey, ArtifactContent> {
        let mut outputs = BTreeMap::new();

        for (key, path) in &result.output_files {
            let content = match load_artifact(path).await {
                Ok(content) => content,
                Err(err) => {
                    warn!(
                        job_id = self.config.job_id(),
                        artifact = %key,
                        error = %err,
                        "Could not load artifact"
                    );
                    ArtifactContent::Error(format!("Error loading file: {err}"))
                }
            };
            outputs.insert(*key, content);
        }

        outputs
    }

    fn cancel_reason(&self) -> Option<String> {
        self.cancellation
            .as_ref()
            .filter(|token| token.is_cancelled())
            .map(|token| token.reason().unwrap_or_else(|| "no reason given".to_string()))
    }

    fn declared_artifacts(&self, stage: StageId) -> Result<BTreeMap<ArtifactKey, PathBuf>, String> {
        stage
            .outputs()
            .iter()
            .map(|key| {
                self.config
                    .artifact_path(*key)
                    .map(|path| (*key, path.to_path_buf()))
                    .ok_or_else(|| format!("no path configured for artifact '{key}'"))
            })
            .collect()
    }

    async fn run_stage(&self, stage: StageId) -> StageOutcome {
        let job_id = self.config.job_id();

        let declared = match self.declared_artifacts(stage) {
            Ok(declared) => declared,
            Err(message) => return self.stage_failed(stage, message, 0.0),
        };

        if !self.force_rerun && all_cached(&declared).await {
            info!(job_id, %stage, "Stage output already exists, skipping");
            self.events.try_emit(
                STAGE_CACHED,
                Some(serde_json::json!({ "job_id": job_id, "stage": stage })),
            );
            return StageOutcome::cached(stage, declared);
        }

        let Some(runner) = self.stages.get(stage) else {
            return self.stage_failed(stage, "no implementation registered", 0.0);
        };

        info!(job_id, %stage, "Starting stage");
        self.events.try_emit(
            STAGE_STARTED,
            Some(serde_json::json!({ "job_id": job_id, "stage": stage })),
        );

        let timer = Instant::now();
        let config = Arc::clone(&self.config);
        let invoked = match tokio::spawn(async move { runner.invoke(&config).await }).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(StageFault::from_anyhow(stage, &err).message),
            Err(join_err) if join_err.is_panic() => {
                Err(format!("panicked: {}", panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(join_err.to_string()),
        };
        let duration_ms = timer.elapsed().as_secs_f64() * 1000.0;

        let verified = match invoked {
            Ok(()) => verify_written(&declared).await,
            Err(message) => Err(message),
        };

        match verified {
            Ok(()) => {
                info!(job_id, %stage, duration_ms, "Completed stage");
                self.events.try_emit(
                    STAGE_COMPLETED,
                    Some(serde_json::json!({
                        "job_id": job_id,
                        "stage": stage,
                        "duration_ms": duration_ms,
                    })),
                );
                StageOutcome::succeeded(stage, declared, duration_ms)
            }
            Err(message) => self.stage_failed(stage, message, duration_ms),
        }
    }

    fn stage_failed(&self, stage: StageId, message: impl Into<String>, duration_ms: f64) -> StageOutcome {
        let message = message.into();
        error!(
            job_id = self.config.job_id(),
            %stage,
            duration_ms,
            error = %message,
            "Stage failed"
        );
        self.events.try_emit(
            STAGE_FAILED,
            Some(serde_json::json!({
                "job_id": self.config.job_id(),
                "stage": stage,
                "error": &message,
                "duration_ms": duration_ms,
            })),
        );
        StageOutcome::failed(stage, message, duration_ms)
    }

    fn finish(&self, mut result: PipelineResult, status: PipelineStatus, started: Instant) -> PipelineResult {
        result.finish(status);
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            job_id = self.config.job_id(),
            %status,
            steps = result.steps_completed.len(),
            errors = result.errors.len(),
            duration_ms,
            "Pipeline finished"
        );
        self.events.try_emit(
            PIPELINE_COMPLETED,
            Some(serde_json::json!({
                "job_id": self.config.job_id(),
                "status": status,
                "errors": &result.errors,
                "duration_ms": duration_ms,
            })),
        );

        result
    }
}

async fn all_cached(declared: &BTreeMap<ArtifactKey, PathBuf>) -> bool {
    for path in declared.values() {
        if !artifact_exists(path).await {
            return false;
        }
    }
    true
}

async fn verify_written(declared: &BTreeMap<ArtifactKey, PathBuf>) -> Result<(), String> {
    for (key, path) in declared {
        if !artifact_written(path).await {
            return Err(format!(
                "declared artifact '{key}' was not produced at {}",
                path.display()
            ));
        }
    }
    Ok(())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::events::MockEventSink;
    use crate::testing::ScriptedStage;
    use mockall::predicate::eq;

    fn job(root: &std::path::Path) -> Arc<JobConfig> {
        Arc::new(
            PipelineConfig::new()
                .with_results_root(root)
                .job_config("unit", "in.mp3", None)
                .unwrap(),
        )
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("owned".to_string())), "owned");
        assert_eq!(panic_message(Box::new(42_u8)), "unknown panic");
    }

    #[tokio::test]
    async fn test_missing_implementation_is_a_stage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let executor = PipelineExecutor::new(job(dir.path()), Arc::new(StageSet::empty()));

        let result = executor.run().await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result
            .errors
            .contains(&"transcription: no implementation registered".to_string()));
        assert!(!result.attempted(StageId::Alignment));
    }

    #[tokio::test]
    async fn test_cached_stages_emit_cached_events_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = job(dir.path());
        std::fs::create_dir_all(config.output_dir()).unwrap();
        for path in config.artifacts().values() {
            std::fs::write(path, "existing").unwrap();
        }

        let mut sink = MockEventSink::new();
        sink.expect_try_emit()
            .with(eq(STAGE_CACHED), mockall::predicate::always())
            .times(5)
            .return_const(());
        sink.expect_try_emit()
            .with(eq(PIPELINE_COMPLETED), mockall::predicate::always())
            .times(1)
            .return_const(());

        let executor = PipelineExecutor::new(config, Arc::new(StageSet::empty()))
            .with_event_sink(Arc::new(sink));
        let result = executor.run().await;

        assert_eq!(result.status, PipelineStatus::Completed);
        assert!(result.stages.iter().all(|outcome| outcome.cached));
    }

    #[tokio::test]
    async fn test_success_without_artifact_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let stages = StageSet::new()
            .with_stage(ScriptedStage::new(StageId::Transcription).without_writing())
            .with_stage(ScriptedStage::new(StageId::Diarization));

        let result = PipelineExecutor::new(job(dir.path()), Arc::new(stages))
            .run()
            .await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result.errors[0].starts_with("transcription: declared artifact 'transcript'"));
        assert!(result.artifact(ArtifactKey::Transcript).is_none());
        assert!(result.artifact(ArtifactKey::Diarization).is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let token = Arc::new(CancellationToken::new());
        token.cancel("shutting down");

        let executor = PipelineExecutor::new(job(dir.path()), Arc::new(StageSet::new()))
            .with_cancellation(token);
        let result = executor.run().await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.errors, vec!["pipeline: cancelled: shutting down".to_string()]);
        assert!(result.stages.is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let config = Arc::new(
            PipelineConfig::new()
                .job_config("blocked", "in.mp3", Some(blocker.join("job")))
                .unwrap(),
        );
        let result = PipelineExecutor::new(config, Arc::new(StageSet::new())).run().await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result.errors[0].starts_with("pipeline: creating output directory"));
    }
}
