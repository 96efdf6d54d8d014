//! Pipeline configuration.
//!
//! [`PipelineConfig`] is the process-wide template. Every submission derives
//! an immutable [`JobConfig`] from it whose artifact paths are rooted under a
//! job-specific output directory.

use crate::core::ArtifactKey;
use crate::errors::{AudioflowError, Result};
use crate::stages::StageId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`PipelineConfig::results_root`].
pub const RESULTS_ROOT_ENV: &str = "AUDIOFLOW_RESULTS_ROOT";

/// Process-wide pipeline configuration template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory under which per-job output directories are created.
    #[serde(default = "default_results_root")]
    pub results_root: PathBuf,
    /// Input audio used when a submission does not name one.
    #[serde(default)]
    pub audio_path: Option<PathBuf>,
    /// Model or resource reference per stage.
    #[serde(default = "default_models")]
    pub models: BTreeMap<StageId, String>,
    /// Artifact file names. Only the final path component is kept per job.
    #[serde(default = "default_artifact_files")]
    pub artifact_files: BTreeMap<ArtifactKey, PathBuf>,
}

fn default_results_root() -> PathBuf {
    PathBuf::from("results")
}

fn default_models() -> BTreeMap<StageId, String> {
    BTreeMap::from([
        (StageId::Transcription, "whisper/base".to_string()),
        (
            StageId::Diarization,
            "speechbrain/speaker-diarization-3x-ECAPA-TDNN".to_string(),
        ),
        (StageId::Sentiment, "ai4bharat/indic-bert".to_string()),
        (StageId::Summarization, "t5-base".to_string()),
    ])
}

fn default_artifact_files() -> BTreeMap<ArtifactKey, PathBuf> {
    ArtifactKey::ALL
        .into_iter()
        .map(|key| (key, PathBuf::from(key.default_file_name())))
        .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            results_root: default_results_root(),
            audio_path: None,
            models: default_models(),
            artifact_files: default_artifact_files(),
        }
    }
}

/// Partial configuration merged onto a [`PipelineConfig`].
///
/// Scalars replace, maps merge key by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    /// Replaces the results root.
    pub results_root: Option<PathBuf>,
    /// Replaces the default input audio.
    pub audio_path: Option<PathBuf>,
    /// Merged into the model map.
    pub models: BTreeMap<StageId, String>,
    /// Merged into the artifact file map.
    pub artifact_files: BTreeMap<ArtifactKey, PathBuf>,
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the results root.
    #[must_use]
    pub fn with_results_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.results_root = root.into();
        self
    }

    /// Sets the model reference for a stage.
    #[must_use]
    pub fn with_model(mut self, stage: StageId, model: impl Into<String>) -> Self {
        self.models.insert(stage, model.into());
        self
    }

    /// Sets the file name of an artifact.
    #[must_use]
    pub fn with_artifact_file(mut self, key: ArtifactKey, file: impl Into<PathBuf>) -> Self {
        self.artifact_files.insert(key, file.into());
        self
    }

    /// Loads overrides from a JSON file on top of the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let overrides: ConfigOverrides = serde_json::from_str(&raw)?;
        let mut config = Self::default();
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_env_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides using a custom variable lookup.
    #[must_use]
    pub fn with_env_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(RESULTS_ROOT_ENV).filter(|value| !value.trim().is_empty()) {
            self.results_root = PathBuf::from(root);
        }
        self
    }

    /// Merges overrides into this configuration.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(root) = overrides.results_root {
            self.results_root = root;
        }
        if let Some(audio) = overrides.audio_path {
            self.audio_path = Some(audio);
        }
        self.models.extend(overrides.models);
        self.artifact_files.extend(overrides.artifact_files);
    }

    /// Checks that every artifact has a distinct, usable file name.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for key in ArtifactKey::ALL {
            let file_name = self
                .artifact_files
                .get(&key)
                .and_then(|path| path.file_name())
                .ok_or_else(|| {
                    AudioflowError::config(format!("artifact '{key}' has no file name"))
                })?;

            if !seen.insert(file_name.to_os_string()) {
                return Err(AudioflowError::config(format!(
                    "artifact '{key}' reuses file name {}",
                    Path::new(file_name).display()
                )));
            }
        }

        Ok(())
    }

    /// Default output directory for a job.
    #[must_use]
    pub fn job_output_dir(&self, job_id: &str) -> PathBuf {
        self.results_root.join(job_id)
    }

    /// Derives the configuration for one job.
    ///
    /// Every artifact path is rewritten to `<output_dir>/<file name>`, so two
    /// jobs with different output directories never share an artifact path.
    pub fn job_config(
        &self,
        job_id: impl Into<String>,
        audio_path: impl Into<PathBuf>,
        output_dir: Option<PathBuf>,
    ) -> Result<JobConfig> {
        self.validate()?;

        let job_id = job_id.into();
        let output_dir = output_dir.unwrap_or_else(|| self.job_output_dir(&job_id));

        let artifacts = self
            .artifact_files
            .iter()
            .filter_map(|(key, path)| path.file_name().map(|name| (*key, output_dir.join(name))))
            .collect();

        Ok(JobConfig {
            job_id,
            audio_path: audio_path.into(),
            output_dir,
            artifacts,
            models: self.models.clone(),
        })
    }
}

/// Immutable configuration for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    job_id: String,
    audio_path: PathBuf,
    output_dir: PathBuf,
    artifacts: BTreeMap<ArtifactKey, PathBuf>,
    models: BTreeMap<StageId, String>,
}

impl JobConfig {
    /// The job this configuration belongs to.
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// The input audio.
    #[must_use]
    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    /// The job's output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of an artifact within the job directory.
    #[must_use]
    pub fn artifact_path(&self, key: ArtifactKey) -> Option<&Path> {
        self.artifacts.get(&key).map(PathBuf::as_path)
    }

    /// All artifact paths.
    #[must_use]
    pub fn artifacts(&self) -> &BTreeMap<ArtifactKey, PathBuf> {
        &self.artifacts
    }

    /// Model reference for a stage.
    #[must_use]
    pub fn model(&self, stage: StageId) -> Option<&str> {
        self.models.get(&stage).map(String::as_str)
    }

    /// Resolves an artifact path, failing with a descriptive error.
    ///
    /// Convenient inside stage implementations that return `anyhow::Result`.
    pub fn require_artifact(&self, key: ArtifactKey) -> anyhow::Result<&Path> {
        self.artifact_path(key)
            .ok_or_else(|| anyhow::anyhow!("no path configured for artifact '{key}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.results_root, PathBuf::from("results"));
        assert_eq!(config.artifact_files.len(), ArtifactKey::ALL.len());
    }

    #[test]
    fn test_job_config_roots_artifacts_under_job_dir() {
        let config = PipelineConfig::new()
            .with_results_root("/srv/results")
            .with_artifact_file(ArtifactKey::Transcript, "speech_brain/whisper_transcript.txt");

        let job = config.job_config("job-a", "/audio/call.mp3", None).unwrap();

        assert_eq!(job.output_dir(), Path::new("/srv/results/job-a"));
        assert_eq!(
            job.artifact_path(ArtifactKey::Transcript),
            Some(Path::new("/srv/results/job-a/whisper_transcript.txt"))
        );
        for path in job.artifacts().values() {
            assert!(path.starts_with("/srv/results/job-a"));
        }
        assert_eq!(job.model(StageId::Summarization), Some("t5-base"));
        assert_eq!(job.model(StageId::Alignment), None);
    }

    #[test]
    fn test_job_configs_are_disjoint() {
        let config = PipelineConfig::new().with_results_root("/srv/results");
        let a = config.job_config("a", "/audio/same.mp3", None).unwrap();
        let b = config.job_config("b", "/audio/same.mp3", None).unwrap();

        for path in a.artifacts().values() {
            assert!(!b.artifacts().values().any(|other| other == path));
        }
    }

    #[test]
    fn test_explicit_output_dir() {
        let config = PipelineConfig::new();
        let job = config
            .job_config("a", "in.mp3", Some(PathBuf::from("/tmp/custom")))
            .unwrap();
        assert_eq!(job.output_dir(), Path::new("/tmp/custom"));
        assert!(job
            .artifact_path(ArtifactKey::Summary)
            .unwrap()
            .starts_with("/tmp/custom"));
    }

    #[test]
    fn test_validate_rejects_duplicate_file_names() {
        let config = PipelineConfig::new()
            .with_artifact_file(ArtifactKey::Summary, "out/shared.txt")
            .with_artifact_file(ArtifactKey::Formatted, "shared.txt");

        let err = config.validate().unwrap_err();
        assert!(matches!(err, AudioflowError::Config(_)));
        assert!(config.job_config("a", "in.mp3", None).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_artifact() {
        let mut config = PipelineConfig::new();
        config.artifact_files.remove(&ArtifactKey::Sentiment);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_merges_maps_and_replaces_scalars() {
        let mut config = PipelineConfig::new();
        config.apply(ConfigOverrides {
            results_root: Some(PathBuf::from("/data")),
            models: BTreeMap::from([(StageId::Summarization, "./T5-fine-tuned".to_string())]),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.results_root, PathBuf::from("/data"));
        assert_eq!(config.models.get(&StageId::Summarization).unwrap(), "./T5-fine-tuned");
        assert_eq!(config.models.get(&StageId::Transcription).unwrap(), "whisper/base");
    }

    #[test]
    fn test_from_json_file_overlays_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{"results_root": "/var/audioflow", "artifact_files": {"summary": "summary.md"}}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.results_root, PathBuf::from("/var/audioflow"));
        assert_eq!(
            config.artifact_files.get(&ArtifactKey::Summary).unwrap(),
            &PathBuf::from("summary.md")
        );
        assert_eq!(
            config.artifact_files.get(&ArtifactKey::Transcript).unwrap(),
            &PathBuf::from("whisper_transcript.txt")
        );
    }

    #[test]
    fn test_from_json_file_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"output_dirr": "/x"}"#).unwrap();

        let err = PipelineConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, AudioflowError::Serialization(_)));
    }

    #[test]
    fn test_env_override() {
        let config = PipelineConfig::new().with_env_overrides_from(|name| {
            (name == RESULTS_ROOT_ENV).then(|| "/env/results".to_string())
        });
        assert_eq!(config.results_root, PathBuf::from("/env/results"));

        let untouched = PipelineConfig::new().with_env_overrides_from(|_| Some("  ".to_string()));
        assert_eq!(untouched.results_root, PathBuf::from("results"));
    }
}
