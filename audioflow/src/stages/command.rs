//! Stage backed by an external program.
//!
//! Model-backed stages usually live outside the engine (a Python script, a
//! native binary). `CommandStage` runs such a program with arguments
//! rendered from the job configuration:
//!
//! - `{audio}`: the input audio path
//! - `{output_dir}`: the job output directory
//! - `{model}`: the model reference configured for the stage
//! - `{<artifact>}`: the path of any artifact, e.g. `{transcript}`

use super::{Stage, StageId};
use crate::config::JobConfig;
use crate::core::ArtifactKey;
use anyhow::{bail, Context};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Runs an external program as a stage.
#[derive(Debug, Clone)]
pub struct CommandStage {
    id: StageId,
    program: PathBuf,
    args: Vec<String>,
}

impl CommandStage {
    /// Creates a command stage with no arguments.
    #[must_use]
    pub fn new(id: StageId, program: impl Into<PathBuf>) -> Self {
        Self {
            id,
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument template.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several argument templates.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Renders the argument templates for a job.
    #[must_use]
    pub fn render_args(&self, config: &JobConfig) -> Vec<String> {
        self.args.iter().map(|arg| render(arg, self.id, config)).collect()
    }
}

fn render(template: &str, stage: StageId, config: &JobConfig) -> String {
    let mut rendered = template
        .replace("{audio}", &config.audio_path().to_string_lossy())
        .replace("{output_dir}", &config.output_dir().to_string_lossy())
        .replace("{model}", config.model(stage).unwrap_or_default());

    for key in ArtifactKey::ALL {
        if let Some(path) = config.artifact_path(key) {
            rendered = rendered.replace(&format!("{{{key}}}"), &path.to_string_lossy());
        }
    }

    rendered
}

#[async_trait]
impl Stage for CommandStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn invoke(&self, config: &JobConfig) -> anyhow::Result<()> {
        let args = self.render_args(config);
        debug!(
            job_id = config.job_id(),
            stage = %self.id,
            program = %self.program.display(),
            ?args,
            "Spawning stage command"
        );

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("spawning {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or_default().trim();
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                detail
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn job(root: &std::path::Path) -> JobConfig {
        PipelineConfig::new()
            .with_results_root(root)
            .job_config("cmd", "/audio/call.mp3", None)
            .unwrap()
    }

    #[test]
    fn test_render_placeholders() {
        let job = job(std::path::Path::new("/srv"));
        let stage = CommandStage::new(StageId::Transcription, "whisper")
            .with_args(["{audio}", "--model", "{model}", "--out", "{transcript}", "{output_dir}"]);

        assert_eq!(
            stage.render_args(&job),
            vec![
                "/audio/call.mp3",
                "--model",
                "whisper/base",
                "--out",
                "/srv/cmd/whisper_transcript.txt",
                "/srv/cmd",
            ]
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let job = job(std::path::Path::new("/srv"));
        let stage = CommandStage::new(StageId::Alignment, "tool").with_arg("{model}-{nothing}");
        assert_eq!(stage.render_args(&job), vec!["-{nothing}"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());
        std::fs::create_dir_all(job.output_dir()).unwrap();

        let stage = CommandStage::new(StageId::Summarization, "sh")
            .with_args(["-c", "printf 'short summary' > {summary}"]);
        stage.invoke(&job).await.unwrap();

        let written =
            std::fs::read_to_string(job.artifact_path(ArtifactKey::Summary).unwrap()).unwrap();
        assert_eq!(written, "short summary");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path());

        let stage = CommandStage::new(StageId::Sentiment, "sh")
            .with_args(["-c", "echo 'model weights missing' >&2; exit 3"]);
        let err = stage.invoke(&job).await.unwrap_err();

        assert!(err.to_string().contains("model weights missing"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let stage = CommandStage::new(StageId::Sentiment, "/definitely/not/a/program");
        let err = stage.invoke(&job(dir.path())).await.unwrap_err();
        assert!(format!("{err:#}").contains("spawning"));
    }
}
