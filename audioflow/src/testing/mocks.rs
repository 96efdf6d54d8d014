//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

use super::sample_artifact;
use crate::config::JobConfig;
use crate::core::ArtifactKey;
use crate::stages::{Stage, StageId};

#[derive(Debug, Clone)]
enum Behavior {
    Write,
    SkipWriting,
    Fail(String),
    Panic(String),
}

/// A stage that writes sample content to its declared artifacts and counts
/// invocations.
///
/// It can also be scripted to fail, to panic, or to report success without
/// writing anything.
#[derive(Debug)]
pub struct ScriptedStage {
    id: StageId,
    behavior: Behavior,
    delay: Option<Duration>,
    contents: BTreeMap<ArtifactKey, String>,
    call_count: Mutex<usize>,
}

impl ScriptedStage {
    /// Creates a stage that writes [`sample_artifact`] content.
    #[must_use]
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            behavior: Behavior::Write,
            delay: None,
            contents: BTreeMap::new(),
            call_count: Mutex::new(0),
        }
    }

    /// Overrides the content written for one artifact.
    #[must_use]
    pub fn with_content(mut self, key: ArtifactKey, content: impl Into<String>) -> Self {
        self.contents.insert(key, content.into());
        self
    }

    /// Sleeps before doing anything.
    #[must_use]
    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Some(Duration::from_millis(ms));
        self
    }

    /// Reports success without writing any artifact.
    #[must_use]
    pub fn without_writing(mut self) -> Self {
        self.behavior = Behavior::SkipWriting;
        self
    }

    /// Fails with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Fail(message.into());
        self
    }

    /// Panics with `message`.
    #[must_use]
    pub fn panicking(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Panic(message.into());
        self
    }

    /// Returns the number of times the stage was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn invoke(&self, config: &JobConfig) -> anyhow::Result<()> {
        *self.call_count.lock() += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Fail(message) => anyhow::bail!("{message}"),
            Behavior::Panic(message) => panic!("{message}"),
            Behavior::SkipWriting => Ok(()),
            Behavior::Write => {
                for key in self.id.outputs() {
                    let path = config.require_artifact(*key)?;
                    let content = self
                        .contents
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| sample_artifact(*key));
                    tokio::fs::write(path, content).await?;
                }
                Ok(())
            }
        }
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    id: StageId,
    error: String,
}

impl FailingStage {
    /// Creates a new failing stage.
    #[must_use]
    pub fn new(id: StageId, error: impl Into<String>) -> Self {
        Self {
            id,
            error: error.into(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn invoke(&self, _config: &JobConfig) -> anyhow::Result<()> {
        anyhow::bail!("{}", self.error)
    }
}
