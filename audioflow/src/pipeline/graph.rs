//! Stage dependency graph.
//!
//! Groups stages into levels: every stage in a level depends only on stages
//! from earlier levels, so a level's stages can run concurrently.

use crate::stages::StageId;
use std::collections::HashMap;

/// The dependency graph of the analysis pipeline, grouped into levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGraph {
    levels: Vec<Vec<StageId>>,
}

impl Default for StageGraph {
    fn default() -> Self {
        Self::standard()
    }
}

impl StageGraph {
    /// Builds the graph over every [`StageId`].
    #[must_use]
    pub fn standard() -> Self {
        Self::from_stages(&StageId::ALL)
    }

    /// Builds the graph over `stages`, which must list dependencies before
    /// dependents. Dependencies outside `stages` are ignored.
    #[must_use]
    pub fn from_stages(stages: &[StageId]) -> Self {
        let mut depth: HashMap<StageId, usize> = HashMap::new();
        let mut levels: Vec<Vec<StageId>> = Vec::new();

        for &stage in stages {
            let level = stage
                .dependencies()
                .iter()
                .filter_map(|dep| depth.get(dep))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);

            depth.insert(stage, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(stage);
        }

        Self { levels }
    }

    /// Stage levels in execution order.
    #[must_use]
    pub fn levels(&self) -> &[Vec<StageId>] {
        &self.levels
    }

    /// Number of stages in the graph.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Flattened execution order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<StageId> {
        self.levels.iter().flatten().copied().collect()
    }

    /// Index of the level containing `stage`.
    #[must_use]
    pub fn level_of(&self, stage: StageId) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(&stage))
    }
}
