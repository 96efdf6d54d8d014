//! Pipeline execution.
//!
//! This module provides:
//! - The stage dependency graph, grouped into concurrent levels
//! - The executor that runs one job through the graph

mod executor;
mod graph;


pub use executor::PipelineExecutor;
pub use graph::StageGraph;
