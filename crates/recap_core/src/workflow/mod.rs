//! Staged workflow pipeline for meeting-summary processing.
//!
//! # Architecture
//!
//! ```text
//! WorkflowEngine
//!     ├── WorkflowValidator   canonicalize input, classify, size-gate
//!     ├── build_steps         materialize the fixed 4-step list
//!     │       ├── Step: extract_audio   (video inputs only)
//!     │       ├── Step: process_audio
//!     │       ├── Step: transcribe
//!     │       └── Step: summarize
//!     └── WorkflowExecutor    sequential walk, progress, typed errors
//! ```
//!
//! # Example
//!
//! ```ignore
//! use recap_core::workflow::{execute_workflow, WorkflowConfig};
//!
//! let config = WorkflowConfig::new("data/video/call.mp4", "out");
//! let results = execute_workflow(config, capabilities, layout, None)?;
//! println!("summary: {:?}", results.get(&StepName::Summarize));
//! ```

mod config;
mod errors;
mod executor;
mod factory;
mod progress;
mod result;
mod step;
mod validator;

pub mod engine;

pub use config::WorkflowConfig;
pub use engine::WorkflowEngine;
pub use errors::{StageError, StepResult, WorkflowError};
pub use executor::WorkflowExecutor;
pub use factory::{build_steps, filter_executable_steps};
pub use progress::{
    ProgressCallback, ProgressTracker, StageProgress, StageStatus, WorkflowProgress,
};
pub use result::{ProcessedAudio, StageResult};
pub use step::{StepName, StepSettings, WorkflowStep};
pub use validator::WorkflowValidator;

use std::collections::BTreeMap;

use crate::capabilities::Capabilities;
use crate::config::DataLayout;

/// Execute a workflow with the given configuration.
///
/// Convenience wrapper constructing a [`WorkflowEngine`] and running it.
pub fn execute_workflow(
    config: WorkflowConfig,
    capabilities: Capabilities,
    layout: DataLayout,
    progress: Option<&ProgressCallback>,
) -> Result<BTreeMap<StepName, StageResult>, WorkflowError> {
    let mut engine = WorkflowEngine::new(config, capabilities, layout)?;
    engine.execute(progress)
}
