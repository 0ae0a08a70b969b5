#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Agent implementations for the browser-automation backend
//!
//! Each agent wraps the opaque action executor for one task intent. The
//! actual browser driving is out of scope here; agents produce the output
//! records the rest of the system consumes.

pub mod analyzer;
pub mod executor;
pub mod extractor;
pub mod navigator;
pub mod planner;
pub mod registry;
pub mod validator;

pub use analyzer::AnalyzerAgent;
pub use executor::ExecutorAgent;
pub use extractor::ExtractorAgent;
pub use navigator::NavigatorAgent;
pub use planner::PlannerAgent;
pub use registry::{AgentRegistry, RegistryStats};
pub use validator::ValidatorAgent;

use std::sync::Arc;
use workstation_core::agent::Agent;

/// Default agent fleet registered at startup. Navigation and execution get
/// two instances each; they carry most of the load.
pub fn default_fleet() -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(NavigatorAgent::new()),
        Arc::new(NavigatorAgent::new()),
        Arc::new(PlannerAgent::new()),
        Arc::new(ExecutorAgent::new()),
        Arc::new(ExecutorAgent::new()),
        Arc::new(ExtractorAgent::new()),
        Arc::new(AnalyzerAgent::new()),
        Arc::new(ValidatorAgent::new()),
    ]
}
