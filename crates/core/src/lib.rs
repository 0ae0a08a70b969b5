#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Core abstractions for the Workstation backend
//!
//! This crate defines the agent interface and the workflow definition model
//! shared by the orchestration and workflow engines.

pub mod agent;
pub mod workflow;

pub use agent::{Agent, AgentBase, AgentCapabilities, AgentSnapshot};
pub use workflow::{StepDefinition, StepType, WorkflowDefinition};
