// ABOUTME: Root library module exposing the server, request layer, relay and configuration
// ABOUTME: The environment itself lives in teamsim-core and is re-exported here

pub mod config;
pub mod paths;
pub mod relay;
pub mod routes;
pub mod server;

// Re-export the environment core
pub use teamsim_core::metrics;
pub use teamsim_core::{
    ActionCatalog, ActionRequest, Environment, EnvironmentConfig, Observation, StepResult,
};
