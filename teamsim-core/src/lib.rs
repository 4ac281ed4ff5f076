// ABOUTME: Chat-workspace environment core: teams, channels, messages, users and episodes
// ABOUTME: Pure synchronous state machine consumed by the HTTP request layer and the live relay

pub mod action;
pub mod environment;
pub mod metrics;
pub mod workspace;

pub use action::{Action, ActionCatalog, ActionKind, ActionRequest};
pub use environment::{
    Environment, EnvironmentConfig, Observation, PresenceChange, StepInfo, StepResult,
};
pub use workspace::{AgentCursor, Channel, EpisodeStats, Message, Team, User, UserStatus};
