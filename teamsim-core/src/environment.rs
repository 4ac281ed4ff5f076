// ABOUTME: Environment state machine - owns workspace state and the episode lifecycle
// ABOUTME: reset/observe/step with reward computation, plus add_message and presence for live chat

use crate::action::{
    Action, ActionCatalog, ActionDescriptor, ActionKind, ActionRequest, ChannelSummary,
    ReactToMessagePayload, SendMessagePayload, SwitchChannelPayload,
};
use crate::metrics;
use crate::workspace::{
    now_millis, seed_cursor, seed_teams, seed_users, AgentCursor, Channel, EpisodeStats, Message,
    Team, User, UserStatus, SEED_MESSAGES,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SEND_MESSAGE_REWARD: f64 = 0.1;
pub const MENTION_BONUS: f64 = 0.5;
pub const EMPTY_MESSAGE_PENALTY: f64 = -0.2;
pub const SWITCH_CHANNEL_REWARD: f64 = 0.05;
pub const UNKNOWN_CHANNEL_PENALTY: f64 = -0.3;
pub const REACTION_REWARD: f64 = 0.05;
pub const JOIN_CALL_REWARD: f64 = 0.3;
pub const INVALID_ACTION_PENALTY: f64 = -0.1;
pub const FAILURE_PENALTY: f64 = -0.5;

/// Messages of the cursor channel included in an observation
pub const RECENT_MESSAGE_WINDOW: usize = 10;
/// Messages scanned for a mention of the acting user before a send
pub const MENTION_WINDOW: usize = 5;
pub const DEFAULT_MAX_STEPS: u32 = 100;

pub const INVALID_ACTION: &str = "invalid";
pub const MAX_STEPS_REASON: &str = "max_steps_reached";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Episode ends once this many steps have been taken
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

/// Read-only snapshot of the workspace from the cursor's point of view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub agent_state: AgentCursor,
    pub current_channel: Option<Channel>,
    /// Oldest first
    pub recent_messages: Vec<Message>,
    pub teams: Vec<Team>,
    pub users: Vec<User>,
    pub episode_stats: EpisodeStats,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    #[serde(rename = "state")]
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
    /// Message appended by this step, for relaying to live clients
    #[serde(skip)]
    pub message: Option<Message>,
}

/// What a handler produced: its reward and any message it appended
#[derive(Debug)]
struct Outcome {
    reward: f64,
    message: Option<Message>,
}

impl From<f64> for Outcome {
    fn from(reward: f64) -> Self {
        Self {
            reward,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChange {
    pub user_id: String,
    pub status: UserStatus,
}

/// The authoritative in-memory workspace. One instance per process, mutated
/// through `&mut self`; callers sharing it across tasks must serialize access.
#[derive(Debug)]
pub struct Environment {
    config: EnvironmentConfig,
    teams: Vec<Team>,
    /// channel id -> message log in insertion order
    messages: HashMap<String, Vec<Message>>,
    users: Vec<User>,
    cursor: AgentCursor,
    stats: EpisodeStats,
}

impl Environment {
    /// Create an environment already reset to the seed workspace
    pub fn new(config: EnvironmentConfig) -> Self {
        let mut env = Self {
            config,
            teams: Vec::new(),
            messages: HashMap::new(),
            users: Vec::new(),
            cursor: seed_cursor(),
            stats: EpisodeStats::new(),
        };
        env.reset();
        env
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Rebuild the whole workspace from the seed and start a new episode
    pub fn reset(&mut self) -> Observation {
        self.teams = seed_teams();
        self.messages = self
            .teams
            .iter()
            .flat_map(|team| team.channels.iter())
            .map(|channel| (channel.id.clone(), Vec::new()))
            .collect();
        self.users = seed_users();
        self.cursor = seed_cursor();
        self.stats = EpisodeStats::new();

        for (channel_id, user_id, content) in SEED_MESSAGES {
            self.add_message(channel_id, user_id, content);
        }

        metrics::record_reset();
        tracing::info!(
            teams = self.teams.len(),
            users = self.users.len(),
            max_steps = self.config.max_steps,
            "Environment reset"
        );

        self.observe()
    }

    pub fn observe(&self) -> Observation {
        let recent_messages = self
            .messages
            .get(&self.cursor.current_channel_id)
            .map(|log| log[log.len().saturating_sub(RECENT_MESSAGE_WINDOW)..].to_vec())
            .unwrap_or_default();

        Observation {
            agent_state: self.cursor.clone(),
            current_channel: self.current_channel().cloned(),
            recent_messages,
            teams: self.teams.clone(),
            users: self.users.clone(),
            episode_stats: self.stats.clone(),
            timestamp: now_millis(),
        }
    }

    /// Apply one action. Never fails: unknown types and handler failures are
    /// turned into penalty rewards, and every call counts as a step.
    pub fn step(&mut self, request: &ActionRequest) -> StepResult {
        let mut info = StepInfo::default();
        let mut message = None;
        let kind = ActionKind::from_tag(&request.kind);

        let (reward, outcome) = match kind {
            None => {
                info.action = Some(INVALID_ACTION.to_string());
                (INVALID_ACTION_PENALTY, "invalid")
            }
            Some(kind) => match self.dispatch(kind, request) {
                Ok(handled) => {
                    info.action = Some(kind.outcome().to_string());
                    message = handled.message;
                    (handled.reward, "ok")
                }
                Err(e) => {
                    tracing::warn!(
                        action = kind.tag(),
                        error = %e,
                        "Action handler failed, applying penalty"
                    );
                    info.error = Some(format!("{:#}", e));
                    (FAILURE_PENALTY, "error")
                }
            },
        };

        self.stats.step_count += 1;
        self.stats.total_reward += reward;
        metrics::record_step(kind.map_or(INVALID_ACTION, |k| k.tag()), outcome);

        let done = self.stats.step_count >= self.config.max_steps;
        if done {
            info.reason = Some(MAX_STEPS_REASON.to_string());
            if self.stats.step_count == self.config.max_steps {
                metrics::record_episode_completed();
                tracing::info!(
                    steps = self.stats.step_count,
                    total_reward = self.stats.total_reward,
                    "Episode reached max steps"
                );
            }
        }

        tracing::debug!(
            action = %request.kind,
            reward,
            step = self.stats.step_count,
            done,
            "Step applied"
        );

        StepResult {
            observation: self.observe(),
            reward,
            done,
            info,
            message,
        }
    }

    fn dispatch(&mut self, kind: ActionKind, request: &ActionRequest) -> Result<Outcome> {
        let outcome = match Action::decode(kind, &request.payload)? {
            Action::SendMessage(payload) => self.send_message(payload),
            Action::SwitchChannel(payload) => self.switch_channel(payload).into(),
            Action::ReactToMessage(payload) => self.react_to_message(payload).into(),
            Action::JoinCall => JOIN_CALL_REWARD.into(),
        };
        Ok(outcome)
    }

    fn send_message(&mut self, payload: SendMessagePayload) -> Outcome {
        let content = match payload.content {
            Some(content) if !content.trim().is_empty() => content,
            _ => return EMPTY_MESSAGE_PENALTY.into(),
        };
        let target = payload
            .channel_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.cursor.current_channel_id.clone());
        let acting_user = self.cursor.user_id.clone();

        let mentioned = self
            .messages
            .get(&target)
            .map(|log| {
                log[log.len().saturating_sub(MENTION_WINDOW)..]
                    .iter()
                    .any(|msg| msg.mentions(&acting_user))
            })
            .unwrap_or(false);

        let message = self.add_message(&target, &acting_user, &content);
        self.stats.messages_sent += 1;
        metrics::record_message("agent");

        let reward = if mentioned {
            SEND_MESSAGE_REWARD + MENTION_BONUS
        } else {
            SEND_MESSAGE_REWARD
        };
        Outcome {
            reward,
            message: Some(message),
        }
    }

    fn switch_channel(&mut self, payload: SwitchChannelPayload) -> f64 {
        let Some(channel_id) = payload.channel_id else {
            return UNKNOWN_CHANNEL_PENALTY;
        };
        let Some(team_id) = self
            .teams
            .iter()
            .find(|team| team.channel(&channel_id).is_some())
            .map(|team| team.id.clone())
        else {
            tracing::debug!(channel_id = %channel_id, "Switch to unknown channel");
            return UNKNOWN_CHANNEL_PENALTY;
        };

        self.cursor.current_team_id = team_id;
        self.cursor.current_channel_id = channel_id;
        self.stats.channels_switched += 1;
        SWITCH_CHANNEL_REWARD
    }

    // Reactions are accepted but not recorded on the message.
    fn react_to_message(&self, payload: ReactToMessagePayload) -> f64 {
        tracing::debug!(
            message_id = ?payload.message_id,
            reaction = ?payload.reaction,
            "Reaction received"
        );
        REACTION_REWARD
    }

    /// Append a message without any reward or episode accounting.
    ///
    /// Bumps the target channel's unread counter unless the cursor is on it.
    /// Channel and user ids are not validated here.
    pub fn add_message(&mut self, channel_id: &str, user_id: &str, content: &str) -> Message {
        let message = Message::new(channel_id, user_id, content);
        self.messages
            .entry(channel_id.to_string())
            .or_default()
            .push(message.clone());

        if channel_id != self.cursor.current_channel_id {
            if let Some(channel) = self.channel_mut(channel_id) {
                channel.unread += 1;
            }
        }

        message
    }

    /// Update a user's presence. Returns `None` if the user does not exist.
    pub fn set_presence(&mut self, user_id: &str, status: UserStatus) -> Option<PresenceChange> {
        let user = self.users.iter_mut().find(|u| u.id == user_id)?;
        user.status = status;
        Some(PresenceChange {
            user_id: user.id.clone(),
            status,
        })
    }

    pub fn list_actions(&self) -> ActionCatalog {
        ActionCatalog {
            actions: ActionKind::ALL
                .into_iter()
                .map(ActionDescriptor::for_kind)
                .collect(),
            channels: self
                .teams
                .iter()
                .flat_map(|team| {
                    team.channels.iter().map(move |ch| ChannelSummary {
                        id: ch.id.clone(),
                        name: ch.name.clone(),
                        team_name: team.name.clone(),
                    })
                })
                .collect(),
        }
    }

    pub fn stats(&self) -> EpisodeStats {
        self.stats.clone()
    }

    pub fn cursor(&self) -> &AgentCursor {
        &self.cursor
    }

    pub fn current_channel(&self) -> Option<&Channel> {
        self.channel(&self.cursor.current_channel_id)
    }

    pub fn channel(&self, channel_id: &str) -> Option<&Channel> {
        self.teams.iter().find_map(|team| team.channel(channel_id))
    }

    fn channel_mut(&mut self, channel_id: &str) -> Option<&mut Channel> {
        self.teams
            .iter_mut()
            .flat_map(|team| team.channels.iter_mut())
            .find(|ch| ch.id == channel_id)
    }

    /// Full message log of a channel, oldest first
    pub fn messages(&self, channel_id: &str) -> &[Message] {
        self.messages
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(EnvironmentConfig::default())
    }
}
