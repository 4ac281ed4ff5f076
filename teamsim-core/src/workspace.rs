// ABOUTME: Workspace data model - teams, channels, messages, users, cursor and episode stats
// ABOUTME: Also holds the fixed seed every reset rebuilds the workspace from

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// Back-reference to the owning team
    pub team_id: String,
    pub unread: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Team {
    pub fn channel(&self, channel_id: &str) -> Option<&Channel> {
        self.channels.iter().find(|ch| ch.id == channel_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    pub content: String,
    /// Milliseconds since Unix epoch
    pub timestamp: i64,
    pub reactions: Vec<String>,
}

impl Message {
    pub fn new(
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            content: content.into(),
            timestamp: now_millis(),
            reactions: Vec::new(),
        }
    }

    /// True if this message mentions `user_id` and was written by someone else
    pub fn mentions(&self, user_id: &str) -> bool {
        self.user_id != user_id && self.content.contains(&format!("@{}", user_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Available,
    Busy,
    Away,
    Offline,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Available => "available",
            UserStatus::Busy => "busy",
            UserStatus::Away => "away",
            UserStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(UserStatus::Available),
            "busy" => Ok(UserStatus::Busy),
            "away" => Ok(UserStatus::Away),
            "offline" => Ok(UserStatus::Offline),
            other => anyhow::bail!(
                "Unknown presence status '{}' (expected available, busy, away or offline)",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub status: UserStatus,
    pub avatar: String,
}

/// The single active viewpoint: which team/channel the agent is looking at and who it acts as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCursor {
    pub current_team_id: String,
    pub current_channel_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeStats {
    pub step_count: u32,
    pub total_reward: f64,
    pub messages_sent: u32,
    pub channels_switched: u32,
    /// Milliseconds since Unix epoch
    pub start_time: i64,
}

impl EpisodeStats {
    pub fn new() -> Self {
        Self {
            step_count: 0,
            total_reward: 0.0,
            messages_sent: 0,
            channels_switched: 0,
            start_time: now_millis(),
        }
    }
}

impl Default for EpisodeStats {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Seed
// =============================================================================

pub const AGENT_USER_ID: &str = "agent";

const SEED_TEAMS: &[(&str, &str, &[(&str, &str)])] = &[
    (
        "team-1",
        "General Team",
        &[
            ("channel-1", "General"),
            ("channel-2", "Random"),
            ("channel-3", "Announcements"),
        ],
    ),
    (
        "team-2",
        "Project Alpha",
        &[("channel-4", "Development"), ("channel-5", "Design")],
    ),
];

const SEED_USERS: &[(&str, &str, UserStatus, &str)] = &[
    ("user-1", "Alice", UserStatus::Available, "👩"),
    ("user-2", "Bob", UserStatus::Busy, "👨"),
    ("user-3", "Charlie", UserStatus::Away, "🧑"),
    (AGENT_USER_ID, "RL Agent", UserStatus::Available, "🤖"),
];

/// (channel, author, content) appended in order after every reset
pub const SEED_MESSAGES: &[(&str, &str, &str)] = &[
    ("channel-1", "user-1", "Welcome to the team! 👋"),
    ("channel-1", "user-2", "Hey everyone!"),
    ("channel-2", "user-3", "Anyone up for lunch?"),
];

pub fn seed_teams() -> Vec<Team> {
    SEED_TEAMS
        .iter()
        .map(|(team_id, team_name, channels)| Team {
            id: team_id.to_string(),
            name: team_name.to_string(),
            channels: channels
                .iter()
                .map(|(id, name)| Channel {
                    id: id.to_string(),
                    name: name.to_string(),
                    team_id: team_id.to_string(),
                    unread: 0,
                })
                .collect(),
        })
        .collect()
}

pub fn seed_users() -> Vec<User> {
    SEED_USERS
        .iter()
        .map(|(id, name, status, avatar)| User {
            id: id.to_string(),
            name: name.to_string(),
            status: *status,
            avatar: avatar.to_string(),
        })
        .collect()
}

pub fn seed_cursor() -> AgentCursor {
    AgentCursor {
        current_team_id: "team-1".to_string(),
        current_channel_id: "channel-1".to_string(),
        user_id: AGENT_USER_ID.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_seed_channel_ids_are_globally_unique() {
        let teams = seed_teams();
        let ids: Vec<&str> = teams
            .iter()
            .flat_map(|t| t.channels.iter().map(|c| c.id.as_str()))
            .collect();
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_seed_channels_point_back_to_their_team() {
        for team in seed_teams() {
            for channel in &team.channels {
                assert_eq!(channel.team_id, team.id);
            }
        }
    }

    #[test]
    fn test_message_mentions_ignores_own_messages() {
        let from_alice = Message::new("channel-1", "user-1", "ping @agent");
        let from_agent = Message::new("channel-1", "agent", "talking to @agent");
        assert!(from_alice.mentions("agent"));
        assert!(!from_agent.mentions("agent"));
        assert!(!from_alice.mentions("user-2"));
    }

    #[test]
    fn test_user_status_parse_and_serialize() {
        assert_eq!("busy".parse::<UserStatus>().unwrap(), UserStatus::Busy);
        assert!("sleeping".parse::<UserStatus>().is_err());
        let json = serde_json::to_string(&UserStatus::Offline).unwrap();
        assert_eq!(json, "\"offline\"");
    }

    #[test]
    fn test_cursor_serializes_camel_case() {
        let json = serde_json::to_value(seed_cursor()).unwrap();
        assert_eq!(json["currentTeamId"], "team-1");
        assert_eq!(json["currentChannelId"], "channel-1");
        assert_eq!(json["userId"], "agent");
    }
}
