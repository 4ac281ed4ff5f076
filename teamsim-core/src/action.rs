// ABOUTME: Action surface of the environment - wire requests, typed actions and the catalog
// ABOUTME: Decodes {type, payload} into a closed Action enum; unknown tags stay distinguishable

use anyhow::{Context, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Action as it arrives on the wire: a string tag plus a free-form payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl ActionRequest {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// The four recognized action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendMessage,
    SwitchChannel,
    ReactToMessage,
    JoinCall,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::SendMessage,
        ActionKind::SwitchChannel,
        ActionKind::ReactToMessage,
        ActionKind::JoinCall,
    ];

    /// Map a wire tag to a kind. `None` means the tag is not an action we know.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ActionKind::SendMessage => "send_message",
            ActionKind::SwitchChannel => "switch_channel",
            ActionKind::ReactToMessage => "react_to_message",
            ActionKind::JoinCall => "join_call",
        }
    }

    /// Value reported in `info.action` when a handler of this kind completes
    pub fn outcome(&self) -> &'static str {
        match self {
            ActionKind::SendMessage => "message_sent",
            ActionKind::SwitchChannel => "channel_switched",
            ActionKind::ReactToMessage => "reacted",
            ActionKind::JoinCall => "joined_call",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ActionKind::SendMessage => "Send a message to a channel",
            ActionKind::SwitchChannel => "Switch to a different channel",
            ActionKind::ReactToMessage => "React to a message with an emoji",
            ActionKind::JoinCall => "Join a call in a channel",
        }
    }

    fn payload_fields(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            ActionKind::SendMessage => &[
                ("content", "string (required)"),
                (
                    "channelId",
                    "string (optional, defaults to current channel)",
                ),
            ],
            ActionKind::SwitchChannel => &[("channelId", "string (required)")],
            ActionKind::ReactToMessage => &[
                ("messageId", "string (required)"),
                ("reaction", "string (required)"),
            ],
            ActionKind::JoinCall => &[(
                "channelId",
                "string (optional, defaults to current channel)",
            )],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "loose_id")]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchChannelPayload {
    #[serde(default, deserialize_with = "loose_id")]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactToMessagePayload {
    #[serde(default, deserialize_with = "loose_id")]
    pub message_id: Option<String>,
    #[serde(default, deserialize_with = "loose_id")]
    pub reaction: Option<String>,
}

/// Identifiers are compared as text. A non-string id (`5`, `true`) keeps its
/// JSON rendering, so it simply matches no channel or message.
fn loose_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(id) => Some(id),
        other => Some(other.to_string()),
    })
}

/// A decoded action, one variant per handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendMessage(SendMessagePayload),
    SwitchChannel(SwitchChannelPayload),
    ReactToMessage(ReactToMessagePayload),
    /// Takes no input; whatever payload came along is ignored
    JoinCall,
}

impl Action {
    /// Decode the payload for a known kind.
    ///
    /// Every kind but `join_call` needs a payload, so `null` fails. A payload
    /// that is not an object carries no fields. Inside an object only
    /// `content` is type-checked; ids are taken as text.
    pub fn decode(kind: ActionKind, payload: &Value) -> Result<Self> {
        let action = match kind {
            ActionKind::SendMessage => Action::SendMessage(decode_payload(kind, payload)?),
            ActionKind::SwitchChannel => Action::SwitchChannel(decode_payload(kind, payload)?),
            ActionKind::ReactToMessage => Action::ReactToMessage(decode_payload(kind, payload)?),
            ActionKind::JoinCall => Action::JoinCall,
        };
        Ok(action)
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::SendMessage(_) => ActionKind::SendMessage,
            Action::SwitchChannel(_) => ActionKind::SwitchChannel,
            Action::ReactToMessage(_) => ActionKind::ReactToMessage,
            Action::JoinCall => ActionKind::JoinCall,
        }
    }
}

fn decode_payload<T>(kind: ActionKind, payload: &Value) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match payload {
        Value::Null => anyhow::bail!("Invalid payload for {}: payload is required", kind.tag()),
        Value::Object(_) => {
            T::deserialize(payload).with_context(|| format!("Invalid payload for {}", kind.tag()))
        }
        _ => Ok(T::default()),
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Payload documentation, serialized as an ordered `{field: doc}` object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadDoc(&'static [(&'static str, &'static str)]);

impl PayloadDoc {
    pub fn fields(&self) -> &'static [(&'static str, &'static str)] {
        self.0
    }
}

impl Serialize for PayloadDoc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, doc) in self.0 {
            map.serialize_entry(field, doc)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub description: &'static str,
    pub payload: PayloadDoc,
}

impl ActionDescriptor {
    pub fn for_kind(kind: ActionKind) -> Self {
        Self {
            kind,
            description: kind.description(),
            payload: PayloadDoc(kind.payload_fields()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    pub team_name: String,
}

/// Result of `list_actions`: every action type plus every channel it can target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionCatalog {
    pub actions: Vec<ActionDescriptor>,
    pub channels: Vec<ChannelSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_tag_round_trips_every_kind() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ActionKind::from_tag("dance"), None);
        assert_eq!(ActionKind::from_tag(""), None);
    }

    #[test]
    fn test_request_without_payload_defaults_to_null() {
        let req: ActionRequest = serde_json::from_str(r#"{"type": "join_call"}"#).unwrap();
        assert_eq!(req.kind, "join_call");
        assert!(req.payload.is_null());
    }

    #[test]
    fn test_decode_send_message_camel_case_fields() {
        let payload = json!({"content": "hi", "channelId": "channel-4"});
        let action = Action::decode(ActionKind::SendMessage, &payload).unwrap();
        assert_eq!(
            action,
            Action::SendMessage(SendMessagePayload {
                content: Some("hi".to_string()),
                channel_id: Some("channel-4".to_string()),
            })
        );
    }

    #[test]
    fn test_decode_rejects_null_payload_for_send_message() {
        let err = Action::decode(ActionKind::SendMessage, &Value::Null).unwrap_err();
        assert!(err.to_string().contains("send_message"));
    }

    #[test]
    fn test_decode_rejects_wrongly_typed_field() {
        let payload = json!({"content": 42});
        assert!(Action::decode(ActionKind::SendMessage, &payload).is_err());
    }

    #[test]
    fn test_decode_join_call_ignores_payload() {
        for payload in [Value::Null, json!("now"), json!({"channelId": 5}), json!([1, 2])] {
            let action = Action::decode(ActionKind::JoinCall, &payload).unwrap();
            assert_eq!(action, Action::JoinCall);
            assert_eq!(action.kind(), ActionKind::JoinCall);
        }
    }

    #[test]
    fn test_decode_takes_non_string_ids_as_text() {
        let action = Action::decode(ActionKind::SwitchChannel, &json!({"channelId": 5})).unwrap();
        assert_eq!(
            action,
            Action::SwitchChannel(SwitchChannelPayload {
                channel_id: Some("5".to_string()),
            })
        );

        let action = Action::decode(
            ActionKind::ReactToMessage,
            &json!({"messageId": 123, "reaction": null}),
        )
        .unwrap();
        assert_eq!(
            action,
            Action::ReactToMessage(ReactToMessagePayload {
                message_id: Some("123".to_string()),
                reaction: None,
            })
        );
    }

    #[test]
    fn test_decode_non_object_payload_has_no_fields() {
        let action = Action::decode(ActionKind::ReactToMessage, &json!("thumbs")).unwrap();
        assert_eq!(action, Action::ReactToMessage(ReactToMessagePayload::default()));
        assert!(Action::decode(ActionKind::ReactToMessage, &Value::Null).is_err());
    }

    #[test]
    fn test_descriptor_serializes_ordered_payload_docs() {
        let json = serde_json::to_string(&ActionDescriptor::for_kind(ActionKind::SendMessage))
            .unwrap();
        assert!(json.contains("\"type\":\"send_message\""));
        let content_at = json.find("\"content\"").unwrap();
        let channel_at = json.find("\"channelId\"").unwrap();
        assert!(content_at < channel_at);
    }
}
