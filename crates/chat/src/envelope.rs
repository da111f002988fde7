use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

/// Outer wrapper delivered by the Pub/Sub push subscription.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct PushEnvelope {
    #[serde(default)]
    pub message: Option<PushMessage>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub publish_time: Option<String>,
}

/// Decoded chat event. Fields the bot does not read are ignored; the
/// ones it does read are all optional and accessed through defaulting
/// accessors, matching the loosely shaped documents Chat delivers.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ChatEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub space: Option<SpaceRef>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    #[serde(default)]
    pub slash_command: Option<SlashCommandRef>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlashCommandRef {
    #[serde(default, deserialize_with = "lenient_command_id")]
    pub command_id: i64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SpaceRef {
    #[serde(default)]
    pub name: String,
}

impl ChatEvent {
    pub fn command_id(&self) -> i64 {
        self.message
            .as_ref()
            .and_then(|message| message.slash_command.as_ref())
            .map(|command| command.command_id)
            .unwrap_or(0)
    }

    pub fn user_name(&self) -> &str {
        self.user.as_ref().map(|user| user.name.as_str()).unwrap_or("")
    }

    pub fn space_name(&self) -> &str {
        self.space.as_ref().map(|space| space.name.as_str()).unwrap_or("")
    }

    pub fn has_slash_command(&self) -> bool {
        self.message.as_ref().is_some_and(|message| message.slash_command.is_some())
    }
}

#[derive(Debug)]
pub enum DecodedPush {
    Event(ChatEvent),
    /// The envelope or its `data` field was absent. Not an error: the
    /// caller logs it and stops.
    NoOp,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("push envelope is not valid JSON: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),
    #[error("push payload is not valid base64: {0}")]
    Decode(#[source] base64::DecodeError),
    #[error("decoded payload is not a valid chat event: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Decodes a raw push body into a chat event.
///
/// A missing `message` or `message.data` yields [`DecodedPush::NoOp`]
/// rather than an error; everything else that fails to decode is
/// reported so the webhook boundary can log it and still acknowledge
/// the delivery.
pub fn decode(raw: &[u8]) -> Result<DecodedPush, EnvelopeError> {
    let envelope: PushEnvelope =
        serde_json::from_slice(raw).map_err(EnvelopeError::MalformedEnvelope)?;

    let Some(data) = envelope.message.as_ref().and_then(|message| message.data.as_deref()) else {
        return Ok(DecodedPush::NoOp);
    };

    let payload = BASE64.decode(data).map_err(EnvelopeError::Decode)?;
    let event = serde_json::from_slice(&payload).map_err(EnvelopeError::Parse)?;
    Ok(DecodedPush::Event(event))
}

/// Chat encodes `commandId` as a JSON string on the wire; accept both
/// encodings and fall back to 0 for anything unparseable.
fn lenient_command_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(number) => number.as_i64().unwrap_or(0),
        serde_json::Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
