//! Inbound webhook payloads, validated at the boundary into typed events.
//!
//! The envelope keeps its entries as raw JSON so that one bad entry can be
//! skipped without rejecting the whole delivery.

use crate::error::RelayError;
use serde::Deserialize;

/// Object value sent for page subscriptions.
pub const PAGE_OBJECT: &str = "page";

/// Webhook POST body. Unknown fields are ignored.
#[derive(Debug, Default)]
pub struct InboundEnvelope {
    /// Subscription object; anything other than the string "page" is not ours.
    pub object: Option<serde_json::Value>,
    pub entry: Vec<serde_json::Value>,
}

impl InboundEnvelope {
    /// Read the envelope out of any JSON body. A body that is not an object has
    /// no `object` and is therefore not a page; a non-array `entry` counts as empty.
    pub fn from_json(body: serde_json::Value) -> Self {
        let serde_json::Value::Object(mut fields) = body else {
            return Self::default();
        };
        let object = fields.remove("object");
        let entry = match fields.remove("entry") {
            Some(serde_json::Value::Array(entries)) => entries,
            None => Vec::new(),
            Some(other) => {
                log::warn!("webhook entry is not a list ({}); treating as empty", other);
                Vec::new()
            }
        };
        Self { object, entry }
    }

    pub fn is_page(&self) -> bool {
        self.object.as_ref().and_then(|o| o.as_str()) == Some(PAGE_OBJECT)
    }
}

/// A free-text or attachment message from a user.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default)]
    pub url: Option<String>,
}

/// A button tap.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Postback {
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Message(IncomingMessage),
    Postback(Postback),
}

/// One messaging event: who sent it (PSID) and what it is.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagingEvent {
    pub sender_id: String,
    pub kind: EventKind,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    messaging: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawMessaging {
    sender: Option<RawSender>,
    #[serde(default)]
    message: Option<IncomingMessage>,
    #[serde(default)]
    postback: Option<Postback>,
}

#[derive(Debug, Deserialize)]
struct RawSender {
    id: Option<String>,
}

impl MessagingEvent {
    /// Extract the event carried by one webhook entry.
    ///
    /// Only `messaging[0]` is consulted. Returns `Ok(None)` when the event is
    /// neither a message nor a postback (e.g. delivery or read receipts). When
    /// both are present the message wins.
    pub fn from_entry(entry: &serde_json::Value) -> Result<Option<Self>, RelayError> {
        let raw: RawEntry = serde_json::from_value(entry.clone())
            .map_err(|e| RelayError::MalformedEvent(format!("entry: {}", e)))?;
        let first = raw
            .messaging
            .into_iter()
            .next()
            .ok_or_else(|| {
                RelayError::MalformedEvent("entry has no messaging[0]".to_string())
            })?;
        let messaging: RawMessaging = serde_json::from_value(first)
            .map_err(|e| RelayError::MalformedEvent(format!("messaging[0]: {}", e)))?;
        let sender_id = messaging
            .sender
            .and_then(|s| s.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                RelayError::MalformedEvent("messaging[0] has no sender.id".to_string())
            })?;

        let kind = match (messaging.message, messaging.postback) {
            (Some(message), _) => EventKind::Message(message),
            (None, Some(postback)) => EventKind::Postback(postback),
            (None, None) => return Ok(None),
        };
        Ok(Some(Self { sender_id, kind }))
    }
}
