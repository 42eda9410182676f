//! Outbound reply payloads and the pure functions that build them from inbound events.

use crate::messenger::event::{IncomingMessage, Postback};
use serde::Serialize;

/// Text that triggers a task lookup (compared after uppercasing the message).
pub const TASKS_COMMAND: &str = "TASKS";

pub const THANKS_TEXT: &str = "Thanks!";
pub const RETRY_IMAGE_TEXT: &str = "Oops, try sending another image.";
pub const LOOKUP_FAILED_TEXT: &str =
    "Sorry, I couldn't fetch your tasks right now. Please try again later.";

/// Message body accepted by the Send API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundReply {
    Text { text: String },
    Attachment { attachment: TemplateAttachment },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: TemplatePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplatePayload {
    pub template_type: String,
    pub elements: Vec<Element>,
}

/// Generic template element: a card we build, or a record passed through from the task service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Element {
    Card(Card),
    Opaque(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub title: String,
    pub subtitle: String,
    pub image_url: String,
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub payload: String,
}

impl OutboundReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Generic template carrying the given elements.
    pub fn generic(elements: Vec<Element>) -> Self {
        Self::Attachment {
            attachment: TemplateAttachment {
                kind: "template".to_string(),
                payload: TemplatePayload {
                    template_type: "generic".to_string(),
                    elements,
                },
            },
        }
    }
}

impl Button {
    pub fn postback(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: "postback".to_string(),
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// What the message path should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageReply {
    /// User asked for their tasks; the caller must consult the task service.
    LookupTasks,
    Ready(OutboundReply),
    /// Nothing to answer; no send is attempted.
    Nothing,
}

/// Build the reply for a plain message.
///
/// Text wins over attachments; empty text counts as absent. Only the first
/// attachment is looked at, and it must carry a URL.
pub fn build_message_reply(message: &IncomingMessage) -> MessageReply {
    if let Some(text) = message.text.as_deref().filter(|t| !t.is_empty()) {
        if text.to_uppercase() == TASKS_COMMAND {
            return MessageReply::LookupTasks;
        }
        return MessageReply::Ready(OutboundReply::text(format!(
            "You sent the message: \"{}\". Now send me an image!",
            text
        )));
    }
    let Some(first) = message.attachments.first() else {
        return MessageReply::Nothing;
    };
    match first.payload.as_ref().and_then(|p| p.url.as_deref()) {
        Some(url) => MessageReply::Ready(image_confirmation(url)),
        None => {
            log::debug!("first attachment has no payload url; nothing to confirm");
            MessageReply::Nothing
        }
    }
}

/// "Is this the right picture?" card with yes/no postback buttons.
pub fn image_confirmation(image_url: &str) -> OutboundReply {
    OutboundReply::generic(vec![Element::Card(Card {
        title: "Is this the right picture?".to_string(),
        subtitle: "Tap a button to answer.".to_string(),
        image_url: image_url.to_string(),
        buttons: vec![Button::postback("Yes!", "yes"), Button::postback("No!", "no")],
    })])
}

/// Build the reply for a postback. Payloads other than "yes"/"no" get no reply.
pub fn build_postback_reply(postback: &Postback) -> Option<OutboundReply> {
    match postback.payload.as_deref() {
        Some("yes") => Some(OutboundReply::text(THANKS_TEXT)),
        Some("no") => Some(OutboundReply::text(RETRY_IMAGE_TEXT)),
        _ => None,
    }
}

/// Wrap task records from the task service as generic template elements, unchanged.
pub fn tasks_reply(tasks: Vec<serde_json::Value>) -> OutboundReply {
    OutboundReply::generic(tasks.into_iter().map(Element::Opaque).collect())
}

/// Sent instead of the task list when the lookup fails.
pub fn lookup_failed_reply() -> OutboundReply {
    OutboundReply::text(LOOKUP_FAILED_TEXT)
}
