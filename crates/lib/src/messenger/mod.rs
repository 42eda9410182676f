//! Messenger platform: inbound webhook events, reply payloads, and the Send API.
//!
//! Events are validated into typed values at the HTTP boundary; replies are
//! built by pure functions and delivered through a [`ReplySender`].

mod event;
mod reply;
mod send;

pub use event::{
    Attachment, AttachmentPayload, EventKind, InboundEnvelope, IncomingMessage, MessagingEvent,
    Postback, PAGE_OBJECT,
};
pub use reply::{
    build_message_reply, build_postback_reply, image_confirmation, lookup_failed_reply,
    tasks_reply, Button, Card, Element, MessageReply, OutboundReply, TemplateAttachment,
    TemplatePayload, LOOKUP_FAILED_TEXT, TASKS_COMMAND,
};
pub use send::{MessengerClient, Recipient, ReplySender, SendRequest};
