//! Per-event handling: build the reply for one messaging event and deliver it.

use crate::error::RelayError;
use crate::messenger::{
    build_message_reply, build_postback_reply, lookup_failed_reply, tasks_reply, EventKind,
    IncomingMessage, MessageReply, MessagingEvent, OutboundReply, Postback, ReplySender,
};
use crate::tasks::TaskSource;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of a handled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No reply was built, so nothing was sent.
    Skipped,
}

/// Routes events to the message or postback path and hands the reply to the sender.
#[derive(Clone)]
pub struct Dispatcher {
    tasks: Arc<dyn TaskSource>,
    sender: Arc<dyn ReplySender>,
}

impl Dispatcher {
    pub fn new(tasks: Arc<dyn TaskSource>, sender: Arc<dyn ReplySender>) -> Self {
        Self { tasks, sender }
    }

    /// Handle one event. Only delivery can fail; a failed task lookup is answered
    /// with a fallback text.
    pub async fn handle_event(&self, event: MessagingEvent) -> Result<Delivery, RelayError> {
        let reply = match &event.kind {
            EventKind::Message(message) => self.message_reply(message).await,
            EventKind::Postback(postback) => postback_reply(postback),
        };
        let Some(reply) = reply else {
            log::debug!("no reply built for {}, skipping send", event.sender_id);
            return Ok(Delivery::Skipped);
        };
        self.sender.send(&event.sender_id, &reply).await?;
        Ok(Delivery::Sent)
    }

    async fn message_reply(&self, message: &IncomingMessage) -> Option<OutboundReply> {
        match build_message_reply(message) {
            MessageReply::Ready(reply) => Some(reply),
            MessageReply::Nothing => None,
            MessageReply::LookupTasks => match self.tasks.fetch_tasks().await {
                Ok(tasks) => {
                    log::info!("task lookup returned {} task(s)", tasks.len());
                    Some(tasks_reply(tasks))
                }
                Err(e) => {
                    log::warn!("{}; replying with fallback text", e);
                    Some(lookup_failed_reply())
                }
            },
        }
    }
}

fn postback_reply(postback: &Postback) -> Option<OutboundReply> {
    let reply = build_postback_reply(postback);
    if reply.is_none() {
        log::debug!("unhandled postback payload: {:?}", postback.payload);
    }
    reply
}

/// Consume queued events until every sender is dropped. Each result is logged;
/// failures never stop the loop.
pub async fn run_processor(dispatcher: Dispatcher, mut inbound_rx: mpsc::Receiver<MessagingEvent>) {
    while let Some(event) = inbound_rx.recv().await {
        let sender_id = event.sender_id.clone();
        match dispatcher.handle_event(event).await {
            Ok(Delivery::Sent) => log::info!("message sent to {}", sender_id),
            Ok(Delivery::Skipped) => {}
            Err(e) => log::warn!("unable to send message to {}: {}", sender_id, e),
        }
    }
    log::debug!("event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, OutboundReply)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn send(&self, recipient_id: &str, reply: &OutboundReply) -> Result<(), RelayError> {
            if self.fail {
                return Err(RelayError::DeliveryFailed("send api: 500".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient_id.to_string(), reply.clone()));
            Ok(())
        }
    }

    struct FakeTasks {
        calls: AtomicUsize,
        result: Result<Vec<serde_json::Value>, ()>,
    }

    impl FakeTasks {
        fn ok(tasks: Vec<serde_json::Value>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(tasks),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(()),
            }
        }
    }

    #[async_trait]
    impl TaskSource for FakeTasks {
        async fn fetch_tasks(&self) -> Result<Vec<serde_json::Value>, RelayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map_err(|_| RelayError::LookupFailed("connection refused".to_string()))
        }
    }

    fn message(sender: &str, text: &str) -> MessagingEvent {
        MessagingEvent {
            sender_id: sender.to_string(),
            kind: EventKind::Message(IncomingMessage {
                text: Some(text.to_string()),
                attachments: vec![],
            }),
        }
    }

    fn postback(sender: &str, payload: &str) -> MessagingEvent {
        MessagingEvent {
            sender_id: sender.to_string(),
            kind: EventKind::Postback(Postback {
                payload: Some(payload.to_string()),
            }),
        }
    }

    fn setup(tasks: FakeTasks) -> (Dispatcher, Arc<FakeTasks>, Arc<RecordingSender>) {
        let tasks = Arc::new(tasks);
        let sender = Arc::new(RecordingSender::default());
        (Dispatcher::new(tasks.clone(), sender.clone()), tasks, sender)
    }

    #[tokio::test]
    async fn text_message_is_echoed_to_sender() {
        let (dispatcher, tasks, sender) = setup(FakeTasks::ok(vec![]));
        let outcome = dispatcher.handle_event(message("psid-1", "hello")).await.unwrap();
        assert_eq!(outcome, Delivery::Sent);
        assert_eq!(tasks.calls.load(Ordering::SeqCst), 0);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![(
                "psid-1".to_string(),
                OutboundReply::text("You sent the message: \"hello\". Now send me an image!")
            )]
        );
    }

    #[tokio::test]
    async fn tasks_text_consults_task_source() {
        let (dispatcher, tasks, sender) =
            setup(FakeTasks::ok(vec![json!({ "title": "Write report" })]));
        for text in ["tasks", "Tasks", "TASKS"] {
            dispatcher.handle_event(message("p", text)).await.unwrap();
        }
        assert_eq!(tasks.calls.load(Ordering::SeqCst), 3);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        let value = serde_json::to_value(&sent[0].1).unwrap();
        assert_eq!(
            value["attachment"]["payload"]["elements"],
            json!([{ "title": "Write report" }])
        );
    }

    #[tokio::test]
    async fn lookup_failure_sends_fallback_text() {
        let (dispatcher, tasks, sender) = setup(FakeTasks::failing());
        let outcome = dispatcher.handle_event(message("p", "tasks")).await.unwrap();
        assert_eq!(outcome, Delivery::Sent);
        assert_eq!(tasks.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sender.sent.lock().unwrap()[0].1, lookup_failed_reply());
    }

    #[tokio::test]
    async fn postbacks() {
        let (dispatcher, _, sender) = setup(FakeTasks::ok(vec![]));
        assert_eq!(dispatcher.handle_event(postback("p", "yes")).await.unwrap(), Delivery::Sent);
        assert_eq!(dispatcher.handle_event(postback("p", "no")).await.unwrap(), Delivery::Sent);
        assert_eq!(
            dispatcher.handle_event(postback("p", "maybe")).await.unwrap(),
            Delivery::Skipped
        );
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].1, OutboundReply::text("Thanks!"));
        assert_eq!(sent[1].1, OutboundReply::text("Oops, try sending another image."));
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test]
    async fn empty_message_skips_send() {
        let (dispatcher, _, sender) = setup(FakeTasks::ok(vec![]));
        let event = MessagingEvent {
            sender_id: "p".to_string(),
            kind: EventKind::Message(IncomingMessage::default()),
        };
        assert_eq!(dispatcher.handle_event(event).await.unwrap(), Delivery::Skipped);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_returned() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(Arc::new(FakeTasks::ok(vec![])), sender);
        let err = dispatcher.handle_event(postback("p", "yes")).await.unwrap_err();
        assert!(matches!(err, RelayError::DeliveryFailed(_)));
    }

    #[tokio::test]
    async fn processor_keeps_going_after_failures() {
        let (dispatcher, _, sender) = setup(FakeTasks::failing());
        let (tx, rx) = mpsc::channel(8);
        tx.send(postback("a", "unknown")).await.unwrap();
        tx.send(message("b", "tasks")).await.unwrap();
        tx.send(postback("c", "yes")).await.unwrap();
        drop(tx);
        run_processor(dispatcher, rx).await;
        let recipients: Vec<String> = sender
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect();
        assert_eq!(recipients, vec!["b".to_string(), "c".to_string()]);
    }
}
