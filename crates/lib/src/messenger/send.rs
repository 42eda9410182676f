//! Send API client: delivers replies to a PSID.

use crate::error::RelayError;
use crate::messenger::reply::OutboundReply;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Delivers a reply to a user.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send(&self, recipient_id: &str, reply: &OutboundReply) -> Result<(), RelayError>;
}

/// Wire body for `POST /me/messages`.
#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub recipient: Recipient<'a>,
    pub message: &'a OutboundReply,
}

#[derive(Debug, Serialize)]
pub struct Recipient<'a> {
    pub id: &'a str,
}

/// Messenger Send API client.
#[derive(Clone)]
pub struct MessengerClient {
    graph_base: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl MessengerClient {
    pub fn new(
        graph_base: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::DeliveryFailed(format!("building http client: {}", e)))?;
        Ok(Self {
            graph_base: graph_base.trim_end_matches('/').to_string(),
            access_token,
            client,
        })
    }

    /// False when no page access token was configured; every send will fail.
    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// POST the reply to the Send API, with the page access token as the
    /// `access_token` query parameter.
    pub async fn send_message(
        &self,
        recipient_id: &str,
        reply: &OutboundReply,
    ) -> Result<(), RelayError> {
        let token = self.access_token.as_deref().ok_or_else(|| {
            RelayError::DeliveryFailed("page access token not configured".to_string())
        })?;
        let url = format!("{}/me/messages", self.graph_base);
        let body = SendRequest {
            recipient: Recipient { id: recipient_id },
            message: reply,
        };
        let res = self
            .client
            .post(&url)
            .query(&[("access_token", token)])
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::DeliveryFailed(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(RelayError::DeliveryFailed(format!("send api: {} {}", status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplySender for MessengerClient {
    async fn send(&self, recipient_id: &str, reply: &OutboundReply) -> Result<(), RelayError> {
        MessengerClient::send_message(self, recipient_id, reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_request_wire_shape() {
        let reply = OutboundReply::text("Thanks!");
        let body = SendRequest {
            recipient: Recipient { id: "psid-9" },
            message: &reply,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "recipient": { "id": "psid-9" }, "message": { "text": "Thanks!" } })
        );
    }

    #[tokio::test]
    async fn missing_token_fails_without_network() {
        let client =
            MessengerClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        assert!(!client.has_token());
        let err = client
            .send_message("p", &OutboundReply::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::DeliveryFailed(ref m) if m.contains("access token")));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_delivery_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let client = MessengerClient::new(
            &format!("http://127.0.0.1:{}/", port),
            Some("token".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = client.send("p", &OutboundReply::text("hi")).await.unwrap_err();
        assert!(matches!(err, RelayError::DeliveryFailed(_)));
    }

    #[tokio::test]
    async fn error_status_is_delivery_failure() {
        use axum::{http::StatusCode, routing::post, Router};

        let app = Router::new().route(
            "/v2.6/me/messages",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = MessengerClient::new(
            &format!("http://{}/v2.6", addr),
            Some("token".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.send("p", &OutboundReply::text("hi")).await.unwrap_err();
        let RelayError::DeliveryFailed(message) = err else {
            panic!("expected delivery failure, got {}", err);
        };
        assert!(message.contains("500"), "{}", message);
        assert!(message.contains("upstream exploded"), "{}", message);
    }
}
