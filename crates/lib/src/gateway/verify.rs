//! Webhook subscription handshake (`GET /webhook`).

use crate::error::RelayError;
use serde::Deserialize;

pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Query parameters the platform sends when subscribing the webhook.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Check the handshake against the configured token and return the challenge to echo.
///
/// Empty `hub.mode` or `hub.verify_token` count as missing. With no configured
/// token every handshake is a mismatch.
pub fn verify_subscription(
    params: &VerifyParams,
    expected_token: Option<&str>,
) -> Result<String, RelayError> {
    let mode = params.mode.as_deref().filter(|m| !m.is_empty());
    let token = params.verify_token.as_deref().filter(|t| !t.is_empty());
    let (Some(mode), Some(token)) = (mode, token) else {
        return Err(RelayError::MissingVerificationParams);
    };
    match expected_token {
        Some(expected) if mode == SUBSCRIBE_MODE && token == expected => {
            Ok(params.challenge.clone().unwrap_or_default())
        }
        _ => Err(RelayError::VerificationMismatch),
    }
}
