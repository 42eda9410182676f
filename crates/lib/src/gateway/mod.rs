//! Gateway: the HTTP surface of the relay.
//!
//! `GET /webhook` answers the subscription handshake; `POST /webhook` accepts
//! event deliveries and acknowledges them before any reply is sent.

mod server;
mod verify;

pub use server::{router, run_gateway, GatewayState, EVENT_RECEIVED, GREETING};
pub use verify::{verify_subscription, VerifyParams, SUBSCRIBE_MODE};
