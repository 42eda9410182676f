//! TaskMan core library: a Messenger webhook relay that answers messages and
//! postbacks, optionally listing tasks from a remote task service.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod init;
pub mod messenger;
pub mod tasks;
