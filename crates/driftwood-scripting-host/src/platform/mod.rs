//! Outbound access to the messaging platform
//!
//! Bindings talk to the platform only through [`PlatformSession`]. Every
//! method is blocking: bindings run on the script worker thread, which is not
//! a runtime thread.

mod discord;

pub use self::discord::{interaction_from_serenity, SerenitySession};

use crate::marshal::{CommandSpec, MessageSpec};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlatformError {
    #[error("platform session not available")]
    Unavailable,

    #[error("invalid id '{0}'")]
    InvalidId(String),

    #[error("{operation} request failed: {reason}")]
    Request { operation: String, reason: String },
}

impl PlatformError {
    pub fn request(operation: impl Into<String>, reason: impl ToString) -> Self {
        PlatformError::Request {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

/// Identifies an interaction that is awaiting a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionHandle {
    pub id: String,
    pub token: String,
}

/// A message the platform accepted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageRef {
    pub id: String,
    pub channel_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub guild_id: Option<String>,
    pub topic: Option<String>,
}

/// Connected platform session handed to bindings on readiness
pub trait PlatformSession: Send + Sync {
    fn create_command(&self, command: &CommandSpec) -> Result<(), PlatformError>;

    fn send_message(&self, channel_id: &str, message: &MessageSpec)
        -> Result<MessageRef, PlatformError>;

    fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: &MessageSpec,
    ) -> Result<MessageRef, PlatformError>;

    fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), PlatformError>;

    fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str)
        -> Result<(), PlatformError>;

    fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), PlatformError>;

    fn get_channel(&self, channel_id: &str) -> Result<ChannelInfo, PlatformError>;

    fn respond_to_interaction(
        &self,
        interaction: &InteractionHandle,
        message: &MessageSpec,
    ) -> Result<(), PlatformError>;
}

/// Parse a snowflake id given as a string
pub fn parse_id(id: &str) -> Result<u64, PlatformError> {
    match id.trim().parse::<u64>() {
        Ok(n) if n != 0 => Ok(n),
        _ => Err(PlatformError::InvalidId(id.to_string())),
    }
}
