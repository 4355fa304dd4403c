use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User identity as assigned by the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination channel a user routed their alerts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef(pub u64);

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One outbound message. Owned by the dispatcher queue from enqueue until
/// delivered or dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub recipient: UserId,
    pub channel: Option<ChannelRef>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationMessage {
    pub fn new(recipient: UserId, channel: Option<ChannelRef>, text: impl Into<String>) -> Self {
        Self {
            recipient,
            channel,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}
