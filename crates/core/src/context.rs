//! Per-user conversational context.
//!
//! A `UserContext` carries a bounded chat history: appends evict the oldest
//! message first once the cap is reached. Truncation happens only here, on
//! append to the persisted context — never inside a history merge, which
//! always produces the full deduplicated view.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::TimestampedMessage;

/// A user's identity and bounded chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    /// Unique identifier for the user
    pub user_id: String,

    /// Human-readable name for the user
    pub user_name: String,

    /// Chat history, oldest first, capped by the context store
    pub history: Vec<TimestampedMessage>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            history: Vec::new(),
        }
    }

    /// Append a message, evicting the oldest entries so that at most
    /// `limit` messages remain.
    pub fn push_capped(&mut self, message: TimestampedMessage, limit: usize) {
        self.history.push(message);
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }
}

/// Durable storage contract for user contexts.
///
/// There is no separate create step: `append` upserts the context row and
/// writes the messages in one transaction. A turn that fails before its
/// append therefore leaves no trace of a new user behind.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Look up a user's context. `None` if the user has never been seen.
    async fn resolve(&self, user_id: &str) -> std::result::Result<Option<UserContext>, StoreError>;

    /// Append messages to a user's persisted history, applying the FIFO cap.
    /// Creates the context row if the user is new. Row creation and all
    /// message writes commit in one transaction.
    async fn append(
        &self,
        user_id: &str,
        user_name: &str,
        messages: &[TimestampedMessage],
    ) -> std::result::Result<(), StoreError>;
}
