//! Inbound message validation.
//!
//! Messages are measured in whitespace-delimited tokens. A message at or
//! under the limit passes through byte-for-byte unchanged; an over-long one
//! is truncated to the first `max_tokens` tokens, rejoined with single
//! spaces.

use tracing::debug;

/// Validates and bounds inbound user messages.
#[derive(Debug, Clone)]
pub struct MessageValidator {
    max_tokens: usize,
}

impl MessageValidator {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    /// Apply the token cap to a message.
    pub fn validate(&self, message: &str) -> String {
        let tokens: Vec<&str> = message.split_whitespace().collect();
        if tokens.len() <= self.max_tokens {
            return message.to_string();
        }

        debug!(
            tokens = tokens.len(),
            max = self.max_tokens,
            "truncating over-long message"
        );
        tokens[..self.max_tokens].join(" ")
    }
}
