//! Per-request context, passed explicitly through the call chain.
//!
//! Every unit of work (one message turn, one processed event) gets a fresh
//! `RequestContext` at its entry point. The request id travels as an explicit
//! argument and is attached to tracing fields — there is no process-wide
//! mutable request state.

use uuid::Uuid;

/// Identifier and metadata for one logical unit of work.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique id correlating all log lines of this unit of work
    pub request_id: String,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.request_id, b.request_id);
    }
}
