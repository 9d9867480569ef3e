//! # Bruin Core
//!
//! Domain types, traits, and error definitions for the Bruin scheduling
//! assistant. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod alarm;
pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod request;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use alarm::{Alarm, AlarmStore};
pub use context::{ContextStore, UserContext};
pub use error::{Error, Result};
pub use event::{
    event_queue, EventContext, EventHandler, EventQueue, EventQueueReceiver, EventResponse,
    SystemEvent, UserEvent,
};
pub use message::{MessageToolCall, Role, TimestampedMessage};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use request::RequestContext;
pub use tool::{Tool, ToolCall, ToolRegistry};
