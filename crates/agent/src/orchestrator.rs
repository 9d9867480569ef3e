//! Turn orchestration.
//!
//! The orchestrator owns one turn end to end: assemble the prompt from the
//! persona, the caller's identity, and the merged history; run the provider
//! tool loop; persist the user/assistant exchange. System events (fired
//! alarms) skip history and persistence entirely — their only lasting effect
//! happens through tools.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use bruin_config::AppConfig;
use bruin_core::context::ContextStore;
use bruin_core::error::Error;
use bruin_core::event::{EventHandler, EventResponse, SystemEvent, UserEvent};
use bruin_core::message::{Role, TimestampedMessage};
use bruin_core::provider::{Provider, ProviderRequest, Usage};
use bruin_core::request::RequestContext;
use bruin_core::tool::{ToolCall, ToolRegistry};

use crate::merge::merge_histories;

/// The turn orchestrator. Implements `EventHandler` for both user turns and
/// system events.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    contexts: Arc<dyn ContextStore>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: usize,
    persona: String,
    system_event_preamble: String,
}

impl Orchestrator {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        contexts: Arc<dyn ContextStore>,
    ) -> Self {
        Self {
            provider,
            tools,
            contexts,
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            max_iterations: config.agent.max_tool_iterations,
            persona: config.prompts.persona.clone(),
            system_event_preamble: config.prompts.system_event.clone(),
        }
    }

    /// Run the provider round-trip loop until the model produces a message
    /// with no tool calls, or the iteration cap is hit.
    async fn run_turn(
        &self,
        ctx: &RequestContext,
        mut messages: Vec<TimestampedMessage>,
    ) -> Result<(TimestampedMessage, Option<Usage>), Error> {
        let mut usage: Option<Usage> = None;

        for iteration in 0..self.max_iterations {
            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: self.tools.definitions(),
            };

            let response = self.provider.complete(request).await?;
            usage = response.usage.or(usage);

            if response.message.tool_calls.is_empty() {
                debug!(
                    request_id = %ctx.request_id,
                    iterations = iteration + 1,
                    "turn complete"
                );
                return Ok((response.message, usage));
            }

            let assistant = response.message.clone();
            messages.push(assistant.clone());

            for call in &assistant.tool_calls {
                let result = self.execute_tool(ctx, &call.id, &call.name, &call.arguments).await;
                messages.push(TimestampedMessage::tool_result(call.id.clone(), result));
            }
        }

        Err(Error::Internal(format!(
            "tool loop exceeded {} iterations without a final response",
            self.max_iterations
        )))
    }

    /// Execute one tool call, always yielding a string for the model. Domain
    /// failures come back as readable text; only the outcome is logged here.
    async fn execute_tool(
        &self,
        ctx: &RequestContext,
        call_id: &str,
        name: &str,
        raw_arguments: &str,
    ) -> String {
        let arguments: serde_json::Value = match serde_json::from_str(raw_arguments) {
            Ok(v) => v,
            Err(e) => {
                warn!(request_id = %ctx.request_id, tool = name, "unparseable tool arguments: {e}");
                return format!("Invalid tool arguments: {e}");
            }
        };

        let call = ToolCall {
            id: call_id.to_string(),
            name: name.to_string(),
            arguments,
        };

        match self.tools.execute(&call).await {
            Ok(result) => {
                debug!(request_id = %ctx.request_id, tool = name, "tool succeeded");
                result
            }
            Err(e) => {
                warn!(request_id = %ctx.request_id, tool = name, "tool failed: {e}");
                e.to_string()
            }
        }
    }

    fn persona_message(&self) -> TimestampedMessage {
        TimestampedMessage::system(self.persona.clone())
    }

    fn clock_message() -> TimestampedMessage {
        TimestampedMessage::system(format!(
            "The current UTC time is {}.",
            Utc::now().to_rfc3339()
        ))
    }
}

#[async_trait]
impl EventHandler for Orchestrator {
    async fn handle_user_event(
        &self,
        ctx: &RequestContext,
        event: UserEvent,
    ) -> Result<EventResponse, Error> {
        info!(
            request_id = %ctx.request_id,
            user_id = %event.user_id,
            channel = %event.channel_id,
            "handling user event"
        );

        // Read-only until the turn succeeds: an unknown user's context row is
        // created by the append below, in the same transaction as the
        // history write, so a failed turn leaves no partial state behind.
        let persisted = self
            .contexts
            .resolve(&event.user_id)
            .await?
            .map(|c| c.history)
            .unwrap_or_default();

        // Immediate channel history first: on a duplicate id, the channel's
        // copy wins.
        let history = merge_histories(&[&event.immediate_history, &persisted])?;

        let mut messages = vec![
            self.persona_message(),
            TimestampedMessage::system(format!(
                "You are talking to {} (id {}) in channel {}.",
                event.user_name, event.user_id, event.channel_id
            )),
            Self::clock_message(),
        ];
        messages.extend(history);
        messages.push(event.message.clone());

        let (reply, usage) = self.run_turn(ctx, messages).await?;

        // Persist only the user/assistant exchange; system and tool messages
        // stay inside the turn.
        debug_assert_eq!(reply.role, Role::Ai);
        self.contexts
            .append(
                &event.user_id,
                &event.user_name,
                &[event.message, reply.clone()],
            )
            .await?;

        Ok(EventResponse {
            message: reply,
            usage,
        })
    }

    async fn handle_system_event(
        &self,
        ctx: &RequestContext,
        event: SystemEvent,
    ) -> Result<EventResponse, Error> {
        info!(
            request_id = %ctx.request_id,
            source = %event.event_source,
            "handling system event"
        );

        let messages = vec![
            self.persona_message(),
            TimestampedMessage::system(self.system_event_preamble.clone()),
            Self::clock_message(),
            event.message,
        ];

        let (reply, usage) = self.run_turn(ctx, messages).await?;

        Ok(EventResponse {
            message: reply,
            usage,
        })
    }
}
