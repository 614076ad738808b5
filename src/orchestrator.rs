//! The tool-calling loop.
//!
//! Each query starts in `AwaitingModel`. A reply that asks for tools moves the
//! loop to `ExecutingTools`, which runs every requested call in order, appends
//! one tool message per call and goes back to `AwaitingModel`. Any other reply
//! is the answer and ends the query in `Done`.

use crate::backend::ToolBackend;
use crate::catalog::ToolCatalog;
use crate::conversation::ConversationState;
use crate::error::{ArgumentError, QueryError};
use crate::invoker::ToolInvoker;
use crate::model::{CompletionError, CompletionModel, CompletionRequest, ModelReply};
use crate::types::{Message, ToolCallRequest, ToolCallResult, ToolDescriptor};

use clap::ValueEnum;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_CYCLES: usize = 10;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a tool-using assistant. Answer the user's question accurately.\n\
1. Prefer tools: for anything involving live data (dates, weather), calculations (such as BMI) or other specialised functions, call the matching tool instead of guessing.\n\
2. Never fabricate facts, dates, weather or calculation results without a reliable source.\n\
3. Do not ask the user questions. Decide on your own with the information you have.\n\
4. If the user asks for several things, handle each of them. After every tool result, review the whole request and keep calling tools until every part is resolved.\n\
5. When all tool calls are done, combine the results into one clear and complete answer.";

/// When the tool list is (re)read from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CatalogRefresh {
    /// Once at the start of every query.
    #[default]
    PerQuery,
    /// Before every model round trip.
    PerCycle,
    /// Once for the whole session.
    PerSession,
}

/// What to do when a query reaches `max_cycles` model round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CycleLimitPolicy {
    /// Withhold the tools on the last round trip so the model has to answer.
    #[default]
    ForceAnswer,
    /// Fail the query if the model still wants tools.
    Abort,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub system_prompt: Option<String>,
    /// `None` leaves the loop unbounded.
    pub max_cycles: Option<usize>,
    pub on_cycle_limit: CycleLimitPolicy,
    pub catalog_refresh: CatalogRefresh,
    /// Deadline for every catalog fetch, tool call and completion.
    pub call_timeout: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_cycles: Some(DEFAULT_MAX_CYCLES),
            on_cycle_limit: CycleLimitPolicy::default(),
            catalog_refresh: CatalogRefresh::default(),
            call_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub answer: String,
    /// Model round trips it took.
    pub cycles: usize,
    /// Every message produced for this query, starting with the user's.
    pub transcript: Vec<Message>,
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCallRequest>),
    Done(String),
}

pub struct OrchestrationLoop<M> {
    model: M,
    catalog: ToolCatalog,
    invoker: ToolInvoker,
    config: LoopConfig,
    session_tools: Option<Vec<ToolDescriptor>>,
}

impl<M: CompletionModel> OrchestrationLoop<M> {
    pub fn new(model: M, backend: Arc<dyn ToolBackend>, config: LoopConfig) -> Self {
        let catalog = ToolCatalog::new(backend.clone()).with_timeout(config.call_timeout);
        let invoker = ToolInvoker::new(backend).with_timeout(config.call_timeout);
        Self {
            model,
            catalog,
            invoker,
            config,
            session_tools: None,
        }
    }

    /// The tools the next request would offer, honoring the refresh policy.
    pub async fn tools(&mut self) -> Result<Vec<ToolDescriptor>, QueryError> {
        if self.config.catalog_refresh != CatalogRefresh::PerSession {
            return Ok(self.catalog.fetch().await?);
        }
        if let Some(tools) = &self.session_tools {
            return Ok(tools.clone());
        }
        let tools = self.catalog.fetch().await?;
        self.session_tools = Some(tools.clone());
        Ok(tools)
    }

    pub async fn process_query(
        &mut self,
        state: &mut ConversationState,
        query: &str,
    ) -> Result<QueryOutcome, QueryError> {
        let mut transcript = vec![Message::user(query)];
        let mut tools = self.tools().await?;
        let mut cycles = 0;
        let mut loop_state = LoopState::AwaitingModel;

        loop {
            loop_state = match loop_state {
                LoopState::AwaitingModel => {
                    cycles += 1;
                    if cycles > 1 && self.config.catalog_refresh == CatalogRefresh::PerCycle {
                        tools = self.tools().await?;
                    }

                    let last_cycle = self.config.max_cycles.is_some_and(|max| cycles >= max);
                    let offered = if last_cycle
                        && self.config.on_cycle_limit == CycleLimitPolicy::ForceAnswer
                    {
                        debug!(cycles, "last round trip, withholding tools");
                        vec![]
                    } else {
                        tools.clone()
                    };

                    let reply = self.ask_model(state, &transcript, offered).await?;
                    if reply.wants_tools() {
                        transcript.push(Message::assistant(
                            reply.content.clone(),
                            reply.tool_calls.clone(),
                        ));
                        if last_cycle {
                            return Err(QueryError::CycleLimitExceeded {
                                limit: cycles,
                                partial: last_assistant_text(&transcript),
                            });
                        }
                        info!(cycles, calls = reply.tool_calls.len(), "model requested tools");
                        LoopState::ExecutingTools(reply.tool_calls)
                    } else {
                        transcript.push(Message::assistant(reply.content.clone(), vec![]));
                        LoopState::Done(reply.content.unwrap_or_default())
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    for call in calls {
                        let result = self.run_tool_call(&call).await;
                        transcript.push(Message::tool(call.id, result));
                    }
                    LoopState::AwaitingModel
                }
                LoopState::Done(answer) => {
                    info!(cycles, "query answered");
                    state.record_exchange(query, &answer);
                    return Ok(QueryOutcome {
                        answer,
                        cycles,
                        transcript,
                    });
                }
            };
        }
    }

    async fn ask_model(
        &self,
        state: &ConversationState,
        transcript: &[Message],
        tools: Vec<ToolDescriptor>,
    ) -> Result<ModelReply, CompletionError> {
        let messages = self
            .config
            .system_prompt
            .iter()
            .map(Message::system)
            .chain(state.messages().iter().cloned())
            .chain(transcript.iter().cloned())
            .collect();
        let request = CompletionRequest { messages, tools };

        match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, self.model.complete(request))
                .await
                .map_err(|_| CompletionError::Timeout(limit))?,
            None => self.model.complete(request).await,
        }
    }

    async fn run_tool_call(&self, call: &ToolCallRequest) -> ToolCallResult {
        match decode_arguments(call) {
            Ok(arguments) => self.invoker.invoke(&call.name, arguments).await,
            Err(err) => {
                warn!(tool = %call.name, arguments = %call.arguments, "{err}");
                ToolCallResult::Failure(err.to_string())
            }
        }
    }
}

/// Empty or `null` arguments mean "no arguments".
fn decode_arguments(call: &ToolCallRequest) -> Result<Value, ArgumentError> {
    if call.arguments.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let value: Value =
        serde_json::from_str(&call.arguments).map_err(|source| ArgumentError::Decode {
            name: call.name.clone(),
            source,
        })?;
    let kind = match value {
        Value::Object(_) => return Ok(value),
        Value::Null => return Ok(Value::Object(Map::new())),
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
    };
    Err(ArgumentError::NotAnObject {
        name: call.name.clone(),
        kind,
    })
}

fn last_assistant_text(transcript: &[Message]) -> Option<String> {
    transcript
        .iter()
        .rev()
        .filter(|message| matches!(message, Message::Assistant { .. }))
        .find_map(|message| message.content().filter(|text| !text.is_empty()))
        .map(str::to_string)
}
