// Turn orchestrator
//
// Drives one conversation turn as an explicit state machine:
//
//   AwaitingModel --(text)--------> Finished(Completed)
//   AwaitingModel --(tool calls)--> ExecutingTools --> AwaitingModel
//   AwaitingModel --(cycle cap)---> Finished(Failed)
//
// Suspension happens only at the model call and at each tool execution. Tool
// calls in a batch run sequentially in the order the model emitted them.
// Cancellation is observed at every suspension point: a tool that already
// started runs to completion, but no further cycle starts and no further
// event is emitted.

pub mod events;

pub use events::{chunk_text, EventEmitter, TurnEvent};

use crate::config::{ModelConfig, TurnConfig};
use crate::conversation::{Message, ToolCall};
use crate::errors::TurnError;
use crate::logging::{TurnLogger, TurnRecord};
use crate::providers::{LlmProvider, ModelReply, ProviderRequest};
use crate::session::SessionStore;
use crate::tools::executor::ToolExecutor;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Buffered events per turn before the orchestrator waits on the reader
const EVENT_BUFFER: usize = 64;

/// Input for one turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: String,
    /// Prior conversation, oldest first
    pub history: Vec<Message>,
    pub user_message: String,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
            user_message: user_message.into(),
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnStatus {
    Completed,
    Failed(TurnError),
    /// Stopped by the caller; no terminal event was emitted
    Cancelled,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Completed => "completed",
            TurnStatus::Failed(_) => "failed",
            TurnStatus::Cancelled => "cancelled",
        }
    }
}

/// Everything a finished turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// History including every message this turn appended
    pub history: Vec<Message>,
    pub status: TurnStatus,
    /// Model calls made
    pub cycles: usize,
    pub final_answer: Option<String>,
    /// Tool names in call order
    pub tools_used: Vec<String>,
}

/// A turn running on its own task
pub struct TurnHandle {
    pub events: mpsc::Receiver<TurnEvent>,
    pub outcome: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    /// Drain every event, then wait for the outcome
    pub async fn collect(mut self) -> Result<(Vec<TurnEvent>, TurnOutcome)> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let outcome = self.outcome.await.context("Turn task failed")?;
        Ok((events, outcome))
    }
}

#[derive(Debug)]
enum TurnState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Finished(TurnStatus),
}

/// Mutable state of the turn in progress
struct TurnContext {
    session_id: String,
    history: Vec<Message>,
    cycles: usize,
    final_answer: Option<String>,
    tools_used: Vec<String>,
}

pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    executor: Arc<ToolExecutor>,
    store: Option<Arc<dyn SessionStore>>,
    turn_log: Option<Arc<TurnLogger>>,
    config: TurnConfig,
    model: String,
    temperature: Option<f32>,
    max_tokens: u32,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        executor: Arc<ToolExecutor>,
        config: TurnConfig,
    ) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            executor,
            store: None,
            turn_log: None,
            config,
            model,
            temperature: None,
            max_tokens: crate::config::constants::DEFAULT_MAX_TOKENS,
        }
    }

    /// Persist every appended message to `store`
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_turn_log(mut self, logger: Arc<TurnLogger>) -> Self {
        self.turn_log = Some(logger);
        self
    }

    /// Model name and sampling settings
    pub fn with_model_config(mut self, model: &ModelConfig) -> Self {
        self.model = model.model.clone();
        self.temperature = Some(model.temperature);
        self.max_tokens = model.max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Run a turn on a new task. Events arrive on the handle's receiver; the
    /// channel closes once the turn is over.
    pub fn start_turn(self: &Arc<Self>, request: TurnRequest, cancel: CancellationToken) -> TurnHandle {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = Arc::clone(self);
        let span = tracing::info_span!("turn", session = %request.session_id);

        let outcome = tokio::spawn(
            async move {
                let mut emitter = EventEmitter::new(tx, cancel.clone());
                this.run_turn(request, cancel, &mut emitter).await
            }
            .instrument(span),
        );

        TurnHandle {
            events: rx,
            outcome,
        }
    }

    /// Run a turn to completion on the current task
    #[instrument(skip_all, fields(session = %request.session_id))]
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
        emitter: &mut EventEmitter,
    ) -> TurnOutcome {
        let started = Instant::now();
        let TurnRequest {
            session_id,
            history,
            user_message,
        } = request;

        let mut turn = TurnContext {
            session_id,
            history,
            cycles: 0,
            final_answer: None,
            tools_used: Vec::new(),
        };

        info!("Turn started ({} prior messages)", turn.history.len());
        self.record(&mut turn, Message::user(user_message.clone()))
            .await;

        let mut state = TurnState::AwaitingModel;
        let status = loop {
            state = match state {
                TurnState::AwaitingModel => self.await_model(&mut turn, &cancel, emitter).await,
                TurnState::ExecutingTools(calls) => {
                    self.execute_tools(&mut turn, calls, &cancel, emitter).await
                }
                TurnState::Finished(status) => break status,
            };
        };

        match &status {
            TurnStatus::Completed => info!(
                "Turn completed after {} model call(s), {} tool call(s)",
                turn.cycles,
                turn.tools_used.len()
            ),
            TurnStatus::Failed(err) => warn!("Turn failed: {}", err),
            TurnStatus::Cancelled => info!("Turn cancelled after {} model call(s)", turn.cycles),
        }

        let outcome = TurnOutcome {
            history: turn.history,
            status,
            cycles: turn.cycles,
            final_answer: turn.final_answer,
            tools_used: turn.tools_used,
        };
        self.log_turn(&turn.session_id, &user_message, &outcome, started)
            .await;
        outcome
    }

    async fn await_model(
        &self,
        turn: &mut TurnContext,
        cancel: &CancellationToken,
        emitter: &mut EventEmitter,
    ) -> TurnState {
        if cancel.is_cancelled() || emitter.is_closed() {
            return TurnState::Finished(TurnStatus::Cancelled);
        }
        if turn.cycles >= self.config.max_cycles {
            let err = TurnError::CycleLimitExceeded {
                max_cycles: self.config.max_cycles,
            };
            emitter.error(err.to_string()).await;
            return TurnState::Finished(TurnStatus::Failed(err));
        }

        turn.cycles += 1;
        debug!("Model call {}/{}", turn.cycles, self.config.max_cycles);
        let request = self.build_request(&turn.history);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TurnState::Finished(TurnStatus::Cancelled),
            response = self.provider.send_message(&request) => response,
        };

        let reply = match response {
            Ok(response) => response.into_reply(),
            Err(e) => {
                error!("Model call failed: {:#}", e);
                let err = TurnError::ModelCall(format!("{:#}", e));
                emitter.error(err.to_string()).await;
                return TurnState::Finished(TurnStatus::Failed(err));
            }
        };

        match reply {
            ModelReply::Text(text) => {
                self.record(turn, Message::assistant(text.clone())).await;
                turn.final_answer = Some(text.clone());

                if !emitter.text(&text, self.config.chunk_words).await || !emitter.done().await {
                    return TurnState::Finished(TurnStatus::Cancelled);
                }
                TurnState::Finished(TurnStatus::Completed)
            }
            ModelReply::ToolCalls { content, calls } => {
                debug!(
                    "Model requested {} tool call(s): {:?}",
                    calls.len(),
                    calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
                );
                self.record(turn, Message::assistant_tool_calls(content, calls.clone()))
                    .await;
                TurnState::ExecutingTools(calls)
            }
        }
    }

    async fn execute_tools(
        &self,
        turn: &mut TurnContext,
        calls: Vec<ToolCall>,
        cancel: &CancellationToken,
        emitter: &mut EventEmitter,
    ) -> TurnState {
        for call in calls {
            if cancel.is_cancelled() || !emitter.tool_call(&call).await {
                return TurnState::Finished(TurnStatus::Cancelled);
            }

            // Not raced against cancellation: a started tool finishes
            let result = self.executor.execute(&call).await;
            turn.tools_used.push(call.name.clone());
            self.record(turn, result.to_message()).await;

            if cancel.is_cancelled() || !emitter.tool_result(&result).await {
                return TurnState::Finished(TurnStatus::Cancelled);
            }
        }
        TurnState::AwaitingModel
    }

    fn build_request(&self, history: &[Message]) -> ProviderRequest {
        let mut request = ProviderRequest::new(history.to_vec())
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
            .with_system(self.config.system_prompt.clone())
            .with_tools(self.executor.definitions());
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        request.sanitize_messages();
        request
    }

    /// Append to history and persist. Store failures don't end the turn.
    async fn record(&self, turn: &mut TurnContext, message: Message) {
        if let Some(store) = &self.store {
            if let Err(e) = store.append(&turn.session_id, &message).await {
                warn!("Failed to persist {} message: {:#}", message.role.as_str(), e);
            }
        }
        turn.history.push(message);
    }

    async fn log_turn(
        &self,
        session_id: &str,
        user_message: &str,
        outcome: &TurnOutcome,
        started: Instant,
    ) {
        let Some(logger) = &self.turn_log else {
            return;
        };

        let mut record = TurnRecord::new(session_id, user_message);
        record.final_answer = outcome.final_answer.clone();
        record.model = self.model.clone();
        record.tools_used = outcome.tools_used.clone();
        record.cycles = outcome.cycles;
        record.status = outcome.status.as_str().to_string();
        if let TurnStatus::Failed(err) = &outcome.status {
            record.error = Some(err.to_string());
        }
        record.duration_ms = started.elapsed().as_millis() as i64;

        if let Err(e) = logger.append(&record).await {
            warn!("Failed to write turn log: {:#}", e);
        }
    }
}
