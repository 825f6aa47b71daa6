use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::client::ClientInner;
use crate::errors::{ClientError, TurnFailure, turn_failure_from_provider_error};
use crate::message::ChatMessage;
use crate::model::{ModelRef, ProviderId, TurnOptions};
use crate::provider::{ProviderAdapter, ProviderEvent, ProviderRequest};
use crate::stream::{StreamEvent, TurnOutcome, TurnStatus};

/// Handle used to request cancellation of a streaming turn.
#[derive(Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Requests cancellation.
    ///
    /// Idempotent: repeated calls, or calls after the turn already reached a
    /// terminal state, are no-ops. Cancellation becomes visible as a terminal
    /// `StreamEvent::Cancelled`.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Releases a conversation's per-model streaming slot when the turn ends.
pub(crate) struct ActiveTurnGuard {
    active: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl ActiveTurnGuard {
    pub(crate) fn acquire(
        active: Arc<Mutex<HashSet<String>>>,
        key: String,
    ) -> Result<Self, ClientError> {
        let mut set = active
            .lock()
            .map_err(|_| ClientError::protocol_msg("active-turn registry poisoned"))?;
        if !set.insert(key.clone()) {
            return Err(ClientError::Validation(format!(
                "model {key} already has a streaming turn in this conversation"
            )));
        }
        drop(set);
        Ok(Self { active, key })
    }
}

impl Drop for ActiveTurnGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.active.lock() {
            set.remove(&self.key);
        }
    }
}

/// Builder for configuring and starting a single streaming turn.
///
/// This is the main user-facing API for providing the prompt, history, and
/// runtime options before either streaming events or collecting the final
/// outcome.
pub struct TurnBuilder {
    client: Arc<ClientInner>,
    conversation_id: uuid::Uuid,
    _conversation_name: String,
    active_models: Arc<Mutex<HashSet<String>>>,
    model: ModelRef,
    system_prompt: Option<String>,
    messages: Vec<ChatMessage>,
    options: TurnOptions,
    vendor_options: HashMap<ProviderId, serde_json::Value>,
}

impl TurnBuilder {
    pub(crate) fn new(
        client: Arc<ClientInner>,
        conversation_id: uuid::Uuid,
        conversation_name: String,
        active_models: Arc<Mutex<HashSet<String>>>,
        model: ModelRef,
    ) -> Self {
        Self {
            client,
            conversation_id,
            _conversation_name: conversation_name,
            active_models,
            model,
            system_prompt: None,
            messages: Vec::new(),
            options: TurnOptions::default(),
            vendor_options: HashMap::new(),
        }
    }

    /// Sets the system prompt for the turn.
    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = Some(text.into());
        self
    }

    /// Appends a user message.
    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(text));
        self
    }

    /// Appends an arbitrary message (for replaying assistant history).
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Replaces all messages with the provided history.
    pub fn history(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Sets the sampling temperature sent to the endpoint.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    /// Sets the completion token cap sent to the endpoint.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    /// Sets an optional overall request timeout.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Arms the no-data watchdog: the turn fails with a transport error when
    /// no provider event arrives within the window.
    pub fn idle_timeout(mut self, window: std::time::Duration) -> Self {
        self.options.idle_timeout = Some(window);
        self
    }

    /// Sets the bounded stream buffer size used between the turn task and
    /// the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    pub(crate) fn set_vendor_options_json(
        mut self,
        provider: ProviderId,
        value: serde_json::Value,
    ) -> Self {
        self.vendor_options.insert(provider, value);
        self
    }

    #[cfg(test)]
    pub(crate) fn vendor_options_value(&self, provider: &ProviderId) -> Option<&serde_json::Value> {
        self.vendor_options.get(provider)
    }

    /// Validates the builder state and starts a streaming turn.
    ///
    /// The returned `TurnStream` yields normalized events (`TurnStarted`,
    /// `ContentDelta`, and exactly one terminal
    /// `Completed`/`Cancelled`/`Error` event).
    pub async fn start_stream(self) -> Result<TurnStream, ClientError> {
        let client = self.client.clone();
        let active_models = self.active_models.clone();
        let request = self.validate_and_build_request()?;
        let provider = client
            .provider(&request.model.provider)
            .ok_or_else(|| ClientError::ProviderNotFound {
                provider: request.model.provider.clone(),
            })?;
        let guard = ActiveTurnGuard::acquire(active_models, request.model.slot_key())?;

        let (tx, rx) = mpsc::channel(request.options.stream_buffer_capacity);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let cancel_handle = CancelHandle { tx: cancel_tx };
        let turn_id = request.turn_id;
        let conversation_id = request.conversation_id;
        let model = request.model.clone();
        tokio::spawn(turn_task(
            provider, request, tx, outcome_tx, cancel_rx, guard,
        ));

        Ok(TurnStream {
            turn_id,
            conversation_id,
            model,
            status: TurnStatus::Idle,
            rx,
            outcome_rx,
            cancel_handle,
            saw_terminal: false,
        })
    }

    /// Runs to a terminal state and returns the final outcome.
    ///
    /// All three terminal states (`Completed`, `Cancelled`, `Error`) are
    /// reported through the returned `TurnOutcome`, never through `Err`.
    pub async fn collect_outcome(self) -> Result<TurnOutcome, ClientError> {
        let stream = self.start_stream().await?;
        stream.finish().await
    }

    /// Runs to completion and returns the full transcript, converting
    /// cancellation and failure into errors.
    pub async fn collect_text(self) -> Result<String, ClientError> {
        let outcome = self.collect_outcome().await?;
        match outcome.status {
            TurnStatus::Completed => Ok(outcome.content),
            TurnStatus::Cancelled => Err(ClientError::Cancelled),
            _ => Err(ClientError::TurnFailed(outcome.failure.unwrap_or(
                TurnFailure::Protocol {
                    message: "turn ended in error without failure detail".into(),
                },
            ))),
        }
    }

    fn validate_and_build_request(self) -> Result<ProviderRequest, ClientError> {
        if self.model.provider.as_str().trim().is_empty() {
            return Err(ClientError::Validation(
                "model provider must not be empty".into(),
            ));
        }
        if self.model.model.trim().is_empty() {
            return Err(ClientError::Validation("model must not be empty".into()));
        }
        if self.options.stream_buffer_capacity == 0 {
            return Err(ClientError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        if let Some(temperature) = self.options.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ClientError::Validation(
                "temperature must be within 0.0..=2.0".into(),
            ));
        }
        if self.messages.is_empty() {
            return Err(ClientError::Validation(
                "at least one message is required".into(),
            ));
        }
        for message in &self.messages {
            if message.content.trim().is_empty() {
                return Err(ClientError::Validation(
                    "message content must not be empty".into(),
                ));
            }
        }

        Ok(ProviderRequest {
            turn_id: uuid::Uuid::new_v4(),
            conversation_id: self.conversation_id,
            model: self.model,
            system_prompt: self.system_prompt.filter(|s| !s.trim().is_empty()),
            messages: self.messages,
            options: self.options,
            vendor_options: self.vendor_options,
        })
    }
}

/// Streaming handle returned by `TurnBuilder::start_stream`.
///
/// Use `next_event()` to consume events as they arrive and `finish()` to
/// obtain the terminal outcome after the terminal event.
pub struct TurnStream {
    turn_id: uuid::Uuid,
    conversation_id: uuid::Uuid,
    model: ModelRef,
    status: TurnStatus,
    rx: mpsc::Receiver<StreamEvent>,
    outcome_rx: oneshot::Receiver<TurnOutcome>,
    cancel_handle: CancelHandle,
    saw_terminal: bool,
}

impl TurnStream {
    /// Returns the turn id for this stream.
    pub fn turn_id(&self) -> uuid::Uuid {
        self.turn_id
    }

    /// Returns the conversation id that owns this turn.
    pub fn conversation_id(&self) -> uuid::Uuid {
        self.conversation_id
    }

    /// Returns the model this turn runs against.
    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Returns the last observed lifecycle state.
    pub fn status(&self) -> TurnStatus {
        self.status
    }

    /// Returns a handle that can cancel the turn.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Waits for and returns the next normalized stream event.
    ///
    /// Returns `None` after the stream channel is closed.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let event = self.rx.recv().await;
        match &event {
            Some(StreamEvent::TurnStarted { .. }) => self.status = TurnStatus::Streaming,
            Some(StreamEvent::Completed { .. }) => {
                self.status = TurnStatus::Completed;
                self.saw_terminal = true;
            }
            Some(StreamEvent::Cancelled { .. }) => {
                self.status = TurnStatus::Cancelled;
                self.saw_terminal = true;
            }
            Some(StreamEvent::Error { .. }) => {
                self.status = TurnStatus::Error;
                self.saw_terminal = true;
            }
            _ => {}
        }
        event
    }

    /// Drains the stream (if needed) and returns the terminal outcome.
    ///
    /// Safe to call after consuming events manually with `next_event()`.
    pub async fn finish(mut self) -> Result<TurnOutcome, ClientError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(event) if event.is_terminal() => self.saw_terminal = true,
                Some(_) => {}
                None => break,
            }
        }

        self.outcome_rx.await.map_err(|_| {
            ClientError::protocol_msg(format!(
                "turn task ended without outcome (model={})",
                self.model
            ))
        })
    }
}

async fn turn_task(
    provider: Arc<dyn ProviderAdapter>,
    request: ProviderRequest,
    tx: mpsc::Sender<StreamEvent>,
    outcome_tx: oneshot::Sender<TurnOutcome>,
    mut cancel_rx: watch::Receiver<bool>,
    guard: ActiveTurnGuard,
) {
    let turn_id = request.turn_id;
    let conversation_id = request.conversation_id;
    let model = request.model.clone();
    let idle_timeout = request.options.idle_timeout;

    if tx
        .send(StreamEvent::TurnStarted {
            turn_id,
            conversation_id,
            provider: model.provider.clone(),
            model: model.model.clone(),
        })
        .await
        .is_err()
    {
        let failure = TurnFailure::Protocol {
            message: "turn stream receiver dropped before TurnStarted".into(),
        };
        emit_terminal(
            &tx,
            outcome_tx,
            guard,
            StreamEvent::Error {
                turn_id,
                failure: failure.clone(),
            },
            error_outcome(&model, String::new(), failure),
        )
        .await;
        return;
    }

    let mut handle = match provider.start_stream(request).await {
        Ok(handle) => handle,
        Err(err) => {
            let failure = turn_failure_from_provider_error(&err);
            emit_terminal(
                &tx,
                outcome_tx,
                guard,
                StreamEvent::Error {
                    turn_id,
                    failure: failure.clone(),
                },
                error_outcome(&model, String::new(), failure),
            )
            .await;
            return;
        }
    };
    if let Some(request_id) = handle.metadata.request_id.as_deref() {
        debug!(turn_id = %turn_id, request_id, "provider stream established");
    }

    let mut seq = 0_u64;
    let mut content = String::new();
    let mut cancel_closed = false;
    loop {
        let watchdog = async {
            match idle_timeout {
                Some(window) => tokio::time::sleep(window).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            changed = cancel_rx.changed(), if !cancel_closed => {
                match changed {
                    Ok(()) if *cancel_rx.borrow() => {
                        emit_terminal(
                            &tx,
                            outcome_tx,
                            guard,
                            StreamEvent::Cancelled { turn_id },
                            cancelled_outcome(&model, content),
                        )
                        .await;
                        return;
                    }
                    Ok(()) => {}
                    Err(_) => cancel_closed = true,
                }
            }
            () = watchdog => {
                let window = idle_timeout.unwrap_or_default();
                let failure = TurnFailure::Transport {
                    provider: model.provider.to_string(),
                    message: format!("no data received within {window:?}"),
                };
                emit_terminal(
                    &tx,
                    outcome_tx,
                    guard,
                    StreamEvent::Error { turn_id, failure: failure.clone() },
                    error_outcome(&model, content, failure),
                )
                .await;
                return;
            }
            next = handle.stream.next() => {
                match next {
                    Some(Ok(ProviderEvent::ContentDelta { text })) => {
                        if text.is_empty() {
                            continue;
                        }
                        // An abort racing an in-flight chunk must win: never
                        // apply a fragment once cancellation is requested.
                        if *cancel_rx.borrow() {
                            emit_terminal(
                                &tx,
                                outcome_tx,
                                guard,
                                StreamEvent::Cancelled { turn_id },
                                cancelled_outcome(&model, content),
                            )
                            .await;
                            return;
                        }
                        debug!(turn_id = %turn_id, model = %model, seq, "content delta");
                        content.push_str(&text);
                        let sent = tx
                            .send(StreamEvent::ContentDelta { turn_id, seq, text })
                            .await
                            .is_ok();
                        seq = seq.saturating_add(1);
                        if !sent {
                            let failure = TurnFailure::Protocol {
                                message: "turn stream receiver dropped during output".into(),
                            };
                            emit_terminal(
                                &tx,
                                outcome_tx,
                                guard,
                                StreamEvent::Error { turn_id, failure: failure.clone() },
                                error_outcome(&model, content, failure),
                            )
                            .await;
                            return;
                        }
                    }
                    Some(Ok(ProviderEvent::Completed { finish_reason })) => {
                        emit_terminal(
                            &tx,
                            outcome_tx,
                            guard,
                            StreamEvent::Completed {
                                turn_id,
                                content: content.clone(),
                                finish_reason: finish_reason.clone(),
                            },
                            TurnOutcome {
                                model: model.clone(),
                                status: TurnStatus::Completed,
                                content,
                                failure: None,
                                finish_reason,
                            },
                        )
                        .await;
                        return;
                    }
                    Some(Err(err)) => {
                        let failure = turn_failure_from_provider_error(&err);
                        emit_terminal(
                            &tx,
                            outcome_tx,
                            guard,
                            StreamEvent::Error { turn_id, failure: failure.clone() },
                            error_outcome(&model, content, failure),
                        )
                        .await;
                        return;
                    }
                    None => {
                        // The connection closed without a completion sentinel.
                        // Treated as a protocol failure so the turn can never
                        // linger in a streaming state.
                        let failure = TurnFailure::Protocol {
                            message: format!(
                                "stream ended without completion sentinel ({})",
                                model.provider
                            ),
                        };
                        emit_terminal(
                            &tx,
                            outcome_tx,
                            guard,
                            StreamEvent::Error { turn_id, failure: failure.clone() },
                            error_outcome(&model, content, failure),
                        )
                        .await;
                        return;
                    }
                }
            }
        }
    }
}

fn cancelled_outcome(model: &ModelRef, content: String) -> TurnOutcome {
    TurnOutcome {
        model: model.clone(),
        status: TurnStatus::Cancelled,
        content,
        failure: None,
        finish_reason: None,
    }
}

fn error_outcome(model: &ModelRef, content: String, failure: TurnFailure) -> TurnOutcome {
    TurnOutcome {
        model: model.clone(),
        status: TurnStatus::Error,
        content,
        failure: Some(failure),
        finish_reason: None,
    }
}

/// Sends the terminal event and resolves the outcome exactly once.
///
/// The active-turn guard is released first so a caller observing the outcome
/// may immediately start a replacement turn for the same model.
async fn emit_terminal(
    tx: &mpsc::Sender<StreamEvent>,
    outcome_tx: oneshot::Sender<TurnOutcome>,
    guard: ActiveTurnGuard,
    event: StreamEvent,
    outcome: TurnOutcome,
) {
    drop(guard);
    let _ = tx.send(event).await;
    let _ = outcome_tx.send(outcome);
}
