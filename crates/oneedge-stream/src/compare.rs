//! Side-by-side comparison runs: one prompt fanned out across several
//! models, each streaming independently.

use tokio::sync::mpsc;
use tracing::debug;

use crate::conversation::Conversation;
use crate::errors::ClientError;
use crate::model::{ModelRef, TurnOptions};
use crate::stream::{StreamEvent, TurnOutcome};
use crate::turn::CancelHandle;

/// Builder for a comparison run across several models.
///
/// Every child turn shares the same prompt and options but streams fully
/// independently: one model's failure never cancels or affects its siblings.
pub struct ComparisonBuilder {
    conversation: Conversation,
    models: Vec<ModelRef>,
    system_prompt: Option<String>,
    prompt: Option<String>,
    options: TurnOptions,
}

impl ComparisonBuilder {
    pub(crate) fn new(conversation: Conversation, models: Vec<ModelRef>) -> Self {
        Self {
            conversation,
            models,
            system_prompt: None,
            prompt: None,
            options: TurnOptions::default(),
        }
    }

    /// Sets the system prompt shared by every child turn.
    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = Some(text.into());
        self
    }

    /// Sets the user prompt shared by every child turn.
    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = Some(text.into());
        self
    }

    /// Sets the turn options shared by every child turn.
    pub fn options(mut self, options: TurnOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the builder and starts one streaming turn per model.
    ///
    /// If any child fails to start, the children already started are
    /// cancelled and the error is returned.
    pub async fn start(self) -> Result<ComparisonRun, ClientError> {
        if self.models.is_empty() {
            return Err(ClientError::Validation(
                "comparison requires at least one model".into(),
            ));
        }
        let prompt = self
            .prompt
            .clone()
            .ok_or_else(|| ClientError::Validation("comparison requires a prompt".into()))?;

        let mut streams = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let mut builder = self
                .conversation
                .turn(model.clone())
                .user_text(prompt.clone())
                .stream_buffer_capacity(self.options.stream_buffer_capacity);
            if let Some(system_prompt) = self.system_prompt.as_ref() {
                builder = builder.system_prompt(system_prompt.clone());
            }
            if let Some(temperature) = self.options.temperature {
                builder = builder.temperature(temperature);
            }
            if let Some(max_tokens) = self.options.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }
            if let Some(timeout) = self.options.timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(idle_timeout) = self.options.idle_timeout {
                builder = builder.idle_timeout(idle_timeout);
            }
            match builder.start_stream().await {
                Ok(stream) => streams.push(stream),
                Err(err) => {
                    for started in &streams {
                        started.cancel_handle().cancel();
                    }
                    return Err(err);
                }
            }
        }

        let child_count = streams.len();
        let (event_tx, event_rx) = mpsc::channel(self.options.stream_buffer_capacity);
        let (outcome_tx, outcome_rx) = mpsc::channel(child_count);
        let mut cancel_handles = Vec::with_capacity(child_count);

        for (index, mut stream) in streams.into_iter().enumerate() {
            cancel_handles.push(stream.cancel_handle());
            let event_tx = event_tx.clone();
            let outcome_tx = outcome_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = stream.next_event().await {
                    let terminal = event.is_terminal();
                    if event_tx.send((index, event)).await.is_err() {
                        // Consumer stopped watching events; still wait for
                        // the terminal outcome below.
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
                let outcome = stream.finish().await;
                let _ = outcome_tx.send((index, outcome)).await;
            });
        }

        Ok(ComparisonRun {
            models: self.models,
            event_rx,
            outcome_rx,
            cancel_handles,
        })
    }
}

/// Handle to a running comparison.
///
/// Events from all children interleave on one channel tagged with the model
/// index (submission order); there is no cross-model ordering guarantee.
pub struct ComparisonRun {
    models: Vec<ModelRef>,
    event_rx: mpsc::Receiver<(usize, StreamEvent)>,
    outcome_rx: mpsc::Receiver<(usize, Result<TurnOutcome, ClientError>)>,
    cancel_handles: Vec<CancelHandle>,
}

impl ComparisonRun {
    /// Returns the compared models in submission order.
    pub fn models(&self) -> &[ModelRef] {
        &self.models
    }

    /// Waits for the next event from any child, tagged with the index of its
    /// model in `models()`.
    ///
    /// Returns `None` once every child has emitted its terminal event.
    pub async fn next_event(&mut self) -> Option<(usize, StreamEvent)> {
        self.event_rx.recv().await
    }

    /// Requests cancellation of every still-streaming child.
    ///
    /// Terminal children are unaffected; the call is idempotent.
    pub fn cancel_all(&self) {
        debug!(children = self.cancel_handles.len(), "cancelling comparison run");
        for handle in &self.cancel_handles {
            handle.cancel();
        }
    }

    /// Waits until every child is terminal and returns one outcome per
    /// model, in submission order.
    pub async fn finish(mut self) -> Result<Vec<TurnOutcome>, ClientError> {
        self.event_rx.close();
        let mut outcomes: Vec<Option<TurnOutcome>> = vec![None; self.models.len()];
        let mut remaining = self.models.len();
        while remaining > 0 {
            match self.outcome_rx.recv().await {
                Some((index, Ok(outcome))) => {
                    outcomes[index] = Some(outcome);
                    remaining -= 1;
                }
                Some((_, Err(err))) => return Err(err),
                None => {
                    return Err(ClientError::protocol_msg(
                        "comparison child ended without outcome",
                    ));
                }
            }
        }
        let mut resolved = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Some(outcome) => resolved.push(outcome),
                None => {
                    return Err(ClientError::protocol_msg(
                        "comparison outcome missing for a child",
                    ));
                }
            }
        }
        Ok(resolved)
    }
}
