use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::errors::{ClientError, ProviderError};
use crate::message::ChatMessage;
use crate::model::ProviderId;
use crate::provider::{
    ProviderAdapter, ProviderEvent, ProviderRequest, ProviderResponseMeta, ProviderStreamHandle,
};

use super::config::OpenAiClientConfig;
use super::options::OpenAiRequestOptions;
use super::transport::{ChatFrame, SseLineDecoder, parse_chat_line};

const OPENAI_PROVIDER: &str = "openai";

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, BoxError>> + Send + 'static>>;

/// Provider adapter for OpenAI-compatible chat-completion endpoints
/// (streaming `text/event-stream` responses).
pub struct OpenAiChatProvider {
    client: reqwest::Client,
    config: OpenAiClientConfig,
}

impl OpenAiChatProvider {
    /// Creates a provider from explicit client configuration.
    pub fn new(config: OpenAiClientConfig) -> Result<Self, ClientError> {
        if config.api_key.trim().is_empty() {
            return Err(ClientError::Config(
                "OpenAI client config api_key must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build OpenAI client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a provider from `OPENAI_API_KEY` / `ONEEDGE_BASE_URL`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(OpenAiClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiChatProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(OPENAI_PROVIDER)
    }

    async fn start_stream(
        &self,
        req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        let provider_id = ProviderId::new(OPENAI_PROVIDER);
        let request_options = read_openai_options(&req, &provider_id)?;
        let body = build_request_body(&req, &request_options);
        debug!(
            turn_id = %req.turn_id,
            conversation_id = %req.conversation_id,
            model = %req.model.model,
            "starting chat completion stream"
        );

        let mut http_req = self
            .client
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(timeout) = req.options.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req.send().await.map_err(|e| {
            ProviderError::transport(provider_id.clone(), format!("chat request failed: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                provider_id,
                format!("chat completion request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);

        let bytes_stream: ByteStream =
            Box::pin(response.bytes_stream().map(|item| item.map_err(box_err)));
        let stream = chat_event_stream(provider_id, bytes_stream);

        Ok(ProviderStreamHandle {
            stream: Box::pin(stream),
            metadata: ProviderResponseMeta { request_id },
        })
    }
}

fn box_err(err: reqwest::Error) -> BoxError {
    Box::new(err)
}

fn read_openai_options(
    req: &ProviderRequest,
    provider_id: &ProviderId,
) -> Result<OpenAiRequestOptions, ProviderError> {
    match req.vendor_options.get(provider_id) {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            ProviderError::protocol(provider_id.clone(), format!("invalid OpenAI options: {e}"))
        }),
        None => Ok(OpenAiRequestOptions::default()),
    }
}

pub(crate) fn build_request_body(
    req: &ProviderRequest,
    options: &OpenAiRequestOptions,
) -> serde_json::Value {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    if let Some(system_prompt) = req
        .system_prompt
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        messages.push(ChatMessage::system(system_prompt));
    }
    messages.extend(req.messages.iter().cloned());

    let mut body = serde_json::json!({
        "model": req.model.model,
        "messages": messages,
        "stream": true,
    });
    if let Some(temperature) = req.options.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if let Some(max_tokens) = req.options.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(top_p) = options.top_p {
        body["top_p"] = serde_json::json!(top_p);
    }
    if let Some(stop) = options.stop.as_ref() {
        body["stop"] = serde_json::json!(stop);
    }
    if let Some(user) = options.user.as_ref() {
        body["user"] = serde_json::json!(user);
    }
    body
}

pub(crate) fn chat_event_stream(
    provider_id: ProviderId,
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<ProviderEvent, ProviderError>> + Send {
    struct State {
        provider_id: ProviderId,
        bytes_stream: ByteStream,
        decoder: SseLineDecoder,
        pending: VecDeque<ProviderEvent>,
        finish_reason: Option<String>,
        done: bool,
    }

    stream::try_unfold(
        State {
            provider_id,
            bytes_stream,
            decoder: SseLineDecoder::default(),
            pending: VecDeque::new(),
            finish_reason: None,
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for line in state.decoder.push_chunk(&chunk) {
                            match parse_chat_line(&state.provider_id, &line)? {
                                ChatFrame::Delta(text) => {
                                    state.pending.push_back(ProviderEvent::ContentDelta { text });
                                }
                                ChatFrame::FinishReason(reason) => {
                                    state.finish_reason = Some(reason);
                                }
                                ChatFrame::Done => {
                                    state
                                        .pending
                                        .push_back(ProviderEvent::Completed {
                                            finish_reason: state.finish_reason.take(),
                                        });
                                    state.done = true;
                                }
                                ChatFrame::Ignore => {}
                            }
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(
                            state.provider_id,
                            format!("chat streaming read failed: {e}"),
                        ));
                    }
                    None => {
                        // EOF without the sentinel: any buffered partial line
                        // is discarded; the turn runtime turns the early end
                        // into a protocol failure.
                        state.done = true;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatMessage;
    use crate::model::{ModelRef, TurnOptions};
    use std::collections::HashMap;

    fn request_with_messages(messages: Vec<ChatMessage>) -> ProviderRequest {
        ProviderRequest {
            turn_id: uuid::Uuid::new_v4(),
            conversation_id: uuid::Uuid::new_v4(),
            model: ModelRef::new("openai", "gpt-4o-mini"),
            system_prompt: Some("sys".into()),
            messages,
            options: TurnOptions {
                temperature: Some(0.7),
                max_tokens: Some(256),
                ..TurnOptions::default()
            },
            vendor_options: HashMap::new(),
        }
    }

    fn byte_stream(chunks: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(bytes::Bytes::from_static(c))),
        ))
    }

    async fn collect_events(
        chunks: Vec<&'static [u8]>,
    ) -> Vec<Result<ProviderEvent, ProviderError>> {
        chat_event_stream(ProviderId::new("openai"), byte_stream(chunks))
            .collect::<Vec<_>>()
            .await
    }

    #[test]
    fn request_body_matches_wire_contract() {
        let req = request_with_messages(vec![ChatMessage::user("hello")]);
        let body = build_request_body(&req, &OpenAiRequestOptions::default());
        assert_eq!(body.get("stream").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(
            body.get("model").and_then(|v| v.as_str()),
            Some("gpt-4o-mini")
        );
        assert_eq!(
            body.get("max_tokens").and_then(|v| v.as_u64()),
            Some(256)
        );
        let messages = body
            .get("messages")
            .and_then(|v| v.as_array())
            .expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].get("role").and_then(|v| v.as_str()),
            Some("system")
        );
        assert_eq!(
            messages[1].get("content").and_then(|v| v.as_str()),
            Some("hello")
        );
    }

    #[test]
    fn vendor_options_are_applied_when_present() {
        let req = request_with_messages(vec![ChatMessage::user("hello")]);
        let body = build_request_body(
            &req,
            &OpenAiRequestOptions::default()
                .top_p(0.9)
                .stop(vec!["\n\n".into()]),
        );
        assert!(body.get("top_p").is_some());
        assert!(body.get("stop").is_some());
    }

    #[tokio::test]
    async fn event_stream_emits_deltas_then_completed_with_finish_reason() {
        let events = collect_events(vec![
            b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            b"data: [DONE]\n\n",
        ])
        .await;
        let events: Vec<ProviderEvent> = events
            .into_iter()
            .collect::<Result<_, _>>()
            .expect("no stream errors");
        assert_eq!(
            events,
            vec![
                ProviderEvent::ContentDelta { text: "Hel".into() },
                ProviderEvent::ContentDelta { text: "lo".into() },
                ProviderEvent::Completed {
                    finish_reason: Some("stop".into()),
                },
            ]
        );
    }

    #[tokio::test]
    async fn malformed_frame_between_valid_frames_is_tolerated() {
        let events = collect_events(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            b"data: {not valid json\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\ndata: [DONE]\n",
        ])
        .await;
        let events: Vec<ProviderEvent> = events
            .into_iter()
            .collect::<Result<_, _>>()
            .expect("malformed frame must not be fatal");
        assert_eq!(
            events,
            vec![
                ProviderEvent::ContentDelta { text: "a".into() },
                ProviderEvent::ContentDelta { text: "b".into() },
                ProviderEvent::Completed {
                    finish_reason: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn eof_without_sentinel_ends_without_completed_event() {
        let events =
            collect_events(vec![b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n"]).await;
        let events: Vec<ProviderEvent> = events
            .into_iter()
            .collect::<Result<_, _>>()
            .expect("no stream errors");
        assert_eq!(
            events,
            vec![ProviderEvent::ContentDelta { text: "a".into() }]
        );
    }

    #[tokio::test]
    async fn error_frame_surfaces_as_provider_error() {
        let events = collect_events(vec![
            b"data: {\"error\":{\"message\":\"insufficient quota\"}}\n",
        ])
        .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Err(ProviderError::Provider { .. })
        ));
    }

    #[tokio::test]
    async fn env_gated_smoke_collect_text_if_key_present() {
        if std::env::var("OPENAI_API_KEY")
            .unwrap_or_default()
            .trim()
            .is_empty()
        {
            eprintln!("skipping OpenAI smoke test (OPENAI_API_KEY missing)");
            return;
        }

        let client = crate::ChatClient::builder()
            .register_provider(std::sync::Arc::new(
                OpenAiChatProvider::from_env().expect("provider"),
            ))
            .build()
            .expect("client");

        let result = client
            .conversation(crate::ConversationConfig::named("smoke"))
            .turn(crate::ModelRef::new("openai", "gpt-4o-mini"))
            .system_prompt("Return exactly the word: ok")
            .user_text("ok")
            .collect_text()
            .await;

        assert!(result.is_ok(), "OpenAI smoke failed: {result:?}");
    }
}
