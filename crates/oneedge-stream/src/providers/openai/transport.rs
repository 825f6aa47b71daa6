use tracing::debug;

use crate::errors::ProviderError;
use crate::model::ProviderId;

/// Incremental newline-delimited SSE line decoder.
///
/// Carries a byte buffer across chunks so lines split anywhere by the
/// transport, including inside a multi-byte UTF-8 codepoint, reassemble
/// correctly: `\n` (0x0A) never occurs inside a multi-byte sequence, so a
/// partial codepoint always stays in the retained tail. An unterminated
/// trailing line at stream end is never emitted.
#[derive(Default)]
pub(crate) struct SseLineDecoder {
    buf: Vec<u8>,
}

impl SseLineDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let mut end = raw.len() - 1;
            if end > 0 && raw[end - 1] == b'\r' {
                end -= 1;
            }
            lines.push(String::from_utf8_lossy(&raw[..end]).into_owned());
        }
        lines
    }
}

/// Interpretation of one complete SSE line for chat-completion streams.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ChatFrame {
    /// Incremental assistant text from `choices[0].delta.content`.
    Delta(String),
    /// `finish_reason` reported on the closing chunk, ahead of `[DONE]`.
    FinishReason(String),
    /// The `data: [DONE]` success sentinel.
    Done,
    /// Keep-alives, comments, role-only deltas, and malformed payloads.
    Ignore,
}

/// Maps one line to a `ChatFrame`.
///
/// Malformed JSON payloads are dropped, not fatal: transient truncation
/// mid-stream must not abort an otherwise healthy session. An explicit
/// `{"error": ...}` frame is the one mid-stream payload that fails the turn.
pub(crate) fn parse_chat_line(
    provider: &ProviderId,
    line: &str,
) -> Result<ChatFrame, ProviderError> {
    let Some(data) = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))
    else {
        return Ok(ChatFrame::Ignore);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(ChatFrame::Ignore);
    }
    if data == "[DONE]" {
        return Ok(ChatFrame::Done);
    }

    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(err) => {
            debug!(provider = %provider, %err, "dropping malformed SSE payload");
            return Ok(ChatFrame::Ignore);
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("chat completion stream error");
        return Err(ProviderError::provider(provider.clone(), message, None));
    }

    let Some(choice) = value.get("choices").and_then(|c| c.get(0)) else {
        return Ok(ChatFrame::Ignore);
    };
    if let Some(text) = choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(|v| v.as_str())
        && !text.is_empty()
    {
        return Ok(ChatFrame::Delta(text.to_string()));
    }
    if let Some(reason) = choice.get("finish_reason").and_then(|v| v.as_str()) {
        return Ok(ChatFrame::FinishReason(reason.to_string()));
    }
    Ok(ChatFrame::Ignore)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = SseLineDecoder::default();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(decoder.push_chunk(chunk));
        }
        lines
    }

    #[test]
    fn chunk_boundary_invariance_one_byte_at_a_time() {
        let stream = "data: {\"a\":1}\ndata: {\"b\":2}\n\ndata: [DONE]\n";
        let whole = decode_all(&[stream.as_bytes()]);
        let mut decoder = SseLineDecoder::default();
        let mut byte_at_a_time = Vec::new();
        for byte in stream.as_bytes() {
            byte_at_a_time.extend(decoder.push_chunk(std::slice::from_ref(byte)));
        }
        assert_eq!(whole, byte_at_a_time);
    }

    #[test]
    fn multibyte_codepoint_split_across_chunks_survives() {
        let line = "data: {\"delta\":\"héllo — ✓\"}\n";
        let bytes = line.as_bytes();
        // Split inside the two-byte 'é' sequence.
        let split = bytes
            .iter()
            .position(|b| *b == 0xC3)
            .expect("multi-byte start")
            + 1;
        let lines = decode_all(&[&bytes[..split], &bytes[split..]]);
        assert_eq!(lines, vec![line.trim_end_matches('\n').to_string()]);
    }

    #[test]
    fn crlf_lines_are_trimmed() {
        let lines = decode_all(&[b"data: x\r\ndata: y\r\n"]);
        assert_eq!(lines, vec!["data: x".to_string(), "data: y".to_string()]);
    }

    #[test]
    fn unterminated_tail_is_never_emitted() {
        let mut decoder = SseLineDecoder::default();
        let lines = decoder.push_chunk(b"data: complete\ndata: partial");
        assert_eq!(lines, vec!["data: complete".to_string()]);
    }

    #[test]
    fn parses_delta_done_and_finish_reason() {
        let provider = ProviderId::new("openai");
        assert_eq!(
            parse_chat_line(
                &provider,
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}"
            )
            .expect("parse"),
            ChatFrame::Delta("Hi".into())
        );
        assert_eq!(
            parse_chat_line(&provider, "data: [DONE]").expect("parse"),
            ChatFrame::Done
        );
        assert_eq!(
            parse_chat_line(
                &provider,
                "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}"
            )
            .expect("parse"),
            ChatFrame::FinishReason("stop".into())
        );
    }

    #[test]
    fn malformed_json_is_ignored_not_fatal() {
        let provider = ProviderId::new("openai");
        assert_eq!(
            parse_chat_line(&provider, "data: {not valid json").expect("lenient"),
            ChatFrame::Ignore
        );
    }

    #[test]
    fn role_only_delta_and_non_data_lines_are_ignored() {
        let provider = ProviderId::new("openai");
        assert_eq!(
            parse_chat_line(
                &provider,
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}"
            )
            .expect("parse"),
            ChatFrame::Ignore
        );
        assert_eq!(
            parse_chat_line(&provider, ": keep-alive").expect("parse"),
            ChatFrame::Ignore
        );
        assert_eq!(
            parse_chat_line(&provider, "").expect("parse"),
            ChatFrame::Ignore
        );
    }

    #[test]
    fn error_frame_fails_the_stream() {
        let provider = ProviderId::new("openai");
        let err = parse_chat_line(
            &provider,
            "data: {\"error\":{\"message\":\"quota exceeded\"}}",
        )
        .expect_err("error frame");
        assert!(matches!(err, ProviderError::Provider { message, .. } if message.contains("quota")));
    }
}
