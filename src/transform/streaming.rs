// SPDX-License-Identifier: EUPL-1.2

//! Streaming (SSE) response detokenization.
//!
//! LLM streaming responses arrive as `text/event-stream` bodies made of
//! `data: {...}\n\n` lines. A naive per-chunk split on `\n` breaks as
//! soon as a line straddles two TCP reads — this buffers whatever is left
//! after the last newline and prepends it to the next chunk, so a line is
//! only ever processed once it is known to be complete.

use crate::transform::Transformer;

/// Owns the carry-over buffer for one in-flight stream. One instance per
/// upstream response; never shared across requests.
pub struct StreamingTransformer {
    buffer: String,
}

impl StreamingTransformer {
    pub fn new() -> Self {
        StreamingTransformer {
            buffer: String::new(),
        }
    }

    /// Feed the next chunk of upstream bytes, returning the detokenized
    /// text that is now safe to forward. Any trailing partial line is
    /// retained internally and prefixed to the next call.
    pub fn process_chunk(&mut self, chunk: &[u8], transformer: &Transformer) -> String {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut out = String::new();
        loop {
            match self.buffer.find('\n') {
                Some(idx) => {
                    let line: String = self.buffer.drain(..=idx).collect();
                    out.push_str(&self.process_line(&line, transformer));
                }
                None => break,
            }
        }
        out
    }

    /// Flush whatever partial line remains once the stream has ended.
    pub fn finish(&mut self, transformer: &Transformer) -> String {
        if self.buffer.is_empty() {
            return String::new();
        }
        let remainder = std::mem::take(&mut self.buffer);
        self.process_line(&remainder, transformer)
    }

    fn process_line(&self, line: &str, transformer: &Transformer) -> String {
        let trimmed_end = line.trim_end_matches(['\r', '\n']);
        let newline_suffix = &line[trimmed_end.len()..];

        let Some(payload) = trimmed_end.strip_prefix("data: ").or_else(|| trimmed_end.strip_prefix("data:")) else {
            return line.to_string();
        };
        let payload = payload.trim_start();

        if payload == "[DONE]" {
            return line.to_string();
        }

        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(mut value) => {
                transformer.unprotect_response_json(&mut value);
                let rewritten = serde_json::to_string(&value).unwrap_or_else(|_| payload.to_string());
                format!("data: {rewritten}{newline_suffix}")
            }
            Err(_) => {
                let rewritten = transformer.unprotect_response_text(payload);
                format!("data: {rewritten}{newline_suffix}")
            }
        }
    }
}

impl Default for StreamingTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoCore;
    use crate::pii::{Detector, PiiKind};
    use crate::vault::TokenVault;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Detector, TokenVault) {
        let dir = TempDir::new().unwrap();
        let detector = Detector::new().unwrap();
        let crypto = CryptoCore::load_or_create(&dir.path().join("master.key")).unwrap();
        let vault = TokenVault::open(&dir.path().join("vault.db"), crypto).unwrap();
        (dir, detector, vault)
    }

    #[test]
    fn detokenizes_a_complete_sse_line() {
        let (_dir, detector, vault) = fixture();
        let (token_id, _) = vault.intern("jane.doe@example.com", PiiKind::Email, "openai").unwrap();
        let token = crate::transform::wire_token(&token_id);
        let transformer = Transformer::new(&detector, &vault);
        let mut streamer = StreamingTransformer::new();

        let chunk = format!(r#"data: {{"choices":[{{"delta":{{"content":"hi {token}"}}}}]}}"#) + "\n";
        let out = streamer.process_chunk(chunk.as_bytes(), &transformer);
        assert!(out.contains("jane.doe@example.com"));
        assert!(!out.contains("◈PG:"));
    }

    #[test]
    fn buffers_a_line_split_across_two_chunks() {
        let (_dir, detector, vault) = fixture();
        let (token_id, _) = vault.intern("jane.doe@example.com", PiiKind::Email, "openai").unwrap();
        let token = crate::transform::wire_token(&token_id);
        let transformer = Transformer::new(&detector, &vault);
        let mut streamer = StreamingTransformer::new();

        let full = format!(r#"data: {{"choices":[{{"delta":{{"content":"hi {token}"}}}}]}}"#) + "\n";
        let midpoint = full.len() / 2;
        let (first, second) = full.split_at(midpoint);

        let mut out = streamer.process_chunk(first.as_bytes(), &transformer);
        assert!(out.is_empty(), "a partial line must not be emitted early");
        out.push_str(&streamer.process_chunk(second.as_bytes(), &transformer));

        assert!(out.contains("jane.doe@example.com"));
    }

    #[test]
    fn done_sentinel_passes_through_untouched() {
        let (_dir, detector, vault) = fixture();
        let transformer = Transformer::new(&detector, &vault);
        let mut streamer = StreamingTransformer::new();
        let out = streamer.process_chunk(b"data: [DONE]\n", &transformer);
        assert_eq!(out, "data: [DONE]\n");
    }

    #[test]
    fn unparsable_payload_falls_back_to_plain_text_detokenization() {
        let (_dir, detector, vault) = fixture();
        let (token_id, _) = vault.intern("jane.doe@example.com", PiiKind::Email, "openai").unwrap();
        let token = crate::transform::wire_token(&token_id);
        let transformer = Transformer::new(&detector, &vault);
        let mut streamer = StreamingTransformer::new();

        let chunk = format!("data: not valid json but has {token} in it\n");
        let out = streamer.process_chunk(chunk.as_bytes(), &transformer);
        assert!(out.contains("jane.doe@example.com"));
    }

    #[test]
    fn trailing_partial_line_is_flushed_on_finish() {
        let (_dir, detector, vault) = fixture();
        let transformer = Transformer::new(&detector, &vault);
        let mut streamer = StreamingTransformer::new();
        let out = streamer.process_chunk(b"data: [DONE", &transformer);
        assert!(out.is_empty());
        let flushed = streamer.finish(&transformer);
        assert_eq!(flushed, "data: [DONE");
    }
}
