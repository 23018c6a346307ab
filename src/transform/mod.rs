// SPDX-License-Identifier: EUPL-1.2

//! Request/response body transformation: walk a JSON tree (or fall back
//! to plain text), protect the string leaves that carry user content on
//! the way out, and detokenize every string leaf on the way back in.
//!
//! Grounded in the original system's request parser — path tracking with
//! `[*]` array normalization, the content/text/prompt/message/input/query
//! fallback field names, and right-to-left span splicing all mirror its
//! behavior; the JSON walk itself follows the recursive tree-walk style
//! used by the PII vault middleware in the wider example pack.

pub mod streaming;

use crate::pii::{Detector, Span};
use crate::providers::{ProviderDescriptor, GENERIC_CONTENT_FIELDS};
use crate::vault::TokenVault;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Opening/closing delimiters and body pattern for the token wire format:
/// `◈PG:<KIND4>_<HASH12>◈`. The single capture group is the full
/// `<KIND4>_<HASH12>` body, which is also the vault's primary key for the
/// token — see `TokenVault::token_id_for`.
fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"◈PG:([A-Z_]{1,8}_[a-f0-9]{12})◈").expect("token regex is a fixed literal")
    })
}

/// Render the wire token for a freshly-interned value: `token_id` is
/// already the full `<KIND4>_<HASH12>` vault key, so this only adds the
/// delimiters.
pub fn wire_token(token_id: &str) -> String {
    format!("◈PG:{token_id}◈")
}

/// Replace every PII span in `text` with its interned token, scanning
/// right-to-left so that earlier byte offsets stay valid as later spans
/// are spliced in.
fn protect_string(text: &str, provider: &str, detector: &Detector, vault: &TokenVault) -> String {
    let spans: Vec<Span> = detector.detect(text);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut out = text.to_string();
    for span in spans.iter().rev() {
        let value = span.text(text);
        let (token_id, _is_new) = vault
            .intern(value, span.kind, provider)
            .expect("vault writes do not fail on a well-formed store");
        out.replace_range(span.start..span.end, &wire_token(&token_id));
    }
    out
}

/// Replace every recognized token in `text` with its original plaintext.
/// Unknown or malformed tokens are left untouched — a decrypt failure or
/// an unrecognized token is never a reason to drop the surrounding text.
fn unprotect_string(text: &str, vault: &TokenVault) -> String {
    if !text.contains('\u{25C8}') {
        return text.to_string();
    }
    token_regex()
        .replace_all(text, |caps: &regex::Captures| {
            let token_id = &caps[1];
            vault.lookup(token_id).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn last_field_name(path: &str) -> &str {
    let segment = path.rsplit('.').next().unwrap_or(path);
    segment.split('[').next().unwrap_or(segment)
}

fn should_protect(path: &str, provider: &ProviderDescriptor) -> bool {
    if provider.message_paths.iter().any(|p| *p == path) {
        return true;
    }
    let field = last_field_name(path);
    GENERIC_CONTENT_FIELDS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(field))
}

fn walk_protect(
    value: &mut Value,
    path: &str,
    provider: &ProviderDescriptor,
    detector: &Detector,
    vault: &TokenVault,
) {
    match value {
        Value::String(s) => {
            if should_protect(path, provider) {
                *s = protect_string(s, provider.name, detector, vault);
            }
        }
        Value::Array(items) => {
            let child_path = format!("{path}[*]");
            for item in items {
                walk_protect(item, &child_path, provider, detector, vault);
            }
        }
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                walk_protect(item, &child_path, provider, detector, vault);
            }
        }
        _ => {}
    }
}

fn walk_unprotect(value: &mut Value, vault: &TokenVault) {
    match value {
        Value::String(s) => *s = unprotect_string(s, vault),
        Value::Array(items) => {
            for item in items {
                walk_unprotect(item, vault);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                walk_unprotect(item, vault);
            }
        }
        _ => {}
    }
}

/// Stateless facade over the detector and vault, bound to a single
/// request's provider. Built fresh per request from the shared
/// `AppState` — owns no mutable state itself.
pub struct Transformer<'a> {
    pub detector: &'a Detector,
    pub vault: &'a TokenVault,
}

impl<'a> Transformer<'a> {
    pub fn new(detector: &'a Detector, vault: &'a TokenVault) -> Self {
        Transformer { detector, vault }
    }

    /// Protect an outbound JSON request body in place, walking only the
    /// paths the provider declares as content plus the generic fallback
    /// field names.
    pub fn protect_request_json(&self, body: &mut Value, provider: &ProviderDescriptor) {
        walk_protect(body, "", provider, self.detector, self.vault);
    }

    /// Protect a non-JSON outbound body as plain text.
    pub fn protect_request_text(&self, body: &str, provider: &ProviderDescriptor) -> String {
        protect_string(body, provider.name, self.detector, self.vault)
    }

    /// Detokenize every string leaf of an inbound JSON response body,
    /// regardless of path — the response shape is the provider's to
    /// define, so every string is a candidate.
    pub fn unprotect_response_json(&self, body: &mut Value) {
        walk_unprotect(body, self.vault);
    }

    /// Detokenize a non-JSON inbound body as plain text.
    pub fn unprotect_response_text(&self, body: &str) -> String {
        unprotect_string(body, self.vault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoCore;
    use crate::providers::ProviderRegistry;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Detector, TokenVault) {
        let dir = TempDir::new().unwrap();
        let detector = Detector::new().unwrap();
        let crypto = CryptoCore::load_or_create(&dir.path().join("master.key")).unwrap();
        let vault = TokenVault::open(&dir.path().join("vault.db"), crypto).unwrap();
        (dir, detector, vault)
    }

    #[test]
    fn pii_free_text_is_returned_unchanged() {
        let (_dir, detector, vault) = fixture();
        let text = "What is the weather like in Paris?";
        assert_eq!(protect_string(text, "openai", &detector, &vault), text);
    }

    #[test]
    fn protect_then_unprotect_is_identity() {
        let (_dir, detector, vault) = fixture();
        let text = "Email me at jane.doe@example.com about the contract.";
        let transformer = Transformer::new(&detector, &vault);
        let protected = transformer.protect_request_text(text, &ProviderRegistry::new().resolve("api.openai.com").unwrap());
        assert_ne!(protected, text);
        let restored = transformer.unprotect_response_text(&protected);
        assert_eq!(restored, text);
    }

    #[test]
    fn protects_declared_message_path_in_json() {
        let (_dir, detector, vault) = fixture();
        let registry = ProviderRegistry::new();
        let provider = registry.resolve("api.anthropic.com").unwrap();
        let transformer = Transformer::new(&detector, &vault);

        let mut body = serde_json::json!({
            "model": "claude-sonnet",
            "messages": [{"role": "user", "content": "my email is a@b.com"}]
        });
        transformer.protect_request_json(&mut body, provider);

        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.contains("◈PG:"));
        assert!(!content.contains("a@b.com"));
        assert_eq!(body["model"], "claude-sonnet");
    }

    #[test]
    fn does_not_touch_fields_outside_declared_or_generic_paths() {
        let (_dir, detector, vault) = fixture();
        let registry = ProviderRegistry::new();
        let provider = registry.resolve("api.anthropic.com").unwrap();
        let transformer = Transformer::new(&detector, &vault);

        let mut body = serde_json::json!({
            "model": "a@b.com-model-name",
            "messages": [{"role": "user", "content": "hello"}]
        });
        transformer.protect_request_json(&mut body, provider);
        assert_eq!(body["model"], "a@b.com-model-name");
    }

    #[test]
    fn unknown_token_like_string_passes_through_unchanged() {
        let (_dir, _detector, vault) = fixture();
        let text = "contains ◈PG:FAKE_deadbeefcafe◈ which was never interned";
        assert_eq!(unprotect_string(text, &vault), text);
    }
}
