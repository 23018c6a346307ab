// SPDX-License-Identifier: EUPL-1.2

//! The provider registry: which hosts are known LLM APIs, and which JSON
//! paths inside their request bodies carry user content worth protecting.
//!
//! Grounded in the original system's provider catalog — domains, message
//! paths and auth header names are carried over directly; the registry
//! itself (host-match precedence, lookup) is new Rust structure in the
//! shape of [`crate::pii::PatternRegistry`].

/// One known LLM API endpoint.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Human-readable provider name, e.g. `"anthropic"`.
    pub name: &'static str,
    /// Hostnames or wildcard suffixes (`"*.openai.azure.com"`) this
    /// provider is reachable at.
    pub domains: &'static [&'static str],
    /// Dot/bracket JSON paths inside the request body that carry
    /// user-authored content, e.g. `"messages[*].content"`.
    pub message_paths: &'static [&'static str],
    /// Header carrying the API key, if any (local providers have none).
    /// Descriptive only — the proxy forwards every request's headers as
    /// given and never requires this header to be present.
    pub api_key_header: Option<&'static str>,
    /// True for providers reachable only on localhost.
    pub local: bool,
}

impl ProviderDescriptor {
    /// Does `host` match one of this provider's domain patterns? Exact
    /// matches win, then `*.suffix` wildcards — callers resolve ties
    /// across providers via [`ProviderRegistry::resolve`]'s precedence
    /// order, not this method.
    pub fn matches_domain(&self, host: &str) -> bool {
        self.domains.iter().any(|pattern| domain_matches(pattern, host))
    }
}

fn domain_matches(pattern: &str, host: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        return host.ends_with(&format!(".{suffix}"));
    }
    pattern == host
}

/// Catalog of known providers plus the fallback generic field names used
/// when a request targets an unrecognized host.
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

/// Field names treated as user content on any provider, known or not —
/// the safety net beneath `message_paths`.
pub const GENERIC_CONTENT_FIELDS: &[&str] =
    &["content", "text", "prompt", "message", "input", "query"];

impl ProviderRegistry {
    pub fn new() -> ProviderRegistry {
        ProviderRegistry {
            providers: vec![
                ProviderDescriptor {
                    name: "anthropic",
                    domains: &["api.anthropic.com"],
                    message_paths: &["messages[*].content", "prompt"],
                    api_key_header: Some("x-api-key"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "openai",
                    domains: &["api.openai.com"],
                    message_paths: &["messages[*].content", "prompt", "input"],
                    api_key_header: Some("authorization"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "azure_openai",
                    domains: &["*.openai.azure.com"],
                    message_paths: &["messages[*].content", "prompt"],
                    api_key_header: Some("api-key"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "google_ai",
                    domains: &["generativelanguage.googleapis.com", "aiplatform.googleapis.com"],
                    message_paths: &["contents[*].parts[*].text", "instances[*].content"],
                    api_key_header: Some("x-goog-api-key"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "mistral",
                    domains: &["api.mistral.ai"],
                    message_paths: &["messages[*].content"],
                    api_key_header: Some("authorization"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "cohere",
                    domains: &["api.cohere.ai", "api.cohere.com"],
                    message_paths: &["message", "prompt", "texts"],
                    api_key_header: Some("authorization"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "groq",
                    domains: &["api.groq.com"],
                    message_paths: &["messages[*].content"],
                    api_key_header: Some("authorization"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "perplexity",
                    domains: &["api.perplexity.ai"],
                    message_paths: &["messages[*].content"],
                    api_key_header: Some("authorization"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "together_ai",
                    domains: &["api.together.xyz"],
                    message_paths: &["messages[*].content", "prompt"],
                    api_key_header: Some("authorization"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "fireworks_ai",
                    domains: &["api.fireworks.ai"],
                    message_paths: &["messages[*].content", "prompt"],
                    api_key_header: Some("authorization"),
                    local: false,
                },
                ProviderDescriptor {
                    name: "ollama",
                    domains: &["localhost:11434", "127.0.0.1:11434"],
                    message_paths: &["messages[*].content", "prompt"],
                    api_key_header: None,
                    local: true,
                },
                ProviderDescriptor {
                    name: "lm_studio",
                    domains: &["localhost:1234", "127.0.0.1:1234"],
                    message_paths: &["messages[*].content", "prompt"],
                    api_key_header: None,
                    local: true,
                },
            ],
        }
    }

    pub fn all(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Look up a provider by its catalog name, e.g. `"openai"`.
    pub fn by_name(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Resolve `host` to a known provider. Exact domain matches take
    /// precedence over suffix/wildcard matches regardless of catalog
    /// order; among equally-specific matches the first registered wins.
    pub fn resolve(&self, host: &str) -> Option<&ProviderDescriptor> {
        let exact = self
            .providers
            .iter()
            .find(|p| p.domains.iter().any(|d| *d == host));
        if exact.is_some() {
            return exact;
        }
        self.providers.iter().find(|p| p.matches_domain(host))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
