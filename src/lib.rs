// SPDX-License-Identifier: EUPL-1.2

//! PrivacyGuardian: a local, transparent HTTP reverse proxy that detects
//! PII and secrets in outbound LLM API request bodies, substitutes them
//! with stable opaque tokens, and restores the plaintext in response
//! bodies — including streaming responses — before it reaches the caller.

pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod pii;
pub mod providers;
pub mod transform;
pub mod vault;
