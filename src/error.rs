// SPDX-License-Identifier: EUPL-1.2

//! The error taxonomy described in the proxy's design notes: configuration
//! errors are fatal at startup, everything else degrades to pass-through
//! rather than dropping a payload the proxy didn't understand.

use thiserror::Error;

/// Errors raised while building the process — these are always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("pattern {kind} failed to compile: {source}")]
    PatternCompile {
        kind: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("cannot open vault store at {path}: {source}")]
    VaultOpen {
        path: std::path::PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot create master key at {path}: {source}")]
    MasterKey {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot bind listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Runtime failures surfaced to the dispatcher. None of these represent a
/// corrupted payload — callers either translate them to a response or
/// treat the affected token/value as unknown and pass it through verbatim.
#[derive(Debug, Error)]
pub enum GuardianError {
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(#[from] reqwest::Error),

    #[error("decryption failed")]
    Decrypt,
}
