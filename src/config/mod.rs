// SPDX-License-Identifier: EUPL-1.2

//! Configuration: a TOML file under the data directory, overridable by
//! CLI flags. Anything here that cannot be made sense of is a fatal
//! startup error — the proxy never starts half-configured.

use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default loopback port the proxy listens on.
pub const DEFAULT_PORT: u16 = 6660;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the proxy binds to. Always loopback in the default config;
    /// a non-loopback override is honored but logged loudly at startup.
    pub listen: SocketAddr,
    /// Directory holding `master.key`, `vault.db`, and the `enabled`
    /// sentinel. Defaults to `~/.privacyguardian`.
    pub data_dir: PathBuf,
    /// Provider name used when the target host does not match any known
    /// provider and no override header is present.
    pub default_provider: String,
    /// Seconds before an upstream request is abandoned.
    pub upstream_timeout_secs: u64,
    /// Maximum request/response body size the proxy will buffer, in bytes.
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            data_dir: default_data_dir(),
            default_provider: "anthropic".to_string(),
            upstream_timeout_secs: 120,
            max_body_bytes: 25 * 1024 * 1024,
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".privacyguardian"))
        .unwrap_or_else(|| PathBuf::from(".privacyguardian"))
}

/// CLI overrides layered on top of `config.toml`. Unset flags leave the
/// file (or built-in default) untouched.
#[derive(Debug, Parser)]
#[command(name = "privacyguardian", about = "Local transparent proxy that tokenizes PII before it reaches remote LLM APIs")]
pub struct Cli {
    /// Override the listen address, e.g. 127.0.0.1:6660.
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Override the data directory.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Override the default provider used for unrecognized hosts.
    #[arg(long)]
    pub default_provider: Option<String>,
}

impl Config {
    /// Load `<data_dir>/config.toml` if present, apply CLI overrides, and
    /// ensure the data directory exists with owner-only permissions.
    pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        if let Some(data_dir) = &cli.data_dir {
            config.data_dir = data_dir.clone();
        }

        let config_path = config.data_dir.join("config.toml");
        if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::MasterKey {
                path: config_path.clone(),
                source,
            })?;
            let from_file: Config = toml::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(error = %err, path = %config_path.display(), "ignoring malformed config file, using defaults");
                config.clone()
            });
            config = from_file;
        }

        if let Some(data_dir) = &cli.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(listen) = cli.listen {
            config.listen = listen;
        }
        if let Some(provider) = &cli.default_provider {
            config.default_provider = provider.clone();
        }

        ensure_data_dir(&config.data_dir)?;
        Ok(config)
    }
}

fn ensure_data_dir(path: &PathBuf) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|source| ConfigError::MasterKey {
        path: path.clone(),
        source,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        std::fs::set_permissions(path, perms).map_err(|source| ConfigError::MasterKey {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Path to the `enabled` sentinel file: its presence gates whether the
/// dispatcher transforms bodies at all, or simply forwards them.
pub fn enabled_sentinel_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("enabled")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_loopback() {
        let config = Config::default();
        assert!(config.listen.ip().is_loopback());
        assert_eq!(config.listen.port(), DEFAULT_PORT);
    }
}
