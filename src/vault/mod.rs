// SPDX-License-Identifier: EUPL-1.2

//! The token vault: a single-writer SQLite store mapping tokens to their
//! encrypted original values, plus an append-only activity log of the
//! first time each distinct value was ever seen.

use crate::crypto::CryptoCore;
use crate::error::ConfigError;
use crate::pii::PiiKind;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

/// One row of the vault: a token's metadata without its decrypted value.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub token_id: String,
    pub kind: PiiKind,
    pub provider: String,
    pub first_seen: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub use_count: u64,
}

/// One row of the activity log: a redacted record of a first-intern event.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub token_id: String,
    pub kind: PiiKind,
    pub provider: String,
    pub masked_value: String,
    pub at: DateTime<Utc>,
}

/// Aggregate counters for the control surface's `/stats` endpoint.
#[derive(Debug, Clone, Default)]
pub struct VaultStats {
    pub total_tokens: u64,
    pub total_uses: u64,
    pub by_kind: Vec<(PiiKind, u64)>,
    pub by_provider: Vec<(String, u64)>,
}

/// Implemented by anything that wants to observe first-intern events —
/// the activity log is the built-in sink, but this seam is what lets a
/// future notifier hook in without the vault depending on it directly.
pub trait ActivitySink: Send + Sync {
    fn record(&self, record: &ActivityRecord);
}

/// SQLite-backed, mutex-serialized vault. A single writer keeps the
/// "exactly one first-intern event per (value, kind)" invariant simple:
/// every `intern` call holds the lock for its whole read-modify-write.
pub struct TokenVault {
    conn: Mutex<Connection>,
    crypto: CryptoCore,
}

impl TokenVault {
    pub fn open(path: &Path, crypto: CryptoCore) -> Result<TokenVault, ConfigError> {
        let conn = Connection::open(path).map_err(|source| ConfigError::VaultOpen {
            path: path.to_path_buf(),
            source,
        })?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tokens (
                token_id    TEXT PRIMARY KEY,
                kind        TEXT NOT NULL,
                provider    TEXT NOT NULL,
                ciphertext  BLOB NOT NULL,
                first_seen  TEXT NOT NULL,
                last_used   TEXT NOT NULL,
                use_count   INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS activity_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                token_id    TEXT NOT NULL,
                kind        TEXT NOT NULL,
                provider    TEXT NOT NULL,
                masked      TEXT NOT NULL,
                at          TEXT NOT NULL
             );",
        )
        .map_err(|source| ConfigError::VaultOpen {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(TokenVault {
            conn: Mutex::new(conn),
            crypto,
        })
    }

    /// The wire ABI's `<HASH12>`: the first 12 hex characters of
    /// `SHA-256(value)`, over the value alone.
    fn content_hash(value: &str) -> String {
        let digest = Sha256::digest(value.as_bytes());
        hex::encode(&digest[..6])
    }

    /// Deterministic vault primary key for `(value, kind)`: `<KIND4>_<HASH12>`,
    /// the same string that appears inside a wire token after `PG:`. Kind
    /// is folded in here, not into the hash input, so `<HASH12>` alone
    /// still matches the wire ABI's `sha256(value)[:12]`. Two kinds whose
    /// `token_kind4()` collide (`PASSWORD`/`PASSPORT` both truncate to
    /// `PASS`) only alias if they also hash the same literal value under
    /// that shared prefix — tolerated, not specifically guarded against.
    pub fn token_id_for(value: &str, kind: PiiKind) -> String {
        format!("{}_{}", kind.token_kind4(), Self::content_hash(value))
    }

    /// Mask a plaintext value for the activity log: first 3 and last 3
    /// characters survive, the middle is replaced with `***`; values of
    /// six characters or fewer are masked entirely.
    fn mask(value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= 6 {
            return "***".to_string();
        }
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{head}***{tail}")
    }

    /// Intern `value` under `kind`, returning its token id and whether
    /// this call created a brand new vault row. A new row is always
    /// accompanied by exactly one activity log entry; a repeat lookup
    /// only bumps `last_used`/`use_count` and logs nothing.
    pub fn intern(
        &self,
        value: &str,
        kind: PiiKind,
        provider: &str,
    ) -> Result<(String, bool), ConfigError> {
        let token_id = Self::token_id_for(value, kind);
        let now = Utc::now();
        let conn = self.conn.lock().expect("vault mutex poisoned");

        let existing: Option<u64> = conn
            .query_row(
                "SELECT use_count FROM tokens WHERE token_id = ?1",
                params![token_id],
                |row| row.get(0),
            )
            .optional()
            .expect("vault lookup never fails on a well-formed store");

        match existing {
            Some(count) => {
                conn.execute(
                    "UPDATE tokens SET last_used = ?1, use_count = ?2 WHERE token_id = ?3",
                    params![now.to_rfc3339(), count + 1, token_id],
                )
                .expect("vault update never fails on a well-formed store");
                Ok((token_id, false))
            }
            None => {
                let ciphertext = self.crypto.encrypt(value.as_bytes());
                conn.execute(
                    "INSERT INTO tokens (token_id, kind, provider, ciphertext, first_seen, last_used, use_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5, 1)",
                    params![token_id, kind.code(), provider, ciphertext, now.to_rfc3339()],
                )
                .expect("vault insert never fails on a well-formed store");

                let masked = Self::mask(value);
                conn.execute(
                    "INSERT INTO activity_log (token_id, kind, provider, masked, at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![token_id, kind.code(), provider, masked, now.to_rfc3339()],
                )
                .expect("activity log insert never fails on a well-formed store");

                Ok((token_id, true))
            }
        }
    }

    /// Decrypt the original value behind `token_id`, if it exists.
    pub fn lookup(&self, token_id: &str) -> Option<String> {
        let conn = self.conn.lock().expect("vault mutex poisoned");
        let ciphertext: Option<Vec<u8>> = conn
            .query_row(
                "SELECT ciphertext FROM tokens WHERE token_id = ?1",
                params![token_id],
                |row| row.get(0),
            )
            .optional()
            .expect("vault lookup never fails on a well-formed store");

        let ciphertext = ciphertext?;
        let plaintext = self.crypto.decrypt(&ciphertext).or_else(|| {
            tracing::warn!(error = %crate::error::GuardianError::Decrypt, token_id, "failed to decrypt stored token");
            None
        })?;
        String::from_utf8(plaintext).ok()
    }

    /// Aggregate counters for the control surface.
    pub fn stats(&self) -> VaultStats {
        let conn = self.conn.lock().expect("vault mutex poisoned");
        let total_tokens: u64 = conn
            .query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))
            .unwrap_or(0);
        let total_uses: u64 = conn
            .query_row("SELECT COALESCE(SUM(use_count), 0) FROM tokens", [], |row| row.get(0))
            .unwrap_or(0);

        let mut stmt = conn
            .prepare("SELECT kind, COUNT(*) FROM tokens GROUP BY kind")
            .expect("valid statement");
        let by_kind = stmt
            .query_map([], |row| {
                let code: String = row.get(0)?;
                let count: u64 = row.get(1)?;
                Ok((code, count))
            })
            .expect("valid query")
            .filter_map(|r| r.ok())
            .filter_map(|(code, count)| PiiKind::from_code(&code).map(|k| (k, count)))
            .collect();

        let mut provider_stmt = conn
            .prepare("SELECT provider, COUNT(*) FROM activity_log GROUP BY provider")
            .expect("valid statement");
        let by_provider = provider_stmt
            .query_map([], |row| {
                let provider: String = row.get(0)?;
                let count: u64 = row.get(1)?;
                Ok((provider, count))
            })
            .expect("valid query")
            .filter_map(|r| r.ok())
            .collect();

        VaultStats {
            total_tokens,
            total_uses,
            by_kind,
            by_provider,
        }
    }

    /// The most recent activity entries, newest first, capped at `limit`.
    pub fn recent_activity(&self, limit: u32) -> Vec<ActivityRecord> {
        let conn = self.conn.lock().expect("vault mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT token_id, kind, provider, masked, at FROM activity_log
                 ORDER BY id DESC LIMIT ?1",
            )
            .expect("valid statement");

        stmt.query_map(params![limit], |row| {
            let code: String = row.get(1)?;
            let at: String = row.get(4)?;
            Ok((
                row.get::<_, String>(0)?,
                code,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                at,
            ))
        })
        .expect("valid query")
        .filter_map(|r| r.ok())
        .filter_map(|(token_id, code, provider, masked_value, at)| {
            Some(ActivityRecord {
                token_id,
                kind: PiiKind::from_code(&code)?,
                provider,
                masked_value,
                at: DateTime::parse_from_rfc3339(&at).ok()?.with_timezone(&Utc),
            })
        })
        .collect()
    }
}

impl ActivitySink for TokenVault {
    fn record(&self, _record: &ActivityRecord) {
        // The vault writes its own activity rows as part of `intern`;
        // this impl exists so `TokenVault` can stand in anywhere an
        // `ActivitySink` is expected without a wrapper type.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_vault(dir: &TempDir) -> TokenVault {
        let crypto = CryptoCore::load_or_create(&dir.path().join("master.key")).unwrap();
        TokenVault::open(&dir.path().join("vault.db"), crypto).unwrap()
    }

    #[test]
    fn interning_the_same_value_twice_is_stable_and_logs_once() {
        let dir = TempDir::new().unwrap();
        let vault = open_vault(&dir);

        let (id1, new1) = vault.intern("jane.doe@example.com", PiiKind::Email, "openai").unwrap();
        let (id2, new2) = vault.intern("jane.doe@example.com", PiiKind::Email, "openai").unwrap();

        assert_eq!(id1, id2);
        assert!(new1);
        assert!(!new2);
        assert_eq!(vault.recent_activity(10).len(), 1);
    }

    #[test]
    fn different_kinds_for_the_same_text_get_different_tokens() {
        let dir = TempDir::new().unwrap();
        let vault = open_vault(&dir);
        let (id1, _) = vault.intern("123456789", PiiKind::Npi, "openai").unwrap();
        let (id2, _) = vault.intern("123456789", PiiKind::RoutingNumber, "openai").unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn hash_segment_is_sha256_of_the_value_alone() {
        let mut hasher = Sha256::new();
        hasher.update(b"alice@example.com");
        let expected = hex::encode(&hasher.finalize()[..6]);
        assert_eq!(
            TokenVault::token_id_for("alice@example.com", PiiKind::Email),
            format!("EMAI_{expected}")
        );
    }

    #[test]
    fn lookup_round_trips_the_plaintext() {
        let dir = TempDir::new().unwrap();
        let vault = open_vault(&dir);
        let (token_id, _) = vault.intern("4111111111111111", PiiKind::CreditCard, "anthropic").unwrap();
        assert_eq!(vault.lookup(&token_id).unwrap(), "4111111111111111");
    }

    #[test]
    fn lookup_of_unknown_token_is_none() {
        let dir = TempDir::new().unwrap();
        let vault = open_vault(&dir);
        assert!(vault.lookup("deadbeefcafe").is_none());
    }

    #[test]
    fn short_values_are_fully_masked() {
        assert_eq!(TokenVault::mask("ab12"), "***");
        assert_eq!(TokenVault::mask("abcdef"), "***");
    }

    #[test]
    fn long_values_keep_three_characters_on_each_side() {
        assert_eq!(TokenVault::mask("jane.doe@example.com"), "jan***com");
    }

    #[test]
    fn stats_reflect_interned_values() {
        let dir = TempDir::new().unwrap();
        let vault = open_vault(&dir);
        vault.intern("a@b.com", PiiKind::Email, "openai").unwrap();
        vault.intern("c@d.com", PiiKind::Email, "anthropic").unwrap();
        let stats = vault.stats();
        assert_eq!(stats.total_tokens, 2);
        assert_eq!(stats.total_uses, 2);
        assert_eq!(stats.by_provider.iter().find(|(p, _)| p == "openai").unwrap().1, 1);
        assert_eq!(stats.by_provider.iter().find(|(p, _)| p == "anthropic").unwrap().1, 1);
    }
}
