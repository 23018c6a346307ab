// SPDX-License-Identifier: EUPL-1.2

//! Turns the static pattern catalog into an ordered, non-overlapping list
//! of spans: find every match from every pattern, then resolve overlaps
//! deterministically (leftmost-longest wins, first-registered kind breaks
//! remaining ties).

use crate::error::ConfigError;
use crate::pii::kinds::PiiKind;
use crate::pii::patterns::PatternRegistry;

/// A detected PII occurrence in some input string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub kind: PiiKind,
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// The matched substring, borrowed from whatever text produced it.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Stateless once built: owns the compiled catalog, exposes `detect`.
pub struct Detector {
    registry: PatternRegistry,
}

impl Detector {
    pub fn new() -> Result<Detector, ConfigError> {
        Ok(Detector {
            registry: PatternRegistry::new()?,
        })
    }

    /// Find every PII span in `text`, sorted by start offset with no two
    /// spans overlapping.
    ///
    /// Candidates from all patterns are gathered first, then sorted by
    /// `(start ascending, end descending)` so that, among matches starting
    /// at the same offset, the longest is considered first. A greedy walk
    /// then accepts a candidate only if it starts at or after the end of
    /// the last accepted span — the leftmost-longest resolution described
    /// in the proxy's detector design notes.
    pub fn detect(&self, text: &str) -> Vec<Span> {
        let mut candidates: Vec<Span> = Vec::new();

        for pattern in &self.registry.patterns {
            for captures in pattern.regex.captures_iter(text) {
                let m = captures
                    .get(1)
                    .or_else(|| captures.get(0))
                    .expect("capture group 0 always matches");
                candidates.push(Span {
                    kind: pattern.kind,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        candidates.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut accepted: Vec<Span> = Vec::new();
        let mut cursor = 0usize;
        for candidate in candidates {
            if candidate.start >= cursor {
                cursor = candidate.end;
                accepted.push(candidate);
            }
        }

        accepted
    }
}
