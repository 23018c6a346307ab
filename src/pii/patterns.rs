// SPDX-License-Identifier: EUPL-1.2

//! Static pattern catalog, compiled once at startup.
//!
//! Patterns are written so that either (a) the whole match is the PII, or
//! (b) a single capture group identifies the PII inside a contextual
//! anchor (e.g. `account#12345678` — only the digits are the secret, the
//! word `account` is the anchor that raises confidence). Rust's `regex`
//! crate has no lookaround or backreferences, so a couple of patterns
//! ported from the original Python catalog drop context exclusions that
//! relied on them (see DESIGN.md).

use crate::error::ConfigError;
use crate::pii::kinds::PiiKind;
use regex::Regex;

/// A compiled detector: a kind tag plus the regex that recognizes it.
pub struct Pattern {
    pub kind: PiiKind,
    pub regex: Regex,
    pub confidence: f32,
}

impl Pattern {
    fn new(kind: PiiKind, source: &str, confidence: f32) -> Result<Pattern, ConfigError> {
        let regex = Regex::new(source).map_err(|source| ConfigError::PatternCompile {
            kind: kind.code(),
            source,
        })?;
        Ok(Pattern {
            kind,
            regex,
            confidence,
        })
    }

    /// True when the regex carries a capture group identifying the PII
    /// within a broader contextual match (see module docs).
    pub fn has_capture_group(&self) -> bool {
        self.regex.captures_len() > 1
    }
}

/// The full, ordered catalog of patterns. Order only matters for tie-break
/// determinism when two patterns start at the same offset; overlap
/// resolution in [`crate::pii::Detector`] is what actually decides which
/// span wins.
pub struct PatternRegistry {
    pub patterns: Vec<Pattern>,
}

impl PatternRegistry {
    /// Build the registry from the static catalog. A malformed pattern is a
    /// fatal configuration error — detection itself can never fail once
    /// this returns `Ok`.
    pub fn new() -> Result<PatternRegistry, ConfigError> {
        let catalog: &[(PiiKind, &str)] = &[
            (PiiKind::Email, r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
            (
                PiiKind::Phone,
                r"(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b",
            ),
            (PiiKind::Ssn, r"\b[0-9]{3}[-\s]?[0-9]{2}[-\s]?[0-9]{4}\b"),
            (
                PiiKind::Passport,
                r"(?i)\bpassport[#:\s]*([A-Z]{1,2}[0-9]{6,9}|[0-9]{9})\b",
            ),
            (
                PiiKind::DriversLicense,
                r"(?i)\b(?:DL|D\.?L\.?|License)[#:\s]*([A-Z]?[0-9]{5,12})\b",
            ),
            (
                PiiKind::DateOfBirth,
                r"(?i)\b(?:DOB|D\.?O\.?B\.?|birth\s*date|date\s*of\s*birth)[:\s]*(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})\b",
            ),
            (
                PiiKind::CreditCard,
                concat!(
                    r"\b(?:",
                    r"4[0-9]{3}[-\s]?[0-9]{4}[-\s]?[0-9]{4}[-\s]?[0-9]{4}|",
                    r"4[0-9]{12}(?:[0-9]{3})?|",
                    r"5[1-5][0-9]{2}[-\s]?[0-9]{4}[-\s]?[0-9]{4}[-\s]?[0-9]{4}|",
                    r"5[1-5][0-9]{14}|",
                    r"3[47][0-9]{2}[-\s]?[0-9]{6}[-\s]?[0-9]{5}|",
                    r"3[47][0-9]{13}|",
                    r"6(?:011|5[0-9]{2})[-\s]?[0-9]{4}[-\s]?[0-9]{4}[-\s]?[0-9]{4}|",
                    r"6(?:011|5[0-9]{2})[0-9]{12}",
                    r")\b",
                ),
            ),
            (
                PiiKind::BankAccount,
                r"(?i)\b(?:account|acct)[#:\s]*([0-9]{8,17})\b",
            ),
            (
                PiiKind::Iban,
                r"\b[A-Z]{2}[0-9]{2}[A-Z0-9]{4}[0-9]{7}(?:[A-Z0-9]{0,16})?\b",
            ),
            (
                PiiKind::RoutingNumber,
                r"(?i)\b(?:routing|ABA)[#:\s]*([0-9]{9})\b",
            ),
            (
                PiiKind::TaxId,
                r"(?i)\b(?:tax\s*id|TIN|taxpayer)[#:\s]*([0-9]{2}[-\s]?[0-9]{7})\b",
            ),
            (PiiKind::VatNumber, r"(?i)\bVAT[#:\s]*([A-Z]{2}[A-Z0-9]{8,12})\b"),
            (
                PiiKind::MedicalRecord,
                r"(?i)\b(?:MRN|medical\s*record|patient\s*(?:id|number))[#:\s]*([A-Z0-9]{6,15})\b",
            ),
            (
                PiiKind::HealthInsurance,
                r"(?i)\b(?:member\s*id|insurance\s*id|policy\s*(?:number|#)|subscriber\s*id)[#:\s]*([A-Z0-9]{6,20})\b",
            ),
            (PiiKind::DeaNumber, r"\b(?:DEA[#:\s]*)?([A-Z][A-Z9][0-9]{7})\b"),
            (PiiKind::Npi, r"(?i)\bNPI[#:\s]*([0-9]{10})\b"),
            (
                PiiKind::IcdCode,
                r"(?i)\b(?:ICD[-\s]?10?|diagnosis)[:\s]*([A-Z][0-9]{2}(?:\.[0-9A-Z]{1,4})?)\b",
            ),
            (
                PiiKind::NdcCode,
                r"\bNDC[#:\s]*([0-9]{4,5}[-\s]?[0-9]{3,4}[-\s]?[0-9]{1,2})\b",
            ),
            (
                PiiKind::CaseNumber,
                r"(?i)\b(?:case|docket)[#:\s]*(\d{1,2}[-:](?:cv|cr|mc)[-:]\d{3,6}(?:[-:][A-Z]{2,4})?)\b",
            ),
            (
                PiiKind::BarNumber,
                r"(?i)\b(?:bar|attorney)[#:\s]*([A-Z]{0,2}[0-9]{5,8})\b",
            ),
            (
                PiiKind::CourtDocket,
                r"(?i)\bdocket[#:\s]*([0-9]{2}-[A-Z]{2,4}-[0-9]{3,7})\b",
            ),
            (
                PiiKind::Ein,
                r"(?i)\b(?:EIN|employer\s*id)[#:\s]*([0-9]{2}[-\s]?[0-9]{7})\b",
            ),
            (
                PiiKind::DunsNumber,
                r"(?i)\b(?:DUNS|D-U-N-S)[#:\s]*([0-9]{2}[-\s]?[0-9]{3}[-\s]?[0-9]{4})\b",
            ),
            (
                PiiKind::ApiKey,
                r"\bsk-ant-(?:api\d{2}-)?[A-Za-z0-9_-]{20,}\b",
            ),
            (
                PiiKind::OpenAiKey,
                r"\bsk-[A-Za-z0-9]{32,}(?:-[A-Za-z0-9]+)?\b",
            ),
            (PiiKind::GoogleKey, r"\bAIza[A-Za-z0-9_-]{35}\b"),
            (
                PiiKind::StripeKey,
                r"\b(?:sk|pk|rk)_(?:live|test)_[A-Za-z0-9]{24,}\b",
            ),
            (PiiKind::AwsKey, r"\b(?:AKIA|ABIA|ACCA|ASIA)[A-Z0-9]{16}\b"),
            (
                PiiKind::PrivateKey,
                r"-----BEGIN (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----[\s\S]*?-----END (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----",
            ),
            (
                PiiKind::Password,
                r#"(?i)(?:password|passwd|pwd|secret|token)\s*[=:]\s*"?([^\s"]{8,})"?"#,
            ),
            (
                PiiKind::IpAddress,
                concat!(
                    r"\b(?:10\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}|",
                    r"172\.(?:1[6-9]|2[0-9]|3[01])\.[0-9]{1,3}\.[0-9]{1,3}|",
                    r"192\.168\.[0-9]{1,3}\.[0-9]{1,3})\b",
                ),
            ),
            (
                PiiKind::MacAddress,
                r"\b(?:[0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}\b",
            ),
            (
                PiiKind::JwtToken,
                r"\beyJ[A-Za-z0-9_-]*\.eyJ[A-Za-z0-9_-]*\.[A-Za-z0-9_-]*\b",
            ),
            (
                PiiKind::GithubToken,
                r"\b(?:ghp|gho|ghu|ghs|ghr)_[A-Za-z0-9]{36,}\b",
            ),
            (PiiKind::SlackToken, r"\bxox[baprs]-[A-Za-z0-9-]{10,}\b"),
            (
                PiiKind::DatabaseUrl,
                r"(?i)(?:postgres|mysql|mongodb|redis|mssql|oracle)(?:ql)?://[^:]+:[^@]+@\S+",
            ),
            (
                PiiKind::Secret,
                r#"(?im)(?:^|\s)(?:SECRET|TOKEN|KEY|APIKEY|API_KEY|AUTH|CREDENTIAL)[_A-Z]*\s*[=:]\s*"?([A-Za-z0-9_/+=-]{16,})"?"#,
            ),
        ];

        let patterns = catalog
            .iter()
            .map(|(kind, source)| Pattern::new(*kind, source, 0.95))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PatternRegistry { patterns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_compiles_and_covers_every_kind() {
        let registry = PatternRegistry::new().unwrap();
        assert_eq!(registry.patterns.len(), PiiKind::ALL.len());
        for kind in PiiKind::ALL {
            assert!(registry.patterns.iter().any(|p| p.kind == *kind));
        }
    }
}
