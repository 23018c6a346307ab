// SPDX-License-Identifier: EUPL-1.2

use serde::{Deserialize, Serialize};

/// Closed catalog of PII/secret categories the detector recognizes.
///
/// The `code()` string is part of the token wire format (`◈PG:<KIND4>_<HASH12>◈`)
/// — adding a variant is a schema change, never a silent rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PiiKind {
    Email,
    Phone,
    Ssn,
    Passport,
    DriversLicense,
    DateOfBirth,
    CreditCard,
    BankAccount,
    Iban,
    RoutingNumber,
    TaxId,
    VatNumber,
    MedicalRecord,
    HealthInsurance,
    DeaNumber,
    Npi,
    IcdCode,
    NdcCode,
    CaseNumber,
    BarNumber,
    CourtDocket,
    Ein,
    DunsNumber,
    ApiKey,
    OpenAiKey,
    GoogleKey,
    StripeKey,
    AwsKey,
    PrivateKey,
    Password,
    IpAddress,
    MacAddress,
    JwtToken,
    GithubToken,
    SlackToken,
    DatabaseUrl,
    Secret,
}

impl PiiKind {
    /// All 37 catalog kinds, in detector registration order.
    pub const ALL: &'static [PiiKind] = &[
        PiiKind::Email,
        PiiKind::Phone,
        PiiKind::Ssn,
        PiiKind::Passport,
        PiiKind::DriversLicense,
        PiiKind::DateOfBirth,
        PiiKind::CreditCard,
        PiiKind::BankAccount,
        PiiKind::Iban,
        PiiKind::RoutingNumber,
        PiiKind::TaxId,
        PiiKind::VatNumber,
        PiiKind::MedicalRecord,
        PiiKind::HealthInsurance,
        PiiKind::DeaNumber,
        PiiKind::Npi,
        PiiKind::IcdCode,
        PiiKind::NdcCode,
        PiiKind::CaseNumber,
        PiiKind::BarNumber,
        PiiKind::CourtDocket,
        PiiKind::Ein,
        PiiKind::DunsNumber,
        PiiKind::ApiKey,
        PiiKind::OpenAiKey,
        PiiKind::GoogleKey,
        PiiKind::StripeKey,
        PiiKind::AwsKey,
        PiiKind::PrivateKey,
        PiiKind::Password,
        PiiKind::IpAddress,
        PiiKind::MacAddress,
        PiiKind::JwtToken,
        PiiKind::GithubToken,
        PiiKind::SlackToken,
        PiiKind::DatabaseUrl,
        PiiKind::Secret,
    ];

    /// Stable schema code, e.g. `"EMAIL"`, `"CREDIT_CARD"`.
    pub fn code(self) -> &'static str {
        match self {
            PiiKind::Email => "EMAIL",
            PiiKind::Phone => "PHONE",
            PiiKind::Ssn => "SSN",
            PiiKind::Passport => "PASSPORT",
            PiiKind::DriversLicense => "DRV_LIC",
            PiiKind::DateOfBirth => "DOB",
            PiiKind::CreditCard => "CREDIT_CARD",
            PiiKind::BankAccount => "BANK_ACCT",
            PiiKind::Iban => "IBAN",
            PiiKind::RoutingNumber => "ROUTING",
            PiiKind::TaxId => "TAX_ID",
            PiiKind::VatNumber => "VAT",
            PiiKind::MedicalRecord => "MRN",
            PiiKind::HealthInsurance => "HEALTH_INS",
            PiiKind::DeaNumber => "DEA",
            PiiKind::Npi => "NPI",
            PiiKind::IcdCode => "ICD",
            PiiKind::NdcCode => "NDC",
            PiiKind::CaseNumber => "CASE_NUM",
            PiiKind::BarNumber => "BAR_NUM",
            PiiKind::CourtDocket => "DOCKET",
            PiiKind::Ein => "EIN",
            PiiKind::DunsNumber => "DUNS",
            PiiKind::ApiKey => "API_KEY",
            PiiKind::OpenAiKey => "OPENAI_KEY",
            PiiKind::GoogleKey => "GOOGLE_KEY",
            PiiKind::StripeKey => "STRIPE_KEY",
            PiiKind::AwsKey => "AWS_KEY",
            PiiKind::PrivateKey => "PRIVATE_KEY",
            PiiKind::Password => "PASSWORD",
            PiiKind::IpAddress => "IP_ADDRESS",
            PiiKind::MacAddress => "MAC_ADDRESS",
            PiiKind::JwtToken => "JWT_TOKEN",
            PiiKind::GithubToken => "GITHUB_TOKEN",
            PiiKind::SlackToken => "SLACK_TOKEN",
            PiiKind::DatabaseUrl => "DATABASE_URL",
            PiiKind::Secret => "SECRET",
        }
    }

    /// Look up a kind by its schema code (case-sensitive). Used when
    /// reconstructing a `PiiKind` from a vault row or an observed token.
    pub fn from_code(code: &str) -> Option<PiiKind> {
        PiiKind::ALL.iter().copied().find(|k| k.code() == code)
    }

    /// First four non-underscore characters of `code()`, uppercased — the
    /// `<KIND4>` segment of the token wire format. Shorter for kinds whose
    /// code has fewer than four letters (e.g. `SSN`, `DOB`, `IBAN` has
    /// exactly four).
    pub fn token_kind4(self) -> String {
        self.code()
            .chars()
            .filter(|c| *c != '_')
            .take(4)
            .collect()
    }
}

impl std::fmt::Display for PiiKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_roundtrips_through_its_code() {
        for kind in PiiKind::ALL {
            assert_eq!(PiiKind::from_code(kind.code()), Some(*kind));
        }
    }

    #[test]
    fn kind4_is_at_most_four_uppercase_letters() {
        for kind in PiiKind::ALL {
            let k4 = kind.token_kind4();
            assert!(!k4.is_empty());
            assert!(k4.len() <= 4);
            assert!(k4.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn short_codes_are_not_truncated() {
        assert_eq!(PiiKind::Ssn.token_kind4(), "SSN");
        assert_eq!(PiiKind::DateOfBirth.token_kind4(), "DOB");
        assert_eq!(PiiKind::Iban.token_kind4(), "IBAN");
    }
}
