// SPDX-License-Identifier: EUPL-1.2

use privacyguardian::providers::ProviderRegistry;

#[test]
fn every_catalog_provider_resolves_to_itself() {
    let registry = ProviderRegistry::new();
    for provider in registry.all() {
        for domain in provider.domains {
            let probe = domain.strip_prefix("*.").map(|s| format!("sub.{s}")).unwrap_or_else(|| domain.to_string());
            let resolved = registry.resolve(&probe).unwrap_or_else(|| panic!("{domain} did not resolve"));
            assert_eq!(resolved.name, provider.name);
        }
    }
}

#[test]
fn generic_content_fields_cover_common_request_shapes() {
    use privacyguardian::providers::GENERIC_CONTENT_FIELDS;
    for field in ["content", "text", "prompt", "message", "input", "query"] {
        assert!(GENERIC_CONTENT_FIELDS.contains(&field));
    }
}
