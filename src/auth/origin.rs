//! Origin fingerprint comparison for refresh exchanges.
//!
//! A fingerprint is the network address plus the client signature (the
//! user-agent string) captured when a refresh token is issued. On exchange
//! the recorded fingerprint is compared against the presenting request's.

use serde::{Deserialize, Serialize};

/// Where a refresh token was issued from. Both components are optional:
/// proxies may hide the address and clients may omit an agent string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginFingerprint {
    pub address: Option<String>,
    pub agent: Option<String>,
}

impl OriginFingerprint {
    #[must_use]
    pub fn new(address: Option<String>, agent: Option<String>) -> Self {
        Self { address, agent }
    }
}

impl std::fmt::Display for OriginFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}",
            self.address.as_deref().unwrap_or("-"),
            self.agent.as_deref().unwrap_or("-")
        )
    }
}

/// How strictly recorded and presented fingerprints must agree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Mismatch only when both components are present on both sides and
    /// both differ. Mobile clients change addresses routinely, so a
    /// divergent address alone is tolerated.
    #[default]
    Flexible,
    /// Every component recorded at issuance must be present and equal on
    /// the presenting request.
    Strict,
}

/// Compare the fingerprint recorded at issuance against the request's.
#[must_use]
pub fn matches(
    recorded: &OriginFingerprint,
    presented: &OriginFingerprint,
    policy: OriginPolicy,
) -> bool {
    match policy {
        OriginPolicy::Flexible => {
            let address_differs = component_differs(&recorded.address, &presented.address);
            let agent_differs = component_differs(&recorded.agent, &presented.agent);
            !(address_differs && agent_differs)
        }
        OriginPolicy::Strict => {
            component_matches_strict(&recorded.address, &presented.address)
                && component_matches_strict(&recorded.agent, &presented.agent)
        }
    }
}

/// A component differs only when present on both sides and unequal.
fn component_differs(recorded: &Option<String>, presented: &Option<String>) -> bool {
    match (recorded, presented) {
        (Some(recorded), Some(presented)) => recorded != presented,
        _ => false,
    }
}

/// Strict mode: a recorded component must reappear unchanged. Components
/// never recorded are not required.
fn component_matches_strict(recorded: &Option<String>, presented: &Option<String>) -> bool {
    match (recorded, presented) {
        (Some(recorded), Some(presented)) => recorded == presented,
        (Some(_), None) => false,
        (None, _) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(address: Option<&str>, agent: Option<&str>) -> OriginFingerprint {
        OriginFingerprint::new(address.map(str::to_string), agent.map(str::to_string))
    }

    #[test]
    fn flexible_tolerates_address_change_alone() {
        let recorded = fp(Some("10.0.0.1"), Some("app/1.0"));
        let presented = fp(Some("10.0.0.99"), Some("app/1.0"));
        assert!(matches(&recorded, &presented, OriginPolicy::Flexible));
    }

    #[test]
    fn flexible_flags_when_both_components_differ() {
        let recorded = fp(Some("10.0.0.1"), Some("app/1.0"));
        let presented = fp(Some("10.0.0.99"), Some("other/2.0"));
        assert!(!matches(&recorded, &presented, OriginPolicy::Flexible));
    }

    #[test]
    fn flexible_treats_missing_components_as_match() {
        let recorded = fp(None, None);
        let presented = fp(Some("10.0.0.99"), Some("other/2.0"));
        assert!(matches(&recorded, &presented, OriginPolicy::Flexible));

        let recorded = fp(Some("10.0.0.1"), None);
        let presented = fp(Some("10.0.0.99"), Some("other/2.0"));
        assert!(matches(&recorded, &presented, OriginPolicy::Flexible));
    }

    #[test]
    fn strict_requires_recorded_components_to_reappear() {
        let recorded = fp(Some("10.0.0.1"), Some("app/1.0"));
        assert!(!matches(
            &recorded,
            &fp(Some("10.0.0.99"), Some("app/1.0")),
            OriginPolicy::Strict
        ));
        assert!(!matches(
            &recorded,
            &fp(Some("10.0.0.1"), None),
            OriginPolicy::Strict
        ));
        assert!(matches(
            &recorded,
            &fp(Some("10.0.0.1"), Some("app/1.0")),
            OriginPolicy::Strict
        ));
    }

    #[test]
    fn strict_ignores_components_never_recorded() {
        let recorded = fp(None, Some("app/1.0"));
        let presented = fp(Some("10.0.0.5"), Some("app/1.0"));
        assert!(matches(&recorded, &presented, OriginPolicy::Strict));
    }

    #[test]
    fn display_marks_missing_components() {
        assert_eq!(fp(None, Some("app/1.0")).to_string(), "-/app/1.0");
    }
}
