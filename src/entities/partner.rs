// 🤝 Partner Entity - business partner (supplier) record
//
// "bp_code is IDENTITY, parent_bp_code is a VALUE that drifts"
//
// Problem solved:
// - Legacy import created "SLAPMTI-1", "SLAPMTI-2" next to "SLAPMTI"
// - parent_bp_code is supposed to link every suffixed child to its base
// - The link was backfilled after the fact and is not always right,
//   so the record knows what its parent SHOULD be

use crate::code;
use serde::{Deserialize, Serialize};

// ============================================================================
// PARTNER ENTITY
// ============================================================================

/// Business partner record
///
/// Intended invariant (not enforced by storage):
/// - suffixed `bp_code`  → `parent_bp_code == base_code(bp_code)`
/// - canonical `bp_code` → `parent_bp_code == None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    /// Primary key, stored normalized
    pub bp_code: String,

    /// Base partner for legacy suffixed codes
    #[serde(default)]
    pub parent_bp_code: Option<String>,

    #[serde(default)]
    pub bp_name: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

impl Partner {
    /// New partner with no parent link and no descriptive fields
    pub fn new(bp_code: &str) -> Self {
        Partner {
            bp_code: code::normalize(bp_code),
            parent_bp_code: None,
            bp_name: None,
            address: None,
            email: None,
        }
    }

    /// Set the parent link (builder style, used by imports and tests)
    pub fn with_parent(mut self, parent_bp_code: &str) -> Self {
        self.parent_bp_code = Some(code::normalize(parent_bp_code));
        self
    }

    pub fn with_name(mut self, bp_name: &str) -> Self {
        self.bp_name = Some(bp_name.to_string());
        self
    }

    /// True for legacy "-N" codes
    pub fn is_old_system(&self) -> bool {
        code::is_suffixed(&self.bp_code)
    }

    /// Canonical code this partner belongs to
    pub fn base_code(&self) -> String {
        code::base_code(&self.bp_code)
    }

    /// What `parent_bp_code` should hold according to the code itself
    pub fn expected_parent(&self) -> Option<String> {
        if self.is_old_system() {
            Some(self.base_code())
        } else {
            None
        }
    }

    /// Does the stored parent agree with the code?
    pub fn has_consistent_parent(&self) -> bool {
        self.parent_bp_code == self.expected_parent()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_new_normalizes_code() {
        let partner = Partner::new("  slapmti-1 ");

        assert_eq!(partner.bp_code, "SLAPMTI-1");
        assert!(partner.parent_bp_code.is_none());
        assert!(partner.is_old_system());
    }

    #[test]
    fn test_expected_parent() {
        assert_eq!(
            Partner::new("SLAPMTI-2").expected_parent(),
            Some("SLAPMTI".to_string())
        );
        assert_eq!(Partner::new("SLAPMTI").expected_parent(), None);
    }

    #[test]
    fn test_consistent_parent() {
        assert!(Partner::new("SLAPMTI").has_consistent_parent());
        assert!(Partner::new("SLAPMTI-1")
            .with_parent("SLAPMTI")
            .has_consistent_parent());

        // Missing backfill
        assert!(!Partner::new("SLAPMTI-1").has_consistent_parent());

        // Wrong parent
        assert!(!Partner::new("SLAPMTI-1")
            .with_parent("SLAPMTI-2")
            .has_consistent_parent());

        // Canonical code pointing somewhere
        assert!(!Partner::new("SLAPMTI")
            .with_parent("OTHER")
            .has_consistent_parent());
    }
}
