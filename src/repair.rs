// 🔧 Parent-Link Repair - recompute parent_bp_code from the code itself
//
// The parent link was backfilled after the legacy import. Some rows never got
// it, some got the wrong one. The code carries enough information to say what
// the link SHOULD be:
//
//   suffixed  SLAPMTI-2  → parent SLAPMTI  (only if SLAPMTI exists)
//   canonical SLAPMTI    → no parent
//
// check()               → advisory findings, never writes
// repair_parent_links() → writes one correction per transaction
//
// Running the repair twice yields the same state; the second run has nothing
// to correct.

use crate::code;
use crate::entities::Partner;
use crate::error::Result;
use crate::store::{InvoiceStore, PartnerStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// FINDINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Finding {
    /// Suffixed code linked to something other than its base
    WrongParent {
        bp_code: String,
        found: String,
        expected: String,
    },

    /// Suffixed code with no parent link at all
    MissingParent { bp_code: String, expected: String },

    /// Canonical code that points at a parent
    UnexpectedParent { bp_code: String, found: String },

    /// Suffixed code whose base partner record does not exist
    MissingBaseRecord { bp_code: String, base: String },

    /// Invoice line or header referencing a code with no partner record
    UnknownPartnerReference { bp_code: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning, // Reports are incomplete until fixed
    Info,    // Worth knowing, nothing breaks
}

impl Finding {
    pub fn bp_code(&self) -> &str {
        match self {
            Finding::WrongParent { bp_code, .. }
            | Finding::MissingParent { bp_code, .. }
            | Finding::UnexpectedParent { bp_code, .. }
            | Finding::MissingBaseRecord { bp_code, .. }
            | Finding::UnknownPartnerReference { bp_code } => bp_code,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Finding::WrongParent { .. }
            | Finding::MissingBaseRecord { .. }
            | Finding::UnknownPartnerReference { .. } => Severity::Warning,
            Finding::MissingParent { .. } | Finding::UnexpectedParent { .. } => Severity::Info,
        }
    }

    /// Can repair_parent_links fix this one?
    pub fn is_repairable(&self) -> bool {
        matches!(
            self,
            Finding::WrongParent { .. }
                | Finding::MissingParent { .. }
                | Finding::UnexpectedParent { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            Finding::WrongParent {
                bp_code,
                found,
                expected,
            } => format!("{} has parent {} (expected {})", bp_code, found, expected),
            Finding::MissingParent { bp_code, expected } => {
                format!("{} has no parent (expected {})", bp_code, expected)
            }
            Finding::UnexpectedParent { bp_code, found } => {
                format!("{} is canonical but has parent {}", bp_code, found)
            }
            Finding::MissingBaseRecord { bp_code, base } => {
                format!("{} has no base record {}", bp_code, base)
            }
            Finding::UnknownPartnerReference { bp_code } => {
                format!("{} is referenced by invoices but has no partner record", bp_code)
            }
        }
    }
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub partners_scanned: usize,
    pub references_scanned: usize,
    pub findings: Vec<Finding>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity() == severity)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Partners: {}, references: {}, findings: {} ({} warnings)",
            self.partners_scanned,
            self.references_scanned,
            self.findings.len(),
            self.count(Severity::Warning)
        )
    }
}

/// One parent-link change, planned or applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub bp_code: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairReport {
    pub dry_run: bool,
    pub scanned: usize,
    /// Rows actually written (always 0 on a dry run)
    pub changed: usize,
    /// Every correction the run found, applied unless `dry_run`
    pub corrections: Vec<Correction>,
    /// Problems the repair leaves alone
    pub findings: Vec<Finding>,
}

impl RepairReport {
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "would change" } else { "changed" };
        let count = if self.dry_run {
            self.corrections.len()
        } else {
            self.changed
        };
        format!(
            "Scanned {} partners, {} {}, {} left for review",
            self.scanned,
            verb,
            count,
            self.findings.len()
        )
    }
}

// ============================================================================
// REPAIR ENGINE
// ============================================================================

pub struct RepairEngine<'a, S: PartnerStore + InvoiceStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: PartnerStore + InvoiceStore + ?Sized> RepairEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        RepairEngine { store }
    }

    /// Scan partners and invoice references; read-only
    pub fn check(&self) -> Result<ConsistencyReport> {
        let partners = self.store.all_partners()?;
        let known: BTreeSet<&str> = partners.iter().map(|p| p.bp_code.as_str()).collect();

        let mut findings: Vec<Finding> = partners
            .iter()
            .filter_map(|p| parent_finding(p, &known))
            .collect();

        let referenced = self.store.referenced_codes()?;
        for bp_code in &referenced {
            if !known.contains(bp_code.as_str()) {
                findings.push(Finding::UnknownPartnerReference {
                    bp_code: bp_code.clone(),
                });
            }
        }

        for finding in &findings {
            tracing::warn!(bp_code = %finding.bp_code(), "{}", finding.describe());
        }

        Ok(ConsistencyReport {
            partners_scanned: partners.len(),
            references_scanned: referenced.len(),
            findings,
        })
    }

    /// Recompute every parent link and persist the ones that differ
    ///
    /// With `dry_run` nothing is written; the report lists what would change.
    pub fn repair_parent_links(&self, dry_run: bool) -> Result<RepairReport> {
        let partners = self.store.all_partners()?;
        let known: BTreeSet<&str> = partners.iter().map(|p| p.bp_code.as_str()).collect();

        let mut report = RepairReport {
            dry_run,
            scanned: partners.len(),
            ..RepairReport::default()
        };

        for partner in &partners {
            match parent_finding(partner, &known) {
                None => {}
                Some(finding) if !finding.is_repairable() => {
                    tracing::warn!(bp_code = %partner.bp_code, "{}", finding.describe());
                    report.findings.push(finding);
                }
                Some(_) => {
                    let correction = Correction {
                        bp_code: partner.bp_code.clone(),
                        from: partner.parent_bp_code.clone(),
                        to: partner.expected_parent(),
                    };

                    if !dry_run {
                        if self
                            .store
                            .set_parent(&correction.bp_code, correction.to.as_deref())?
                        {
                            report.changed += 1;
                            tracing::info!(
                                bp_code = %correction.bp_code,
                                from = ?correction.from,
                                to = ?correction.to,
                                "parent link corrected"
                            );
                        } else {
                            tracing::warn!(bp_code = %correction.bp_code, "partner disappeared during repair");
                            continue;
                        }
                    }

                    report.corrections.push(correction);
                }
            }
        }

        tracing::info!("{}", report.summary());
        Ok(report)
    }
}

/// Compare one partner's stored parent with what its code implies
fn parent_finding(partner: &Partner, known: &BTreeSet<&str>) -> Option<Finding> {
    let bp_code = partner.bp_code.clone();

    if !code::is_suffixed(&partner.bp_code) {
        return partner
            .parent_bp_code
            .clone()
            .map(|found| Finding::UnexpectedParent { bp_code, found });
    }

    let base = partner.base_code();
    if !known.contains(base.as_str()) {
        return Some(Finding::MissingBaseRecord { bp_code, base });
    }

    match &partner.parent_bp_code {
        None => Some(Finding::MissingParent {
            bp_code,
            expected: base,
        }),
        Some(found) if *found != base => Some(Finding::WrongParent {
            bp_code,
            found: found.clone(),
            expected: base,
        }),
        Some(_) => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::InvLine;
    use crate::memory::InMemoryStore;
    use chrono::NaiveDate;

    fn messy_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_partner(Partner::new("SLAPMTI")).unwrap();
        // Never backfilled
        store.insert_partner(Partner::new("SLAPMTI-1")).unwrap();
        // Backfilled wrong
        store
            .insert_partner(Partner::new("SLAPMTI-2").with_parent("SLAPMTI-1"))
            .unwrap();
        // Fine
        store
            .insert_partner(Partner::new("SLAPMTI-3").with_parent("SLAPMTI"))
            .unwrap();
        // Canonical with a parent
        store
            .insert_partner(Partner::new("ACME").with_parent("SLAPMTI"))
            .unwrap();
        // Base never existed
        store
            .insert_partner(Partner::new("GHOST-1").with_parent("GHOST"))
            .unwrap();
        store
    }

    #[test]
    fn test_check_reports_every_kind() {
        let store = messy_store();
        store
            .insert_line(InvLine::new(
                "NOBODY-9",
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            ))
            .unwrap();

        let report = RepairEngine::new(&store).check().unwrap();

        assert_eq!(report.partners_scanned, 6);
        assert_eq!(report.references_scanned, 1);
        assert!(!report.is_consistent());
        assert_eq!(
            report.findings,
            vec![
                Finding::UnexpectedParent {
                    bp_code: "ACME".to_string(),
                    found: "SLAPMTI".to_string(),
                },
                Finding::MissingBaseRecord {
                    bp_code: "GHOST-1".to_string(),
                    base: "GHOST".to_string(),
                },
                Finding::MissingParent {
                    bp_code: "SLAPMTI-1".to_string(),
                    expected: "SLAPMTI".to_string(),
                },
                Finding::WrongParent {
                    bp_code: "SLAPMTI-2".to_string(),
                    found: "SLAPMTI-1".to_string(),
                    expected: "SLAPMTI".to_string(),
                },
                Finding::UnknownPartnerReference {
                    bp_code: "NOBODY-9".to_string(),
                },
            ]
        );
        assert_eq!(report.count(Severity::Warning), 3);
    }

    #[test]
    fn test_check_never_writes() {
        let store = messy_store();
        RepairEngine::new(&store).check().unwrap();

        let partner = store.find_by_code("SLAPMTI-1").unwrap().unwrap();
        assert!(partner.parent_bp_code.is_none());
    }

    #[test]
    fn test_dry_run_plans_without_writing() {
        let store = messy_store();
        let report = RepairEngine::new(&store).repair_parent_links(true).unwrap();

        assert!(report.dry_run);
        assert_eq!(report.changed, 0);
        assert_eq!(report.corrections.len(), 3);
        assert!(store
            .find_by_code("SLAPMTI-1")
            .unwrap()
            .unwrap()
            .parent_bp_code
            .is_none());
    }

    #[test]
    fn test_repair_fixes_links_and_leaves_orphans() {
        let store = messy_store();
        let report = RepairEngine::new(&store).repair_parent_links(false).unwrap();

        assert_eq!(report.scanned, 6);
        assert_eq!(report.changed, 3);
        assert_eq!(
            report.findings,
            vec![Finding::MissingBaseRecord {
                bp_code: "GHOST-1".to_string(),
                base: "GHOST".to_string(),
            }]
        );

        for child in ["SLAPMTI-1", "SLAPMTI-2", "SLAPMTI-3"] {
            let partner = store.find_by_code(child).unwrap().unwrap();
            assert_eq!(partner.parent_bp_code.as_deref(), Some("SLAPMTI"));
        }
        assert!(store.find_by_code("ACME").unwrap().unwrap().parent_bp_code.is_none());

        // Orphan untouched
        let ghost = store.find_by_code("GHOST-1").unwrap().unwrap();
        assert_eq!(ghost.parent_bp_code.as_deref(), Some("GHOST"));
    }

    #[test]
    fn test_repair_is_idempotent() {
        let store = messy_store();
        let engine = RepairEngine::new(&store);

        engine.repair_parent_links(false).unwrap();
        let after_first = store.all_partners().unwrap();

        let second = engine.repair_parent_links(false).unwrap();
        assert_eq!(second.changed, 0);
        assert!(second.corrections.is_empty());
        assert_eq!(store.all_partners().unwrap(), after_first);
    }

    #[test]
    fn test_finding_serializes_with_kind_tag() {
        let json = serde_json::to_value(Finding::MissingParent {
            bp_code: "A-1".to_string(),
            expected: "A".to_string(),
        })
        .unwrap();

        assert_eq!(json["kind"], "MissingParent");
        assert_eq!(json["expected"], "A");
    }
}
