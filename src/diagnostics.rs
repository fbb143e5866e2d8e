// 🔍 Diagnostics - explain a code, compare two codes
//
// The support question is always the same: "a user logged in as SLAPMTI-2
// says the dashboard is missing invoices that SLAPMTI can see". These two
// functions answer it without hand-written SQL.

use crate::aggregation::{DashboardCounts, UnifiedQueries};
use crate::code;
use crate::error::Result;
use crate::store::{InvoiceStore, LineFilters, PartnerStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// EXPLAIN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExplanation {
    pub input: String,
    pub normalized: String,
    pub is_suffixed: bool,
    pub is_canonical: bool,
    pub base_code: String,
    pub suffix_number: Option<u32>,

    /// Partner record for the normalized code, if stored
    pub stored: bool,
    pub stored_parent: Option<String>,
    pub expected_parent: Option<String>,
    pub base_record_exists: bool,

    pub unified_set: BTreeSet<String>,
}

impl CodeExplanation {
    /// Stored parent disagrees with what the code implies
    pub fn parent_mismatch(&self) -> bool {
        self.stored && self.stored_parent != self.expected_parent
    }
}

/// Describe how one raw code is normalized, classified and resolved
pub fn explain_code<S>(store: &S, raw: &str) -> Result<CodeExplanation>
where
    S: PartnerStore + InvoiceStore + ?Sized,
{
    let normalized = code::normalize(raw);
    let base = code::base_code(&normalized);
    let suffixed = code::is_suffixed(&normalized);

    let record = if normalized.is_empty() {
        None
    } else {
        store.find_by_code(&normalized)?
    };
    let base_record_exists = !base.is_empty() && store.find_by_code(&base)?.is_some();

    let unified_set = UnifiedQueries::new(store).resolve(normalized.as_str())?;

    Ok(CodeExplanation {
        input: raw.to_string(),
        is_suffixed: suffixed,
        is_canonical: !normalized.is_empty() && code::is_canonical(&normalized),
        suffix_number: code::suffix_number(&normalized),
        stored: record.is_some(),
        stored_parent: record.and_then(|p| p.parent_bp_code),
        expected_parent: if suffixed { Some(base.clone()) } else { None },
        base_record_exists,
        base_code: base,
        normalized,
        unified_set,
    })
}

// ============================================================================
// COMPARE
// ============================================================================

/// What each report page shows for one code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeView {
    pub code: String,
    pub unified_set: BTreeSet<String>,
    pub line_count: usize,
    pub header_count: usize,
    pub dashboard: DashboardCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceReport {
    pub left: CodeView,
    pub right: CodeView,
    pub same_set: bool,
    pub same_lines: bool,
    pub same_headers: bool,
    pub same_dashboard: bool,
}

impl EquivalenceReport {
    /// Both codes see exactly the same data on every page
    pub fn is_equivalent(&self) -> bool {
        self.same_set && self.same_lines && self.same_headers && self.same_dashboard
    }

    pub fn summary(&self) -> String {
        if self.is_equivalent() {
            format!(
                "{} and {} are equivalent ({} codes, {} lines, {} invoices)",
                self.left.code,
                self.right.code,
                self.left.unified_set.len(),
                self.left.line_count,
                self.left.header_count
            )
        } else {
            format!(
                "{} and {} differ: sets {}/{}, lines {}/{}, invoices {}/{}",
                self.left.code,
                self.right.code,
                self.left.unified_set.len(),
                self.right.unified_set.len(),
                self.left.line_count,
                self.right.line_count,
                self.left.header_count,
                self.right.header_count
            )
        }
    }
}

fn view<S>(queries: &UnifiedQueries<'_, S>, raw: &str) -> Result<CodeView>
where
    S: PartnerStore + InvoiceStore + ?Sized,
{
    let filters = LineFilters::default();
    Ok(CodeView {
        code: code::normalize(raw),
        unified_set: queries.resolve(raw)?,
        line_count: queries.unified_inv_lines(raw, &filters)?.len(),
        header_count: queries.unified_inv_headers(raw)?.len(),
        dashboard: queries.unified_dashboard_data(raw)?,
    })
}

/// Resolve both codes and compare what the line, header and dashboard pages return
pub fn compare_codes<S>(queries: &UnifiedQueries<'_, S>, a: &str, b: &str) -> Result<EquivalenceReport>
where
    S: PartnerStore + InvoiceStore + ?Sized,
{
    let left = view(queries, a)?;
    let right = view(queries, b)?;

    let report = EquivalenceReport {
        same_set: left.unified_set == right.unified_set,
        same_lines: left.line_count == right.line_count,
        same_headers: left.header_count == right.header_count,
        same_dashboard: left.dashboard == right.dashboard,
        left,
        right,
    };

    tracing::debug!(equivalent = report.is_equivalent(), "{}", report.summary());
    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{InvHeader, InvLine, InvoiceStatus, Partner};
    use crate::memory::InMemoryStore;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_partner(Partner::new("SLAPMTI")).unwrap();
        store
            .insert_partner(Partner::new("SLAPMTI-1").with_parent("SLAPMTI"))
            .unwrap();
        store.insert_partner(Partner::new("SLAPMTI-2")).unwrap();
        store.insert_partner(Partner::new("OTHER")).unwrap();

        let received = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        store.insert_line(InvLine::new("SLAPMTI-2", received)).unwrap();
        store.insert_line(InvLine::new("OTHER", received)).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        store
            .insert_header(InvHeader::new("INV-1", "SLAPMTI", InvoiceStatus::Rejected, at))
            .unwrap();
        store
    }

    #[test]
    fn test_explain_suffixed_code() {
        let store = store();
        let explained = explain_code(&store, " slapmti-2 ").unwrap();

        assert_eq!(explained.normalized, "SLAPMTI-2");
        assert!(explained.is_suffixed);
        assert!(!explained.is_canonical);
        assert_eq!(explained.base_code, "SLAPMTI");
        assert_eq!(explained.suffix_number, Some(2));
        assert!(explained.stored);
        assert!(explained.base_record_exists);
        assert_eq!(explained.stored_parent, None);
        assert!(explained.parent_mismatch());
        assert_eq!(explained.unified_set.len(), 3);
    }

    #[test]
    fn test_explain_unknown_and_empty() {
        let store = store();

        let unknown = explain_code(&store, "NOBODY").unwrap();
        assert!(unknown.is_canonical);
        assert!(!unknown.stored);
        assert!(!unknown.parent_mismatch());
        assert!(unknown.unified_set.is_empty());

        let empty = explain_code(&store, "   ").unwrap();
        assert_eq!(empty.normalized, "");
        assert!(!empty.is_canonical);
        assert!(!empty.base_record_exists);
        assert!(empty.unified_set.is_empty());
    }

    #[test]
    fn test_compare_variants_are_equivalent() {
        let store = store();
        let queries = UnifiedQueries::new(&store);

        let report = compare_codes(&queries, "SLAPMTI", "slapmti-1").unwrap();

        assert!(report.is_equivalent());
        assert_eq!(report.left.line_count, 1);
        assert_eq!(report.right.header_count, 1);
        assert_eq!(report.left.dashboard.rejected_invoices, 1);
        assert!(report.summary().contains("equivalent"));
    }

    #[test]
    fn test_compare_unrelated_codes_differ() {
        let store = store();
        let queries = UnifiedQueries::new(&store);

        let report = compare_codes(&queries, "SLAPMTI", "OTHER").unwrap();

        assert!(!report.is_equivalent());
        assert!(!report.same_set);
        assert!(report.same_lines);
        assert!(!report.same_headers);
        assert!(report.summary().contains("differ"));
    }
}
