// 🗄️ Storage seams
//
// The resolver and the aggregation adapters never talk to SQLite directly.
// They go through these traits so the same logic runs against the database
// (`db::SqliteStore`) and against an in-memory fake (`memory::InMemoryStore`).

use crate::entities::{InvHeader, InvLine, Partner};
use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// PARTNER STORE
// ============================================================================

pub trait PartnerStore {
    /// Partner whose `bp_code` equals `code`
    fn find_by_code(&self, code: &str) -> Result<Option<Partner>>;

    /// Partners whose `bp_code` starts with `prefix` (SQL `LIKE 'prefix%'`)
    ///
    /// Candidates only: callers confirm the match themselves.
    fn find_by_code_prefix(&self, prefix: &str) -> Result<Vec<Partner>>;

    /// Partners whose `parent_bp_code` equals `parent`
    fn find_by_parent(&self, parent: &str) -> Result<Vec<Partner>>;

    /// Every partner, ordered by `bp_code`
    fn all_partners(&self) -> Result<Vec<Partner>>;

    /// Replace the parent link of one partner atomically.
    ///
    /// Returns `false` when no partner has this code.
    fn set_parent(&self, bp_code: &str, parent_bp_code: Option<&str>) -> Result<bool>;
}

// ============================================================================
// INVOICE STORE
// ============================================================================

/// Free-text and date filters accepted by the line reports
///
/// Text filters are case-insensitive "contains" matches. Dates are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineFilters {
    pub packing_slip: Option<String>,
    pub receipt_no: Option<String>,
    pub po_no: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl LineFilters {
    pub fn is_empty(&self) -> bool {
        *self == LineFilters::default()
    }
}

/// A fully specified line lookup, built by the aggregation adapters
#[derive(Debug, Clone, Default)]
pub struct LineQuery {
    /// Partner codes the line may reference; empty matches nothing
    pub codes: BTreeSet<String>,
    pub filters: LineFilters,
    /// Only lines not yet attached to an invoice
    pub uninvoiced_only: bool,
    /// Only lines received strictly before this date
    pub received_before: Option<NaiveDate>,
}

impl LineQuery {
    pub fn for_codes(codes: BTreeSet<String>) -> Self {
        LineQuery {
            codes,
            ..LineQuery::default()
        }
    }

    /// Evaluate the query against one line (in-memory stores)
    pub fn matches(&self, line: &InvLine) -> bool {
        if !self.codes.contains(&line.bp_id) {
            return false;
        }

        if !contains_ci(&line.packing_slip, &self.filters.packing_slip)
            || !contains_ci(&line.receipt_no, &self.filters.receipt_no)
            || !contains_ci(&line.po_no, &self.filters.po_no)
        {
            return false;
        }

        if let Some(from) = self.filters.date_from {
            if line.actual_receipt_date < from {
                return false;
            }
        }
        if let Some(to) = self.filters.date_to {
            if line.actual_receipt_date > to {
                return false;
            }
        }

        if self.uninvoiced_only && !line.is_uninvoiced() {
            return false;
        }

        if let Some(cutoff) = self.received_before {
            if line.actual_receipt_date >= cutoff {
                return false;
            }
        }

        true
    }
}

/// `None` needle matches everything; a needle never matches a missing field
fn contains_ci(haystack: &Option<String>, needle: &Option<String>) -> bool {
    match needle.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(needle) => haystack
            .as_deref()
            .map_or(false, |h| h.to_lowercase().contains(&needle.to_lowercase())),
    }
}

pub trait InvoiceStore {
    /// Lines matching the query, newest receipt first
    fn find_lines(&self, query: &LineQuery) -> Result<Vec<InvLine>>;

    /// Headers referencing any of `codes`, newest first, with their lines
    ///
    /// Only lines whose `bp_id` is also in `codes` are attached.
    fn find_headers(&self, codes: &BTreeSet<String>) -> Result<Vec<InvHeader>>;

    /// Raw `(status, count)` pairs for headers referencing any of `codes`
    fn count_headers_by_status(&self, codes: &BTreeSet<String>) -> Result<Vec<(String, i64)>>;

    /// Every distinct partner code referenced by a line or a header
    fn referenced_codes(&self) -> Result<BTreeSet<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn codes(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_empty_code_set_matches_nothing() {
        let line = InvLine::new("SLAPMTI", date(2025, 1, 1));
        assert!(!LineQuery::default().matches(&line));
    }

    #[test]
    fn test_text_filters_are_case_insensitive_contains() {
        let mut line = InvLine::new("SLAPMTI", date(2025, 1, 1));
        line.packing_slip = Some("PS-2025-0042".to_string());
        line.po_no = Some("PO7781".to_string());

        let mut query = LineQuery::for_codes(codes(&["SLAPMTI"]));
        query.filters.packing_slip = Some("ps-2025".to_string());
        assert!(query.matches(&line));

        query.filters.po_no = Some("po77".to_string());
        assert!(query.matches(&line));

        // Filter on a field the line does not have
        query.filters.receipt_no = Some("R1".to_string());
        assert!(!query.matches(&line));

        // Blank filters are ignored
        query.filters.receipt_no = Some("  ".to_string());
        assert!(query.matches(&line));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let line = InvLine::new("SLAPMTI", date(2025, 1, 15));
        let mut query = LineQuery::for_codes(codes(&["SLAPMTI"]));

        query.filters.date_from = Some(date(2025, 1, 15));
        query.filters.date_to = Some(date(2025, 1, 15));
        assert!(query.matches(&line));

        query.filters.date_from = Some(date(2025, 1, 16));
        assert!(!query.matches(&line));
    }

    #[test]
    fn test_received_before_is_strict() {
        let line = InvLine::new("SLAPMTI", date(2025, 1, 15));
        let mut query = LineQuery::for_codes(codes(&["SLAPMTI"]));

        query.received_before = Some(date(2025, 1, 15));
        assert!(!query.matches(&line));

        query.received_before = Some(date(2025, 1, 16));
        assert!(query.matches(&line));
    }
}
