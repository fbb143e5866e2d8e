// 📊 Aggregation Adapters - report queries over a unified code set
//
// Each adapter resolves the caller's code first and fans the invoice query
// out over the whole set. This is what keeps the invoice-line page, the
// invoice-header page and the dashboard in agreement regardless of which
// variant (SLAPMTI / SLAPMTI-2) the caller was logged in with.
//
// An empty set short-circuits to an empty / zero result.

use crate::entities::{InvHeader, InvLine, InvoiceStatus};
use crate::error::Result;
use crate::resolver::UnifiedCodeResolver;
use crate::store::{InvoiceStore, LineFilters, LineQuery, PartnerStore};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default age (days) after which a receipt line is flagged, invoiced or not
pub const DEFAULT_OUTSTANDING_CUTOFF_DAYS: u32 = 10;

/// Label attached to every outstanding line for display
pub const OUTSTANDING_ADVISORY: &str =
    "Receipt older than the invoicing window. Please submit the invoice.";

// ============================================================================
// RESULT RECORDS
// ============================================================================

/// Invoice header counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub new_invoices: i64,
    pub in_process_invoices: i64,
    pub rejected_invoices: i64,
    pub ready_to_payment_invoices: i64,
    pub paid_invoices: i64,
}

impl DashboardCounts {
    pub fn total(&self) -> i64 {
        self.new_invoices
            + self.in_process_invoices
            + self.rejected_invoices
            + self.ready_to_payment_invoices
            + self.paid_invoices
    }

    fn add(&mut self, status: InvoiceStatus, count: i64) {
        match status {
            InvoiceStatus::New => self.new_invoices += count,
            InvoiceStatus::InProcess => self.in_process_invoices += count,
            InvoiceStatus::Rejected => self.rejected_invoices += count,
            InvoiceStatus::ReadyToPayment => self.ready_to_payment_invoices += count,
            InvoiceStatus::Paid => self.paid_invoices += count,
        }
    }
}

/// A line past the invoicing window, tagged for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutstandingInvLine {
    #[serde(flatten)]
    pub line: InvLine,
    pub days_outstanding: i64,
    pub advisory: &'static str,
}

// ============================================================================
// UNIFIED QUERIES
// ============================================================================

pub struct UnifiedQueries<'a, S: PartnerStore + InvoiceStore + ?Sized> {
    store: &'a S,
    resolver: UnifiedCodeResolver<'a, S>,
    outstanding_cutoff_days: u32,
}

impl<'a, S: PartnerStore + InvoiceStore + ?Sized> UnifiedQueries<'a, S> {
    pub fn new(store: &'a S) -> Self {
        UnifiedQueries {
            store,
            resolver: UnifiedCodeResolver::new(store),
            outstanding_cutoff_days: DEFAULT_OUTSTANDING_CUTOFF_DAYS,
        }
    }

    /// Override the default cutoff used by [`unified_outstanding_inv_lines_default`](Self::unified_outstanding_inv_lines_default)
    pub fn with_outstanding_cutoff(mut self, days: u32) -> Self {
        self.outstanding_cutoff_days = days;
        self
    }

    pub fn resolver(&self) -> &UnifiedCodeResolver<'a, S> {
        &self.resolver
    }

    /// Unified code set for a raw code
    pub fn resolve<'c>(&self, code: impl Into<Option<&'c str>>) -> Result<BTreeSet<String>> {
        self.resolver.resolve(code)
    }

    /// Invoice lines for every code in the set, newest receipt first
    pub fn unified_inv_lines<'c>(
        &self,
        code: impl Into<Option<&'c str>>,
        filters: &LineFilters,
    ) -> Result<Vec<InvLine>> {
        let codes = self.resolve(code)?;
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let query = LineQuery {
            codes,
            filters: filters.clone(),
            ..LineQuery::default()
        };
        self.store.find_lines(&query)
    }

    /// Lines not yet attached to any invoice (no supplier invoice number, no due date)
    pub fn unified_uninvoiced_inv_lines<'c>(
        &self,
        code: impl Into<Option<&'c str>>,
        filters: &LineFilters,
    ) -> Result<Vec<InvLine>> {
        let codes = self.resolve(code)?;
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let query = LineQuery {
            codes,
            filters: filters.clone(),
            uninvoiced_only: true,
            ..LineQuery::default()
        };
        self.store.find_lines(&query)
    }

    /// Invoice headers with their lines, newest first
    pub fn unified_inv_headers<'c>(
        &self,
        code: impl Into<Option<&'c str>>,
    ) -> Result<Vec<InvHeader>> {
        let codes = self.resolve(code)?;
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        self.store.find_headers(&codes)
    }

    /// Lines received more than `cutoff_days` ago
    pub fn unified_outstanding_inv_lines<'c>(
        &self,
        code: impl Into<Option<&'c str>>,
        cutoff_days: u32,
    ) -> Result<Vec<OutstandingInvLine>> {
        self.unified_outstanding_inv_lines_as_of(code, cutoff_days, Utc::now().date_naive())
    }

    /// [`unified_outstanding_inv_lines`](Self::unified_outstanding_inv_lines) with the configured cutoff
    pub fn unified_outstanding_inv_lines_default<'c>(
        &self,
        code: impl Into<Option<&'c str>>,
    ) -> Result<Vec<OutstandingInvLine>> {
        self.unified_outstanding_inv_lines(code, self.outstanding_cutoff_days)
    }

    /// Same as [`unified_outstanding_inv_lines`](Self::unified_outstanding_inv_lines)
    /// with an explicit "today"
    pub fn unified_outstanding_inv_lines_as_of<'c>(
        &self,
        code: impl Into<Option<&'c str>>,
        cutoff_days: u32,
        today: NaiveDate,
    ) -> Result<Vec<OutstandingInvLine>> {
        let codes = self.resolve(code)?;
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        // A cutoff before the first representable date leaves nothing outstanding
        let Some(received_before) = today.checked_sub_signed(Duration::days(i64::from(cutoff_days)))
        else {
            return Ok(Vec::new());
        };

        let query = LineQuery {
            codes,
            received_before: Some(received_before),
            ..LineQuery::default()
        };

        let outstanding = self
            .store
            .find_lines(&query)?
            .into_iter()
            .map(|line| OutstandingInvLine {
                days_outstanding: line.days_since_receipt(today),
                line,
                advisory: OUTSTANDING_ADVISORY,
            })
            .collect();

        Ok(outstanding)
    }

    /// Header counts per status across the set; all zero for an empty set
    pub fn unified_dashboard_data<'c>(
        &self,
        code: impl Into<Option<&'c str>>,
    ) -> Result<DashboardCounts> {
        let codes = self.resolve(code)?;
        let mut counts = DashboardCounts::default();
        if codes.is_empty() {
            return Ok(counts);
        }

        for (status, count) in self.store.count_headers_by_status(&codes)? {
            match InvoiceStatus::parse(&status) {
                Some(kind) => counts.add(kind, count),
                None => tracing::debug!(status = %status, count, "status outside dashboard vocabulary"),
            }
        }

        Ok(counts)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Partner;
    use crate::memory::InMemoryStore;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slapmti_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_partner(Partner::new("SLAPMTI")).unwrap();
        store
            .insert_partner(Partner::new("SLAPMTI-1").with_parent("SLAPMTI"))
            .unwrap();
        store
            .insert_partner(Partner::new("SLAPMTI-2").with_parent("SLAPMTI"))
            .unwrap();
        store.insert_partner(Partner::new("OTHER")).unwrap();
        store
    }

    #[test]
    fn test_unified_inv_lines_cover_every_variant() {
        let store = slapmti_store();
        store.insert_line(InvLine::new("SLAPMTI", date(2025, 1, 1))).unwrap();
        store.insert_line(InvLine::new("SLAPMTI-1", date(2025, 1, 3))).unwrap();
        store.insert_line(InvLine::new("SLAPMTI-2", date(2025, 1, 2))).unwrap();
        store.insert_line(InvLine::new("OTHER", date(2025, 1, 4))).unwrap();

        let queries = UnifiedQueries::new(&store);
        let filters = LineFilters::default();

        let from_base = queries.unified_inv_lines("SLAPMTI", &filters).unwrap();
        let from_child = queries.unified_inv_lines("SLAPMTI-2", &filters).unwrap();

        assert_eq!(from_base.len(), 3);
        assert_eq!(from_base, from_child);

        // Newest receipt first
        let dates: Vec<NaiveDate> = from_base.iter().map(|l| l.actual_receipt_date).collect();
        assert_eq!(dates, vec![date(2025, 1, 3), date(2025, 1, 2), date(2025, 1, 1)]);
    }

    #[test]
    fn test_unified_inv_lines_apply_filters() {
        let store = slapmti_store();
        let mut a = InvLine::new("SLAPMTI-1", date(2025, 1, 10));
        a.po_no = Some("PO-555".to_string());
        let mut b = InvLine::new("SLAPMTI", date(2025, 2, 10));
        b.po_no = Some("PO-777".to_string());
        store.insert_line(a).unwrap();
        store.insert_line(b).unwrap();

        let queries = UnifiedQueries::new(&store);

        let filters = LineFilters {
            po_no: Some("555".to_string()),
            ..LineFilters::default()
        };
        assert_eq!(queries.unified_inv_lines("SLAPMTI-2", &filters).unwrap().len(), 1);

        let filters = LineFilters {
            date_from: Some(date(2025, 2, 1)),
            date_to: Some(date(2025, 2, 28)),
            ..LineFilters::default()
        };
        let lines = queries.unified_inv_lines("SLAPMTI", &filters).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].bp_id, "SLAPMTI");
    }

    #[test]
    fn test_unified_uninvoiced_inv_lines() {
        let store = slapmti_store();
        let mut invoiced = InvLine::new("SLAPMTI-1", date(2025, 1, 10));
        invoiced.inv_supplier_no = Some("INV-9".to_string());
        let mut due_only = InvLine::new("SLAPMTI-2", date(2025, 1, 11));
        due_only.inv_due_date = Some(date(2025, 2, 11));
        store.insert_line(invoiced).unwrap();
        store.insert_line(due_only).unwrap();
        store.insert_line(InvLine::new("SLAPMTI", date(2025, 1, 12))).unwrap();

        let queries = UnifiedQueries::new(&store);
        let lines = queries
            .unified_uninvoiced_inv_lines("SLAPMTI-1", &LineFilters::default())
            .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].bp_id, "SLAPMTI");
    }

    #[test]
    fn test_unified_inv_headers_newest_first() {
        let store = slapmti_store();
        let older = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        store
            .insert_header(InvHeader::new("INV-A", "SLAPMTI-1", InvoiceStatus::Paid, older))
            .unwrap();
        store
            .insert_header(InvHeader::new("INV-B", "SLAPMTI", InvoiceStatus::New, newer))
            .unwrap();
        store
            .insert_header(InvHeader::new("INV-C", "OTHER", InvoiceStatus::New, newer))
            .unwrap();

        let queries = UnifiedQueries::new(&store);
        let headers = queries.unified_inv_headers("SLAPMTI-2").unwrap();

        let numbers: Vec<&str> = headers.iter().map(|h| h.inv_no.as_str()).collect();
        assert_eq!(numbers, vec!["INV-B", "INV-A"]);
    }

    #[test]
    fn test_unified_outstanding_inv_lines() {
        let store = slapmti_store();
        store.insert_line(InvLine::new("SLAPMTI-1", date(2025, 1, 1))).unwrap();
        store.insert_line(InvLine::new("SLAPMTI-2", date(2025, 1, 20))).unwrap();
        store.insert_line(InvLine::new("SLAPMTI", date(2025, 1, 21))).unwrap();

        let queries = UnifiedQueries::new(&store);
        let today = date(2025, 1, 31);

        // Cutoff is 2025-01-21: strictly older lines only
        let outstanding = queries
            .unified_outstanding_inv_lines_as_of("SLAPMTI", 10, today)
            .unwrap();

        assert_eq!(outstanding.len(), 2);
        assert_eq!(outstanding[0].line.bp_id, "SLAPMTI-2");
        assert_eq!(outstanding[0].days_outstanding, 11);
        assert_eq!(outstanding[1].days_outstanding, 30);
        assert!(outstanding.iter().all(|o| o.advisory == OUTSTANDING_ADVISORY));
    }

    #[test]
    fn test_outstanding_cutoff_past_the_calendar() {
        let store = slapmti_store();
        store.insert_line(InvLine::new("SLAPMTI", date(1970, 1, 1))).unwrap();
        let queries = UnifiedQueries::new(&store);

        let outstanding = queries
            .unified_outstanding_inv_lines_as_of("SLAPMTI", u32::MAX, date(2025, 1, 31))
            .unwrap();
        assert!(outstanding.is_empty());
    }

    #[test]
    fn test_outstanding_includes_invoiced_lines() {
        let store = slapmti_store();
        let mut invoiced = InvLine::new("SLAPMTI-1", date(2025, 1, 1));
        invoiced.inv_supplier_no = Some("INV-1".to_string());
        store.insert_line(invoiced).unwrap();

        let outstanding = UnifiedQueries::new(&store)
            .unified_outstanding_inv_lines_as_of("SLAPMTI", 10, date(2025, 1, 31))
            .unwrap();
        assert_eq!(outstanding.len(), 1);
    }

    #[test]
    fn test_unified_dashboard_data() {
        let store = slapmti_store();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        store
            .insert_header(InvHeader::new("INV-1", "SLAPMTI", InvoiceStatus::New, at))
            .unwrap();
        store
            .insert_header(InvHeader::new("INV-2", "SLAPMTI-2", InvoiceStatus::InProcess, at))
            .unwrap();

        let queries = UnifiedQueries::new(&store);
        let counts = queries.unified_dashboard_data("SLAPMTI").unwrap();

        assert_eq!(
            counts,
            DashboardCounts {
                new_invoices: 1,
                in_process_invoices: 1,
                rejected_invoices: 0,
                ready_to_payment_invoices: 0,
                paid_invoices: 0,
            }
        );
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_dashboard_ignores_unknown_statuses_and_merges_spellings() {
        let store = slapmti_store();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let mut draft = InvHeader::new("INV-1", "SLAPMTI", InvoiceStatus::New, at);
        draft.status = "Draft".to_string();
        let mut shouty = InvHeader::new("INV-2", "SLAPMTI-1", InvoiceStatus::Paid, at);
        shouty.status = "PAID".to_string();
        store.insert_header(draft).unwrap();
        store.insert_header(shouty).unwrap();
        store
            .insert_header(InvHeader::new("INV-3", "SLAPMTI-2", InvoiceStatus::Paid, at))
            .unwrap();

        let counts = UnifiedQueries::new(&store).unified_dashboard_data("SLAPMTI").unwrap();
        assert_eq!(counts.paid_invoices, 2);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_empty_code_gives_empty_results() {
        let store = slapmti_store();
        store.insert_line(InvLine::new("SLAPMTI", date(2020, 1, 1))).unwrap();
        let queries = UnifiedQueries::new(&store);
        let filters = LineFilters::default();

        for code in [None, Some(""), Some("  "), Some("UNKNOWN")] {
            assert!(queries.unified_inv_lines(code, &filters).unwrap().is_empty());
            assert!(queries.unified_uninvoiced_inv_lines(code, &filters).unwrap().is_empty());
            assert!(queries.unified_inv_headers(code).unwrap().is_empty());
            assert!(queries.unified_outstanding_inv_lines(code, 10).unwrap().is_empty());
            assert_eq!(
                queries.unified_dashboard_data(code).unwrap(),
                DashboardCounts::default()
            );
        }
    }

    #[test]
    fn test_dashboard_counts_serialize_with_report_keys() {
        let json = serde_json::to_value(DashboardCounts::default()).unwrap();
        for key in [
            "new_invoices",
            "in_process_invoices",
            "rejected_invoices",
            "ready_to_payment_invoices",
            "paid_invoices",
        ] {
            assert_eq!(json[key], 0);
        }
    }
}
