// 🧾 Invoice Entities - receipt lines and supplier invoice headers
//
// Both reference a partner by code, and that code can be ANY member of the
// partner's unified code set (SLAPMTI, SLAPMTI-1, ...). Never filter these
// on a single code; go through the resolver.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// INVOICE STATUS
// ============================================================================

/// Fixed status vocabulary of invoice headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    New,
    InProcess,
    Rejected,
    ReadyToPayment,
    Paid,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::New,
        InvoiceStatus::InProcess,
        InvoiceStatus::Rejected,
        InvoiceStatus::ReadyToPayment,
        InvoiceStatus::Paid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::New => "New",
            InvoiceStatus::InProcess => "In Process",
            InvoiceStatus::Rejected => "Rejected",
            InvoiceStatus::ReadyToPayment => "Ready To Payment",
            InvoiceStatus::Paid => "Paid",
        }
    }

    /// Lenient parse: case-insensitive, `_` / `-` / spaces are interchangeable
    ///
    /// Example: "in_process", "IN PROCESS", "In-Process" → InProcess
    pub fn parse(raw: &str) -> Option<InvoiceStatus> {
        let key: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(|c| c.to_lowercase())
            .collect();

        match key.as_str() {
            "new" => Some(InvoiceStatus::New),
            "inprocess" => Some(InvoiceStatus::InProcess),
            "rejected" => Some(InvoiceStatus::Rejected),
            "readytopayment" => Some(InvoiceStatus::ReadyToPayment),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// INVOICE LINE (goods receipt line)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvLine {
    #[serde(default)]
    pub id: i64,

    /// Partner reference - any member of a unified code set
    pub bp_id: String,

    #[serde(default)]
    pub packing_slip: Option<String>,

    #[serde(default)]
    pub receipt_no: Option<String>,

    #[serde(default)]
    pub po_no: Option<String>,

    #[serde(default)]
    pub item_name: Option<String>,

    pub actual_receipt_date: NaiveDate,

    #[serde(default)]
    pub receipt_qty: f64,

    #[serde(default)]
    pub receipt_amount: f64,

    /// Supplier invoice number, set once the line is attached to an invoice
    #[serde(default)]
    pub inv_supplier_no: Option<String>,

    #[serde(default)]
    pub inv_due_date: Option<NaiveDate>,
}

impl InvLine {
    pub fn new(bp_id: &str, actual_receipt_date: NaiveDate) -> Self {
        InvLine {
            id: 0,
            bp_id: bp_id.to_string(),
            packing_slip: None,
            receipt_no: None,
            po_no: None,
            item_name: None,
            actual_receipt_date,
            receipt_qty: 0.0,
            receipt_amount: 0.0,
            inv_supplier_no: None,
            inv_due_date: None,
        }
    }

    /// Not attached to any invoice yet
    ///
    /// Both markers must be unset; a blank invoice number counts as unset.
    pub fn is_uninvoiced(&self) -> bool {
        let no_invoice = self
            .inv_supplier_no
            .as_deref()
            .map_or(true, |no| no.trim().is_empty());
        no_invoice && self.inv_due_date.is_none()
    }

    /// Whole days between receipt and `today` (negative for future receipts)
    pub fn days_since_receipt(&self, today: NaiveDate) -> i64 {
        today
            .signed_duration_since(self.actual_receipt_date)
            .num_days()
    }
}

// ============================================================================
// INVOICE HEADER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvHeader {
    #[serde(default)]
    pub id: i64,

    /// Supplier invoice number; lines link here through `inv_supplier_no`
    pub inv_no: String,

    /// Partner reference - any member of a unified code set
    pub bp_code: String,

    /// Raw status text; see [`InvoiceStatus::parse`]
    pub status: String,

    #[serde(default)]
    pub total_amount: f64,

    pub created_at: DateTime<Utc>,

    /// Eagerly loaded lines
    #[serde(default)]
    pub lines: Vec<InvLine>,
}

impl InvHeader {
    pub fn new(inv_no: &str, bp_code: &str, status: InvoiceStatus, created_at: DateTime<Utc>) -> Self {
        InvHeader {
            id: 0,
            inv_no: inv_no.to_string(),
            bp_code: bp_code.to_string(),
            status: status.as_str().to_string(),
            total_amount: 0.0,
            created_at,
            lines: Vec::new(),
        }
    }

    /// Status in the fixed vocabulary, `None` for anything unrecognised
    pub fn status_kind(&self) -> Option<InvoiceStatus> {
        InvoiceStatus::parse(&self.status)
    }
}

// ============================================================================
// TESTS
// ============================================================================
