// 📥 CSV import - partner and invoice extracts from the ERP
//
// Extracts come from operators, so they are messy: lower-case codes, padded
// cells, empty parent columns, blank amounts. Every partner code is
// normalized on the way in; blank text cells become None.
//
// Expected headers:
//   partners:    bp_code, parent_bp_code, bp_name, address, email
//   inv_lines:   id, bp_id, packing_slip, receipt_no, po_no, item_name,
//                actual_receipt_date, receipt_qty, receipt_amount,
//                inv_supplier_no, inv_due_date
//   inv_headers: id, inv_no, bp_code, status, total_amount, created_at

use crate::code;
use crate::entities::{InvHeader, InvLine, Partner};
use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

// ============================================================================
// CSV ROWS
// ============================================================================

#[derive(Debug, Deserialize)]
struct PartnerRow {
    bp_code: String,
    #[serde(default)]
    parent_bp_code: Option<String>,
    #[serde(default)]
    bp_name: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvLineRow {
    #[serde(default)]
    id: Option<i64>,
    bp_id: String,
    #[serde(default)]
    packing_slip: Option<String>,
    #[serde(default)]
    receipt_no: Option<String>,
    #[serde(default)]
    po_no: Option<String>,
    #[serde(default)]
    item_name: Option<String>,
    actual_receipt_date: NaiveDate,
    #[serde(default)]
    receipt_qty: Option<f64>,
    #[serde(default)]
    receipt_amount: Option<f64>,
    #[serde(default)]
    inv_supplier_no: Option<String>,
    #[serde(default)]
    inv_due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct InvHeaderRow {
    #[serde(default)]
    id: Option<i64>,
    inv_no: String,
    bp_code: String,
    status: String,
    #[serde(default)]
    total_amount: Option<f64>,
    created_at: DateTime<Utc>,
}

/// Blank cells count as missing
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_code(value: Option<String>) -> Option<String> {
    clean(value).map(|v| code::normalize(&v))
}

impl From<PartnerRow> for Partner {
    fn from(row: PartnerRow) -> Self {
        Partner {
            bp_code: code::normalize(&row.bp_code),
            parent_bp_code: clean_code(row.parent_bp_code),
            bp_name: clean(row.bp_name),
            address: clean(row.address),
            email: clean(row.email),
        }
    }
}

impl From<InvLineRow> for InvLine {
    fn from(row: InvLineRow) -> Self {
        InvLine {
            id: row.id.unwrap_or(0),
            bp_id: code::normalize(&row.bp_id),
            packing_slip: clean(row.packing_slip),
            receipt_no: clean(row.receipt_no),
            po_no: clean(row.po_no),
            item_name: clean(row.item_name),
            actual_receipt_date: row.actual_receipt_date,
            receipt_qty: row.receipt_qty.unwrap_or(0.0),
            receipt_amount: row.receipt_amount.unwrap_or(0.0),
            inv_supplier_no: clean(row.inv_supplier_no),
            inv_due_date: row.inv_due_date,
        }
    }
}

impl From<InvHeaderRow> for InvHeader {
    fn from(row: InvHeaderRow) -> Self {
        InvHeader {
            id: row.id.unwrap_or(0),
            inv_no: row.inv_no.trim().to_string(),
            bp_code: code::normalize(&row.bp_code),
            status: row.status.trim().to_string(),
            total_amount: row.total_amount.unwrap_or(0.0),
            created_at: row.created_at,
            lines: Vec::new(),
        }
    }
}

// ============================================================================
// LOADERS
// ============================================================================

fn read_rows<T, R, E>(reader: R) -> Result<Vec<E>>
where
    T: serde::de::DeserializeOwned + Into<E>,
    R: Read,
{
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut records = Vec::new();
    for result in rdr.deserialize::<T>() {
        records.push(result?.into());
    }
    Ok(records)
}

pub fn read_partners<R: Read>(reader: R) -> Result<Vec<Partner>> {
    read_rows::<PartnerRow, R, Partner>(reader)
}

pub fn read_inv_lines<R: Read>(reader: R) -> Result<Vec<InvLine>> {
    read_rows::<InvLineRow, R, InvLine>(reader)
}

pub fn read_inv_headers<R: Read>(reader: R) -> Result<Vec<InvHeader>> {
    read_rows::<InvHeaderRow, R, InvHeader>(reader)
}

pub fn load_partners_csv(path: &Path) -> Result<Vec<Partner>> {
    let partners = read_partners(std::fs::File::open(path)?)?;
    tracing::debug!(path = %path.display(), count = partners.len(), "loaded partners");
    Ok(partners)
}

pub fn load_inv_lines_csv(path: &Path) -> Result<Vec<InvLine>> {
    let lines = read_inv_lines(std::fs::File::open(path)?)?;
    tracing::debug!(path = %path.display(), count = lines.len(), "loaded invoice lines");
    Ok(lines)
}

pub fn load_inv_headers_csv(path: &Path) -> Result<Vec<InvHeader>> {
    let headers = read_inv_headers(std::fs::File::open(path)?)?;
    tracing::debug!(path = %path.display(), count = headers.len(), "loaded invoice headers");
    Ok(headers)
}

// ============================================================================
// TESTS
// ============================================================================
