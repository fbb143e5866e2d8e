use crate::entities::{InvHeader, InvLine, Partner};
use crate::error::{Result, UnifyError};
use crate::store::{InvoiceStore, LineQuery, PartnerStore};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Event for audit trail (every repair write leaves one)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Row counts per table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub partners: i64,
    pub inv_lines: i64,
    pub inv_headers: i64,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Partners (bp_code is the identity, parent_bp_code drifts)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS partners (
            bp_code TEXT PRIMARY KEY NOT NULL,
            parent_bp_code TEXT,
            bp_name TEXT,
            address TEXT,
            email TEXT,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Invoice lines (goods receipts) and invoice headers
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS inv_lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bp_id TEXT NOT NULL,
            packing_slip TEXT,
            receipt_no TEXT,
            po_no TEXT,
            item_name TEXT,
            actual_receipt_date TEXT NOT NULL,
            receipt_qty REAL NOT NULL DEFAULT 0,
            receipt_amount REAL NOT NULL DEFAULT 0,
            inv_supplier_no TEXT,
            inv_due_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS inv_headers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            inv_no TEXT NOT NULL,
            bp_code TEXT NOT NULL,
            status TEXT NOT NULL,
            total_amount REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            -- supplier invoice numbers are only unique per supplier
            UNIQUE(inv_no, bp_code)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_partners_parent ON partners(parent_bp_code)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_inv_lines_bp ON inv_lines(bp_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_inv_lines_supplier_no ON inv_lines(inv_supplier_no)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_inv_headers_bp ON inv_headers(bp_code)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            format_timestamp(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: timestamp_column(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// COLUMN HELPERS
// ============================================================================

fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed width so that text ordering equals time ordering
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

const PARTNER_COLUMNS: &str = "bp_code, parent_bp_code, bp_name, address, email";

fn partner_from_row(row: &Row<'_>) -> rusqlite::Result<Partner> {
    Ok(Partner {
        bp_code: row.get(0)?,
        parent_bp_code: row.get(1)?,
        bp_name: row.get(2)?,
        address: row.get(3)?,
        email: row.get(4)?,
    })
}

const LINE_COLUMNS: &str = "id, bp_id, packing_slip, receipt_no, po_no, item_name,
    actual_receipt_date, receipt_qty, receipt_amount, inv_supplier_no, inv_due_date";

fn line_from_row(row: &Row<'_>) -> rusqlite::Result<InvLine> {
    Ok(InvLine {
        id: row.get(0)?,
        bp_id: row.get(1)?,
        packing_slip: row.get(2)?,
        receipt_no: row.get(3)?,
        po_no: row.get(4)?,
        item_name: row.get(5)?,
        actual_receipt_date: date_column(row, 6)?,
        receipt_qty: row.get(7)?,
        receipt_amount: row.get(8)?,
        inv_supplier_no: row.get(9)?,
        inv_due_date: optional_date_column(row, 10)?,
    })
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SQLite-backed partner and invoice store
///
/// The connection sits behind a Mutex so the store can be shared by reference
/// and still open write transactions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an open connection, creating the schema if needed
    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(UnifyError::poisoned)
    }

    /// Insert or replace partners in one transaction. Returns rows written.
    pub fn upsert_partners(&self, partners: &[Partner]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;

        for partner in partners {
            written += tx.execute(
                "INSERT INTO partners (bp_code, parent_bp_code, bp_name, address, email)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(bp_code) DO UPDATE SET
                    parent_bp_code = excluded.parent_bp_code,
                    bp_name = excluded.bp_name,
                    address = excluded.address,
                    email = excluded.email,
                    updated_at = CURRENT_TIMESTAMP",
                params![
                    partner.bp_code,
                    partner.parent_bp_code,
                    partner.bp_name,
                    partner.address,
                    partner.email,
                ],
            )?;
        }

        tx.commit()?;
        Ok(written)
    }

    pub fn insert_partner(&self, partner: &Partner) -> Result<()> {
        self.upsert_partners(std::slice::from_ref(partner))?;
        Ok(())
    }

    /// Insert lines. Lines with an explicit id that already exists are skipped.
    pub fn insert_lines(&self, lines: &[InvLine]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;

        for line in lines {
            let id = if line.id > 0 { Some(line.id) } else { None };
            inserted += tx.execute(
                "INSERT INTO inv_lines (
                    id, bp_id, packing_slip, receipt_no, po_no, item_name,
                    actual_receipt_date, receipt_qty, receipt_amount,
                    inv_supplier_no, inv_due_date
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    id,
                    line.bp_id,
                    line.packing_slip,
                    line.receipt_no,
                    line.po_no,
                    line.item_name,
                    format_date(&line.actual_receipt_date),
                    line.receipt_qty,
                    line.receipt_amount,
                    line.inv_supplier_no,
                    line.inv_due_date.as_ref().map(format_date),
                ],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Insert headers; a header whose `(inv_no, bp_code)` already exists is skipped
    pub fn insert_headers(&self, headers: &[InvHeader]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        let mut duplicates = 0;

        for header in headers {
            let result = tx.execute(
                "INSERT INTO inv_headers (inv_no, bp_code, status, total_amount, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    header.inv_no,
                    header.bp_code,
                    header.status,
                    header.total_amount,
                    format_timestamp(&header.created_at),
                ],
            );

            match result {
                Ok(_) => inserted += 1,
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    duplicates += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit()?;
        if duplicates > 0 {
            tracing::warn!(duplicates, "skipped invoice headers already present for the same partner");
        }
        Ok(inserted)
    }

    pub fn table_counts(&self) -> Result<TableCounts> {
        let conn = self.lock()?;
        let count = |table: &str| -> Result<i64> {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            Ok(conn.query_row(&sql, [], |row| row.get(0))?)
        };

        Ok(TableCounts {
            partners: count("partners")?,
            inv_lines: count("inv_lines")?,
            inv_headers: count("inv_headers")?,
        })
    }

    /// Audit events recorded for one partner, newest first
    pub fn partner_events(&self, bp_code: &str) -> Result<Vec<Event>> {
        let conn = self.lock()?;
        get_events_for_entity(&conn, "partner", bp_code)
    }
}

impl PartnerStore for SqliteStore {
    fn find_by_code(&self, code: &str) -> Result<Option<Partner>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM partners WHERE bp_code = ?1", PARTNER_COLUMNS);
        Ok(conn
            .query_row(&sql, params![code], partner_from_row)
            .optional()?)
    }

    fn find_by_code_prefix(&self, prefix: &str) -> Result<Vec<Partner>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM partners WHERE bp_code LIKE ?1 ESCAPE '\\' ORDER BY bp_code",
            PARTNER_COLUMNS
        );
        let pattern = format!("{}%", escape_like(prefix));
        let mut stmt = conn.prepare(&sql)?;
        let partners = stmt
            .query_map(params![pattern], partner_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(partners)
    }

    fn find_by_parent(&self, parent: &str) -> Result<Vec<Partner>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM partners WHERE parent_bp_code = ?1 ORDER BY bp_code",
            PARTNER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let partners = stmt
            .query_map(params![parent], partner_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(partners)
    }

    fn all_partners(&self) -> Result<Vec<Partner>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM partners ORDER BY bp_code", PARTNER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let partners = stmt
            .query_map([], partner_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(partners)
    }

    /// One transaction per partner: the update and its audit event land together
    fn set_parent(&self, bp_code: &str, parent_bp_code: Option<&str>) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let previous: Option<Option<String>> = tx
            .query_row(
                "SELECT parent_bp_code FROM partners WHERE bp_code = ?1",
                params![bp_code],
                |row| row.get(0),
            )
            .optional()?;

        let Some(previous) = previous else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE partners
             SET parent_bp_code = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE bp_code = ?2",
            params![parent_bp_code, bp_code],
        )?;

        let event = Event::new(
            "parent_bp_code_updated",
            "partner",
            bp_code,
            serde_json::json!({
                "from": previous,
                "to": parent_bp_code,
            }),
            "parent_link_repair",
        );
        insert_event(&tx, &event)?;

        tx.commit()?;
        Ok(true)
    }
}

impl InvoiceStore for SqliteStore {
    fn find_lines(&self, query: &LineQuery) -> Result<Vec<InvLine>> {
        if query.codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {} FROM inv_lines WHERE bp_id IN ({})",
            LINE_COLUMNS,
            placeholders(query.codes.len())
        );
        let mut args: Vec<String> = query.codes.iter().cloned().collect();

        let text_filters = [
            ("packing_slip", &query.filters.packing_slip),
            ("receipt_no", &query.filters.receipt_no),
            ("po_no", &query.filters.po_no),
        ];
        for (column, needle) in text_filters {
            if let Some(needle) = needle.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                sql.push_str(&format!(" AND {} LIKE ? ESCAPE '\\'", column));
                args.push(format!("%{}%", escape_like(needle)));
            }
        }

        if let Some(from) = &query.filters.date_from {
            sql.push_str(" AND actual_receipt_date >= ?");
            args.push(format_date(from));
        }
        if let Some(to) = &query.filters.date_to {
            sql.push_str(" AND actual_receipt_date <= ?");
            args.push(format_date(to));
        }

        if query.uninvoiced_only {
            sql.push_str(
                " AND (inv_supplier_no IS NULL OR TRIM(inv_supplier_no) = '')
                  AND inv_due_date IS NULL",
            );
        }

        if let Some(cutoff) = &query.received_before {
            sql.push_str(" AND actual_receipt_date < ?");
            args.push(format_date(cutoff));
        }

        sql.push_str(" ORDER BY actual_receipt_date DESC, id DESC");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let lines = stmt
            .query_map(params_from_iter(args.iter()), line_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(codes = query.codes.len(), found = lines.len(), "inv_lines query");
        Ok(lines)
    }

    fn find_headers(&self, codes: &BTreeSet<String>) -> Result<Vec<InvHeader>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;

        let sql = format!(
            "SELECT id, inv_no, bp_code, status, total_amount, created_at
             FROM inv_headers
             WHERE bp_code IN ({})
             ORDER BY created_at DESC, id DESC",
            placeholders(codes.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut headers = stmt
            .query_map(params_from_iter(codes.iter()), |row| {
                Ok(InvHeader {
                    id: row.get(0)?,
                    inv_no: row.get(1)?,
                    bp_code: row.get(2)?,
                    status: row.get(3)?,
                    total_amount: row.get(4)?,
                    created_at: timestamp_column(row, 5)?,
                    lines: Vec::new(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if headers.is_empty() {
            return Ok(headers);
        }

        // Eager-load lines for every header in one query
        let inv_nos: Vec<&str> = headers.iter().map(|h| h.inv_no.as_str()).collect();
        // Another supplier may reuse the same invoice number; only lines of this code set attach
        let sql = format!(
            "SELECT {} FROM inv_lines
             WHERE inv_supplier_no IN ({})
               AND bp_id IN ({})
             ORDER BY actual_receipt_date DESC, id DESC",
            LINE_COLUMNS,
            placeholders(inv_nos.len()),
            placeholders(codes.len())
        );
        let args = inv_nos.iter().copied().chain(codes.iter().map(String::as_str));
        let mut stmt = conn.prepare(&sql)?;
        let lines = stmt
            .query_map(params_from_iter(args), line_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut by_invoice: BTreeMap<String, Vec<InvLine>> = BTreeMap::new();
        for line in lines {
            if let Some(no) = line.inv_supplier_no.clone() {
                by_invoice.entry(no).or_default().push(line);
            }
        }
        for header in &mut headers {
            header.lines = by_invoice.remove(&header.inv_no).unwrap_or_default();
        }

        Ok(headers)
    }

    fn count_headers_by_status(&self, codes: &BTreeSet<String>) -> Result<Vec<(String, i64)>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let sql = format!(
            "SELECT status, COUNT(*) FROM inv_headers
             WHERE bp_code IN ({})
             GROUP BY status
             ORDER BY status",
            placeholders(codes.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let counts = stmt
            .query_map(params_from_iter(codes.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    fn referenced_codes(&self) -> Result<BTreeSet<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT bp_id FROM inv_lines
             UNION
             SELECT bp_code FROM inv_headers",
        )?;
        let codes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(codes)
    }
}
