// 🧠 In-memory store - same contract as the SQLite store, no database
//
// Used by tests and by callers that hold partner data in memory instead of
// a database file. Collections live behind RwLocks like the
// entity registries do.

use crate::entities::{InvHeader, InvLine, Partner};
use crate::error::{Result, UnifyError};
use crate::store::{InvoiceStore, LineQuery, PartnerStore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

#[derive(Clone, Default)]
pub struct InMemoryStore {
    /// Partners keyed by bp_code
    partners: Arc<RwLock<BTreeMap<String, Partner>>>,
    lines: Arc<RwLock<Vec<InvLine>>>,
    headers: Arc<RwLock<Vec<InvHeader>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a partner
    pub fn insert_partner(&self, partner: Partner) -> Result<()> {
        let mut partners = self.partners.write().map_err(UnifyError::poisoned)?;
        partners.insert(partner.bp_code.clone(), partner);
        Ok(())
    }

    /// Append a line, assigning an id when it has none
    pub fn insert_line(&self, mut line: InvLine) -> Result<i64> {
        let mut lines = self.lines.write().map_err(UnifyError::poisoned)?;
        if line.id == 0 {
            line.id = lines.len() as i64 + 1;
        }
        let id = line.id;
        lines.push(line);
        Ok(id)
    }

    /// Append a header, assigning an id when it has none. Stored without lines.
    pub fn insert_header(&self, mut header: InvHeader) -> Result<i64> {
        let mut headers = self.headers.write().map_err(UnifyError::poisoned)?;
        if header.id == 0 {
            header.id = headers.len() as i64 + 1;
        }
        header.lines.clear();
        let id = header.id;
        headers.push(header);
        Ok(id)
    }

    pub fn partner_count(&self) -> Result<usize> {
        Ok(self.partners.read().map_err(UnifyError::poisoned)?.len())
    }
}

impl PartnerStore for InMemoryStore {
    fn find_by_code(&self, code: &str) -> Result<Option<Partner>> {
        let partners = self.partners.read().map_err(UnifyError::poisoned)?;
        Ok(partners.get(code).cloned())
    }

    fn find_by_code_prefix(&self, prefix: &str) -> Result<Vec<Partner>> {
        let partners = self.partners.read().map_err(UnifyError::poisoned)?;
        Ok(partners
            .values()
            .filter(|p| p.bp_code.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn find_by_parent(&self, parent: &str) -> Result<Vec<Partner>> {
        let partners = self.partners.read().map_err(UnifyError::poisoned)?;
        Ok(partners
            .values()
            .filter(|p| p.parent_bp_code.as_deref() == Some(parent))
            .cloned()
            .collect())
    }

    fn all_partners(&self) -> Result<Vec<Partner>> {
        let partners = self.partners.read().map_err(UnifyError::poisoned)?;
        Ok(partners.values().cloned().collect())
    }

    fn set_parent(&self, bp_code: &str, parent_bp_code: Option<&str>) -> Result<bool> {
        let mut partners = self.partners.write().map_err(UnifyError::poisoned)?;
        match partners.get_mut(bp_code) {
            Some(partner) => {
                partner.parent_bp_code = parent_bp_code.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl InvoiceStore for InMemoryStore {
    fn find_lines(&self, query: &LineQuery) -> Result<Vec<InvLine>> {
        let lines = self.lines.read().map_err(UnifyError::poisoned)?;
        let mut found: Vec<InvLine> = lines.iter().filter(|l| query.matches(l)).cloned().collect();
        found.sort_by(|a, b| {
            b.actual_receipt_date
                .cmp(&a.actual_receipt_date)
                .then(b.id.cmp(&a.id))
        });
        Ok(found)
    }

    fn find_headers(&self, codes: &BTreeSet<String>) -> Result<Vec<InvHeader>> {
        let headers = self.headers.read().map_err(UnifyError::poisoned)?;
        let lines = self.lines.read().map_err(UnifyError::poisoned)?;

        let mut found: Vec<InvHeader> = headers
            .iter()
            .filter(|h| codes.contains(&h.bp_code))
            .cloned()
            .collect();

        for header in &mut found {
            let mut attached: Vec<InvLine> = lines
                .iter()
                .filter(|l| codes.contains(&l.bp_id))
                .filter(|l| l.inv_supplier_no.as_deref() == Some(header.inv_no.as_str()))
                .cloned()
                .collect();
            attached.sort_by(|a, b| b.actual_receipt_date.cmp(&a.actual_receipt_date));
            header.lines = attached;
        }

        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    fn count_headers_by_status(&self, codes: &BTreeSet<String>) -> Result<Vec<(String, i64)>> {
        let headers = self.headers.read().map_err(UnifyError::poisoned)?;
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for header in headers.iter().filter(|h| codes.contains(&h.bp_code)) {
            *counts.entry(header.status.clone()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    fn referenced_codes(&self) -> Result<BTreeSet<String>> {
        let headers = self.headers.read().map_err(UnifyError::poisoned)?;
        let lines = self.lines.read().map_err(UnifyError::poisoned)?;
        Ok(lines
            .iter()
            .map(|l| l.bp_id.clone())
            .chain(headers.iter().map(|h| h.bp_code.clone()))
            .collect())
    }
}
