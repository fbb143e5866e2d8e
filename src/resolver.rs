// 🔗 Unified Code Resolver - every code that means "the same partner"
//
// Given ANY variant of a partner code (SLAPMTI, SLAPMTI-2, " slapmti-1 "),
// return the full set of stored codes that belong to the same base:
//
//   bp_code == code
//   bp_code == base
//   parent_bp_code == base
//   bp_code LIKE 'base-%'   (confirmed: base_code(bp_code) == base)
//
// The LIKE lookup duplicates the parent lookup on purpose: parent_bp_code was
// backfilled after the legacy import and is known to be missing or wrong for
// some rows. Keep both.
//
// Every lookup depends only on `base`, so two codes with the same base
// always resolve to the same set.

use crate::code;
use crate::entities::Partner;
use crate::error::Result;
use crate::store::PartnerStore;
use std::collections::{BTreeMap, BTreeSet};

pub struct UnifiedCodeResolver<'a, S: PartnerStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: PartnerStore + ?Sized> UnifiedCodeResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        UnifiedCodeResolver { store }
    }

    /// Resolve a raw code to its unified code set
    ///
    /// Accepts `&str` or `Option<&str>`; absent, empty and whitespace-only
    /// input yields the empty set.
    ///
    /// Example:
    /// ```
    /// use partner_unify::{InMemoryStore, Partner, UnifiedCodeResolver};
    ///
    /// let store = InMemoryStore::new();
    /// store.insert_partner(Partner::new("SLAPMTI")).unwrap();
    /// store.insert_partner(Partner::new("SLAPMTI-1").with_parent("SLAPMTI")).unwrap();
    ///
    /// let resolver = UnifiedCodeResolver::new(&store);
    /// let set = resolver.resolve("slapmti-1").unwrap();
    /// assert_eq!(set.len(), 2);
    /// assert!(resolver.resolve(None).unwrap().is_empty());
    /// ```
    pub fn resolve<'c>(&self, raw: impl Into<Option<&'c str>>) -> Result<BTreeSet<String>> {
        Ok(self
            .resolve_partners(raw)?
            .into_iter()
            .map(|p| p.bp_code)
            .collect())
    }

    /// Same lookup as [`resolve`](Self::resolve), returning the partner records
    /// ordered by `bp_code`
    pub fn resolve_partners<'c>(&self, raw: impl Into<Option<&'c str>>) -> Result<Vec<Partner>> {
        let code = match raw.into().map(code::normalize) {
            Some(code) if !code.is_empty() => code,
            _ => return Ok(Vec::new()),
        };
        let base = code::base_code(&code);

        let mut matched: BTreeMap<String, Partner> = BTreeMap::new();

        if let Some(partner) = self.store.find_by_code(&code)? {
            matched.insert(partner.bp_code.clone(), partner);
        }

        if base != code {
            if let Some(partner) = self.store.find_by_code(&base)? {
                matched.insert(partner.bp_code.clone(), partner);
            }
        }

        for partner in self.store.find_by_parent(&base)? {
            matched.insert(partner.bp_code.clone(), partner);
        }

        let prefix = format!("{}-", base);
        for partner in self.store.find_by_code_prefix(&prefix)? {
            if code::shares_base(&partner.bp_code, &base) {
                matched.insert(partner.bp_code.clone(), partner);
            }
        }

        tracing::debug!(
            code = %code,
            base = %base,
            resolved = matched.len(),
            "resolved unified code set"
        );

        Ok(matched.into_values().collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================
