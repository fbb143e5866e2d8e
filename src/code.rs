// 🔤 Partner Code Algebra - normalize, classify, strip suffixes
//
// Two identifier schemes live side by side in the partner table:
// - "new system" codes are canonical:    SLAPMTI
// - "old system" codes carry a suffix:   SLAPMTI-1, SLAPMTI-2
//
// A suffix is one or more `-<digits>` groups at the very end of the code.
// Anything else at the end (`SLAPMTI-A`, `SLAPMTI.`) is part of the name.
//
// NOTE: a real business name that happens to end in `-<digits>` (SL2024-5)
// is indistinguishable from a legacy suffix. We classify it as suffixed,
// exactly like the legacy data does, and leave the decision to the business.
//
// NOTE: a suffix needs a stem in front of it. `-12` on its own is not a
// suffixed code even though it ends in `-<digits>`; it stays canonical and
// is its own base, so it never resolves to an empty base code.

use once_cell::sync::Lazy;
use regex::Regex;

static SUFFIX_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:-[0-9]+)+$").expect("suffix pattern is valid"));

static LAST_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([0-9]+)$").expect("suffix pattern is valid"));

/// Trim surrounding whitespace and uppercase
///
/// Example: "  slapmti-1 " → "SLAPMTI-1"
pub fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Byte offset where the suffix starts, if the code has a stem in front of it
fn suffix_start(code: &str) -> Option<usize> {
    SUFFIX_TAIL
        .find(code)
        .map(|m| m.start())
        .filter(|start| *start > 0)
}

/// True when the code ends in `-<digits>` (legacy "old system" code)
pub fn is_suffixed(code: &str) -> bool {
    suffix_start(code).is_some()
}

/// True when the code has no legacy suffix. Empty input is canonical.
pub fn is_canonical(code: &str) -> bool {
    !is_suffixed(code)
}

/// Business name for [`is_suffixed`], as used by the reporting pages
pub fn is_old_system_bp_code(code: &str) -> bool {
    is_suffixed(code)
}

/// Strip the legacy suffix to get the canonical (parent) code
///
/// Stacked suffixes are stripped together, so the result is always canonical:
/// - "SLAPMTI-2"   → "SLAPMTI"
/// - "SLAPMTI-1-3" → "SLAPMTI"
/// - "SLAPMTI"     → "SLAPMTI"
pub fn base_code(code: &str) -> String {
    match suffix_start(code) {
        Some(start) => code[..start].to_string(),
        None => code.to_string(),
    }
}

/// The numeric value of the last suffix group, if any
pub fn suffix_number(code: &str) -> Option<u32> {
    if !is_suffixed(code) {
        return None;
    }
    LAST_SUFFIX
        .captures(code)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// Build the suffixed form of a canonical code
pub fn suffixed_code(base: &str, n: u32) -> String {
    format!("{}-{}", base, n)
}

/// True when `code` is `base` itself or one of its suffixed children
pub fn shares_base(code: &str, base: &str) -> bool {
    base_code(code) == base
}
