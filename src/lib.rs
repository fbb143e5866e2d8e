// Partner Code Unification - Core Library
// Exposes all modules for use in the CLI and tests

pub mod code;           // Code algebra: normalize, classify, base code
pub mod entities;       // Partner, invoice line, invoice header
pub mod error;
pub mod store;          // Storage seams (PartnerStore, InvoiceStore)
pub mod db;             // SQLite store + audit events
pub mod memory;         // In-memory store
pub mod resolver;       // Unified code set
pub mod aggregation;    // Report adapters over the unified set
pub mod repair;         // Parent-link repair + consistency checks
pub mod diagnostics;    // explain / compare
pub mod import;         // CSV extracts
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use code::{
    base_code, is_canonical, is_old_system_bp_code, is_suffixed, normalize,
};
pub use entities::{InvHeader, InvLine, InvoiceStatus, Partner};
pub use error::{Result, UnifyError};
pub use store::{InvoiceStore, LineFilters, LineQuery, PartnerStore};
pub use db::{Event, SqliteStore, TableCounts, setup_database, insert_event, get_events_for_entity};
pub use memory::InMemoryStore;
pub use resolver::UnifiedCodeResolver;
pub use aggregation::{
    DashboardCounts, OutstandingInvLine, UnifiedQueries,
    DEFAULT_OUTSTANDING_CUTOFF_DAYS, OUTSTANDING_ADVISORY,
};
pub use repair::{
    ConsistencyReport, Correction, Finding, RepairEngine, RepairReport, Severity,
};
pub use diagnostics::{compare_codes, explain_code, CodeExplanation, CodeView, EquivalenceReport};
pub use import::{load_inv_headers_csv, load_inv_lines_csv, load_partners_csv};
pub use config::{load_config, Config};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
