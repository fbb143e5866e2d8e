// partner-unify - operator CLI for partner code unification
//
// Report commands (lines, headers, dashboard, ...) print exactly what the
// invoice pages would show for a code. check / repair keep parent links in
// shape. Human-readable by default, --json for scripts.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use partner_unify::{
    compare_codes, explain_code, import, load_config, logging, Config, InvHeader,
    InvLine, LineFilters, RepairEngine, SqliteStore, UnifiedQueries,
};

#[derive(Parser)]
#[command(name = "partner-unify")]
#[command(version)]
#[command(about = "Resolve, report on and repair business partner code variants")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to partner-unify.toml next to the binary)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file; overrides config and PARTNER_UNIFY_DB
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Load CSV extracts into the database
    Import {
        #[arg(long)]
        partners: Option<PathBuf>,
        #[arg(long)]
        lines: Option<PathBuf>,
        #[arg(long)]
        headers: Option<PathBuf>,
    },

    /// Show how a code is normalized, classified and resolved
    Explain { code: String },

    /// Print the unified code set
    Resolve { code: String },

    /// Check that two codes see the same data on every report page
    Compare { a: String, b: String },

    /// Invoice lines for a code
    Lines {
        code: String,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Invoice lines not yet attached to an invoice
    Uninvoiced {
        code: String,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Invoice headers with their lines
    Headers { code: String },

    /// Lines received longer ago than the invoicing window
    Outstanding {
        code: String,
        /// Window in days (defaults to [queries] outstanding_cutoff_days)
        #[arg(long)]
        cutoff_days: Option<u32>,
    },

    /// Invoice counts per status
    Dashboard { code: String },

    /// Report parent-link and reference problems (read-only)
    Check,

    /// Recompute parent links; dry run unless --apply
    Repair {
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Args, Default)]
struct FilterArgs {
    #[arg(long)]
    packing_slip: Option<String>,
    #[arg(long)]
    receipt_no: Option<String>,
    #[arg(long)]
    po_no: Option<String>,
    /// Earliest receipt date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Latest receipt date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl From<FilterArgs> for LineFilters {
    fn from(args: FilterArgs) -> Self {
        LineFilters {
            packing_slip: args.packing_slip,
            receipt_no: args.receipt_no,
            po_no: args.po_no,
            date_from: args.from,
            date_to: args.to,
        }
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    logging::init(&config.logging.filter);
    tracing::debug!(source = %config.source, "configuration loaded");

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let out = Output { json: cli.json };

    match cli.command {
        Commands::Init => run_init(&store, &db_path, &out),
        Commands::Import {
            partners,
            lines,
            headers,
        } => run_import(&store, partners, lines, headers, &out),
        Commands::Explain { code } => {
            let explained = explain_code(&store, &code)?;
            out.emit(&explained, || {
                println!("🔎 {:?} → {}", explained.input, explained.normalized);
                println!("   suffixed:      {}", explained.is_suffixed);
                println!("   base code:     {}", explained.base_code);
                println!("   stored:        {}", explained.stored);
                println!("   parent:        {}", show(&explained.stored_parent));
                println!("   expected:      {}", show(&explained.expected_parent));
                println!("   base exists:   {}", explained.base_record_exists);
                println!("   unified set:   {}", join(&explained.unified_set));
                if explained.parent_mismatch() {
                    println!("⚠️  parent link disagrees with the code (run `repair`)");
                }
            })
        }
        Commands::Resolve { code } => {
            let set = UnifiedQueries::new(&store).resolve(code.as_str())?;
            out.emit(&set, || {
                for member in &set {
                    println!("{}", member);
                }
            })
        }
        Commands::Compare { a, b } => {
            let queries = queries(&store, &config);
            let report = compare_codes(&queries, &a, &b)?;
            out.emit(&report, || {
                let mark = if report.is_equivalent() { "✅" } else { "❌" };
                println!("{} {}", mark, report.summary());
            })
        }
        Commands::Lines { code, filters } => {
            let lines = queries(&store, &config).unified_inv_lines(code.as_str(), &filters.into())?;
            out.emit(&lines, || print_lines(&lines))
        }
        Commands::Uninvoiced { code, filters } => {
            let lines = queries(&store, &config)
                .unified_uninvoiced_inv_lines(code.as_str(), &filters.into())?;
            out.emit(&lines, || print_lines(&lines))
        }
        Commands::Headers { code } => {
            let headers = queries(&store, &config).unified_inv_headers(code.as_str())?;
            out.emit(&headers, || print_headers(&headers))
        }
        Commands::Outstanding { code, cutoff_days } => {
            let queries = queries(&store, &config);
            let outstanding = match cutoff_days {
                Some(days) => queries.unified_outstanding_inv_lines(code.as_str(), days)?,
                None => queries.unified_outstanding_inv_lines_default(code.as_str())?,
            };
            out.emit(&outstanding, || {
                for item in &outstanding {
                    println!(
                        "{:>4}d  {}  {}  {}",
                        item.days_outstanding,
                        item.line.actual_receipt_date,
                        item.line.bp_id,
                        item.advisory
                    );
                }
                println!("{} outstanding line(s)", outstanding.len());
            })
        }
        Commands::Dashboard { code } => {
            let counts = queries(&store, &config).unified_dashboard_data(code.as_str())?;
            out.emit(&counts, || {
                println!("📊 Dashboard for {}", code.trim().to_uppercase());
                println!("   New:              {}", counts.new_invoices);
                println!("   In Process:       {}", counts.in_process_invoices);
                println!("   Rejected:         {}", counts.rejected_invoices);
                println!("   Ready To Payment: {}", counts.ready_to_payment_invoices);
                println!("   Paid:             {}", counts.paid_invoices);
            })
        }
        Commands::Check => {
            let report = RepairEngine::new(&store).check()?;
            out.emit(&report, || {
                for finding in &report.findings {
                    println!("⚠️  {}", finding.describe());
                }
                println!("{}", report.summary());
            })
        }
        Commands::Repair { apply } => {
            let report = RepairEngine::new(&store).repair_parent_links(!apply)?;
            out.emit(&report, || {
                for correction in &report.corrections {
                    println!(
                        "🔧 {}: {} → {}",
                        correction.bp_code,
                        show(&correction.from),
                        show(&correction.to)
                    );
                }
                for finding in &report.findings {
                    println!("⚠️  {}", finding.describe());
                }
                println!("{}", report.summary());
                if report.dry_run && !report.corrections.is_empty() {
                    println!("(dry run - pass --apply to write)");
                }
            })
        }
    }
}

fn queries<'a>(store: &'a SqliteStore, config: &Config) -> UnifiedQueries<'a, SqliteStore> {
    UnifiedQueries::new(store).with_outstanding_cutoff(config.queries.outstanding_cutoff_days)
}

fn run_init(store: &SqliteStore, db_path: &std::path::Path, out: &Output) -> Result<()> {
    let counts = store.table_counts()?;
    out.emit(&counts, || {
        println!("🔧 Database ready at {}", db_path.display());
        println!(
            "   partners: {}, inv_lines: {}, inv_headers: {}",
            counts.partners, counts.inv_lines, counts.inv_headers
        );
    })
}

fn run_import(
    store: &SqliteStore,
    partners: Option<PathBuf>,
    lines: Option<PathBuf>,
    headers: Option<PathBuf>,
    out: &Output,
) -> Result<()> {
    if partners.is_none() && lines.is_none() && headers.is_none() {
        anyhow::bail!("Nothing to import: pass --partners, --lines and/or --headers");
    }

    if let Some(path) = partners {
        let records = import::load_partners_csv(&path)
            .with_context(|| format!("Failed to load partners from {}", path.display()))?;
        let written = store.upsert_partners(&records)?;
        out.say(&format!("✓ {} partner(s) loaded from {}", written, path.display()));
    }

    if let Some(path) = lines {
        let records = import::load_inv_lines_csv(&path)
            .with_context(|| format!("Failed to load invoice lines from {}", path.display()))?;
        let inserted = store.insert_lines(&records)?;
        out.say(&format!("✓ {} invoice line(s) loaded from {}", inserted, path.display()));
    }

    if let Some(path) = headers {
        let records = import::load_inv_headers_csv(&path)
            .with_context(|| format!("Failed to load invoice headers from {}", path.display()))?;
        let inserted = store.insert_headers(&records)?;
        out.say(&format!("✓ {} invoice header(s) loaded from {}", inserted, path.display()));
    }

    let counts = store.table_counts()?;
    out.emit(&counts, || {
        println!(
            "🗄️  Database now holds {} partners, {} lines, {} headers",
            counts.partners, counts.inv_lines, counts.inv_headers
        );
    })
}

// ============================================================================
// OUTPUT
// ============================================================================

struct Output {
    json: bool,
}

impl Output {
    /// JSON when asked for, otherwise the human-readable printer
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }

    /// Progress text, suppressed in JSON mode
    fn say(&self, message: &str) {
        if !self.json {
            println!("{}", message);
        }
    }
}

fn show(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn join<'a>(codes: impl IntoIterator<Item = &'a String>) -> String {
    let joined: Vec<&str> = codes.into_iter().map(String::as_str).collect();
    if joined.is_empty() {
        "(empty)".to_string()
    } else {
        joined.join(", ")
    }
}

fn print_lines(lines: &[InvLine]) {
    for line in lines {
        println!(
            "{}  {:<12} {:<14} {:<12} {:<10} {:>10.2}  {}",
            line.actual_receipt_date,
            line.bp_id,
            line.packing_slip.as_deref().unwrap_or("-"),
            line.receipt_no.as_deref().unwrap_or("-"),
            line.po_no.as_deref().unwrap_or("-"),
            line.receipt_amount,
            line.inv_supplier_no.as_deref().unwrap_or("")
        );
    }
    println!("{} line(s)", lines.len());
}

fn print_headers(headers: &[InvHeader]) {
    for header in headers {
        println!(
            "{}  {:<12} {:<12} {:<16} {:>12.2}  ({} lines)",
            header.created_at.format("%Y-%m-%d %H:%M"),
            header.inv_no,
            header.bp_code,
            header.status,
            header.total_amount,
            header.lines.len()
        );
    }
    println!("{} invoice(s)", headers.len());
}
