// CSV extracts → database file → repair → reopen

use partner_unify::{
    load_inv_headers_csv, load_inv_lines_csv, load_partners_csv, Finding, LineFilters,
    PartnerStore, RepairEngine, SqliteStore, UnifiedQueries,
};
use std::fs;
use std::path::Path;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn import_repair_and_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let partners = write(
        dir.path(),
        "partners.csv",
        "bp_code,parent_bp_code,bp_name\n\
         slapmti,,PT Slamet Mandiri\n\
         slapmti-1,,PT Slamet Mandiri (old)\n\
         SLAPMTI-2,slapmti-1,\n\
         GHOST-4,,\n",
    );
    let lines = write(
        dir.path(),
        "lines.csv",
        "bp_id,po_no,actual_receipt_date,receipt_qty,receipt_amount,inv_supplier_no\n\
         slapmti-1,PO-1,2025-01-02,1,10,INV-1\n\
         SLAPMTI-2,PO-2,2025-01-03,2,20,\n\
         UNKNOWN,PO-3,2025-01-04,3,30,\n",
    );
    let headers = write(
        dir.path(),
        "headers.csv",
        "inv_no,bp_code,status,total_amount,created_at\n\
         INV-1,slapmti,Paid,10,2025-01-05T10:00:00Z\n",
    );

    let db_path = dir.path().join("db").join("partners.db");
    {
        let store = SqliteStore::open(&db_path).unwrap();
        store.upsert_partners(&load_partners_csv(&partners).unwrap()).unwrap();
        store.insert_lines(&load_inv_lines_csv(&lines).unwrap()).unwrap();
        store.insert_headers(&load_inv_headers_csv(&headers).unwrap()).unwrap();

        let counts = store.table_counts().unwrap();
        assert_eq!((counts.partners, counts.inv_lines, counts.inv_headers), (4, 3, 1));

        let check = RepairEngine::new(&store).check().unwrap();
        assert!(check
            .findings
            .contains(&Finding::UnknownPartnerReference {
                bp_code: "UNKNOWN".to_string()
            }));

        let report = RepairEngine::new(&store).repair_parent_links(false).unwrap();
        assert_eq!(report.changed, 2);
        assert_eq!(report.findings.len(), 1);
    }

    // Everything persisted, including the audit trail
    let store = SqliteStore::open(&db_path).unwrap();
    let child = store.find_by_code("SLAPMTI-2").unwrap().unwrap();
    assert_eq!(child.parent_bp_code.as_deref(), Some("SLAPMTI"));

    let events = store.partner_events("SLAPMTI-2").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data["from"], "SLAPMTI-1");
    assert_eq!(events[0].data["to"], "SLAPMTI");

    let queries = UnifiedQueries::new(&store);
    let all = queries.unified_inv_lines("slapmti", &LineFilters::default()).unwrap();
    assert_eq!(all.len(), 2);

    let headers = queries.unified_inv_headers("SLAPMTI-2").unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].lines.len(), 1);
    assert_eq!(headers[0].lines[0].bp_id, "SLAPMTI-1");

    let uninvoiced = queries
        .unified_uninvoiced_inv_lines("SLAPMTI-1", &LineFilters::default())
        .unwrap();
    assert_eq!(uninvoiced.len(), 1);
    assert_eq!(uninvoiced[0].po_no.as_deref(), Some("PO-2"));
}
