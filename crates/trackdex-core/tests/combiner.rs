use chrono::{DateTime, TimeZone, Utc};
use trackdex_bucket::{BucketStore, MemoryBucketStore};
use trackdex_core::builder::{build_tracking_index, BuildConfig};
use trackdex_core::combiner::{combine_manifests, CombineConfig};
use trackdex_core::types::SupplierType;
use trackdex_parser::{read_rows, ManifestFormat};

fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

fn sanmar_csv(rows: &[(&str, &str, &str)]) -> String {
    let mut out = String::from(
        "Date,Invoice,Customer,Warehouse,PO,Qty,Weight,Service,Void,Misc,Extra,Tracking1,Tracking2\n",
    );
    for &(customer, po, tracking) in rows {
        out.push_str(&format!(",,{customer},,{po},,,,,,,{tracking},\n"));
    }
    out
}

fn ss_workbook(rows: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut book = rust_xlsxwriter::Workbook::new();
    let sheet = book.add_worksheet();
    sheet.write_string(0, 0, "S&S Activewear Shipment Report").unwrap();
    let headers = [
        "Date", "Customer", "PO", "Qty", "Weight", "Service", "Void", "Tracking Number",
    ];
    for (c, header) in headers.iter().enumerate() {
        sheet.write_string(1, c as u16, *header).unwrap();
    }
    for (r, &(customer, po, tracking)) in rows.iter().enumerate() {
        sheet.write_string(2 + r as u32, 1, customer).unwrap();
        sheet.write_string(2 + r as u32, 2, po).unwrap();
        sheet.write_string(2 + r as u32, 7, tracking).unwrap();
    }
    book.save_to_buffer().unwrap()
}

async fn combined_rows(store: &MemoryBucketStore, path: &str, format: ManifestFormat) -> Vec<Vec<String>> {
    let bytes = store.get(path).await.expect("combined file missing");
    read_rows(&bytes, format).expect("combined file unreadable")
}

#[tokio::test]
async fn newest_daily_wins_and_dailies_are_consumed() {
    let store = MemoryBucketStore::new();
    store.insert_at(
        "manifests/sanmar_2024-01-01.csv",
        sanmar_csv(&[
            ("Acme", "PO-OLD", "1Z999AA10123456784"),
            ("Bolt", "PO-B", "1Z999AA10111111111"),
        ]),
        ts(1, 8),
    );
    store.insert_at(
        "manifests/sanmar_2024-01-02.csv",
        sanmar_csv(&[("Acme", "PO-NEW", "1Z999AA10123456784")]),
        ts(2, 8),
    );

    let summary = combine_manifests(&store, &CombineConfig::default())
        .await
        .unwrap();

    let report = summary
        .suppliers
        .iter()
        .find(|r| r.supplier == SupplierType::Sanmar)
        .unwrap();
    assert_eq!(report.daily_files, 2);
    assert_eq!(report.rows_in, 3);
    assert_eq!(report.rows_kept, 2);
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(
        report.combined_path.as_deref(),
        Some("manifests/sanmar_combined.csv")
    );

    // The compacted dailies are gone.
    assert!(!store.contains("manifests/sanmar_2024-01-01.csv"));
    assert!(!store.contains("manifests/sanmar_2024-01-02.csv"));

    let rows = combined_rows(&store, "manifests/sanmar_combined.csv", ManifestFormat::Csv).await;
    assert_eq!(rows[0][0], "Date");
    // Newest file's rows come first; the duplicate tracking kept PO-NEW.
    assert_eq!(rows[1][4], "PO-NEW");
    assert_eq!(rows[2][4], "PO-B");
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn prior_combined_rows_are_folded_in_as_oldest() {
    let store = MemoryBucketStore::new();

    store.insert_at(
        "manifests/sanmar_2024-01-01.csv",
        sanmar_csv(&[("Acme", "PO-1", "1Z999AA10123456784")]),
        ts(1, 8),
    );
    combine_manifests(&store, &CombineConfig::default())
        .await
        .unwrap();

    // A later daily arrives with one new and one already-combined tracking.
    store.insert_at(
        "manifests/sanmar_2024-01-05.csv",
        sanmar_csv(&[
            ("Acme", "PO-1-NEW", "1Z999AA10123456784"),
            ("Bolt", "PO-2", "1Z999AA10122222222"),
        ]),
        ts(5, 8),
    );
    let summary = combine_manifests(&store, &CombineConfig::default())
        .await
        .unwrap();

    let report = summary
        .suppliers
        .iter()
        .find(|r| r.supplier == SupplierType::Sanmar)
        .unwrap();
    assert_eq!(report.daily_files, 1);
    assert_eq!(report.duplicates_dropped, 1);

    let rows = combined_rows(&store, "manifests/sanmar_combined.csv", ManifestFormat::Csv).await;
    let pos: Vec<&str> = rows[1..].iter().map(|row| row[4].as_str()).collect();
    // Daily rows outrank the prior combined row for the shared tracking.
    assert_eq!(pos, vec!["PO-1-NEW", "PO-2"]);
}

#[tokio::test]
async fn combining_twice_is_stable() {
    let store = MemoryBucketStore::new();
    store.insert_at(
        "manifests/sanmar_2024-01-01.csv",
        sanmar_csv(&[
            ("Acme", "PO-1", "1Z999AA10123456784"),
            ("Bolt", "PO-2", "1Z999AA10122222222"),
        ]),
        ts(1, 8),
    );

    let config = CombineConfig::default();
    combine_manifests(&store, &config).await.unwrap();
    let first = combined_rows(&store, "manifests/sanmar_combined.csv", ManifestFormat::Csv).await;

    combine_manifests(&store, &config).await.unwrap();
    let second = combined_rows(&store, "manifests/sanmar_combined.csv", ManifestFormat::Csv).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn ss_combined_file_reproduces_the_banner_offset() {
    let store = MemoryBucketStore::new();
    store.insert_at(
        "manifests/ss_2024-01-01.xlsx",
        ss_workbook(&[("Acme", "PO-1", "1Z5V330A0311234567")]),
        ts(1, 8),
    );
    store.insert_at(
        "manifests/ss_2024-01-02.xlsx",
        ss_workbook(&[("Bolt", "PO-2", "1Z5V330A0322222222")]),
        ts(2, 8),
    );

    combine_manifests(&store, &CombineConfig::default())
        .await
        .unwrap();

    let rows = combined_rows(
        &store,
        "manifests/ss_combined.xlsx",
        ManifestFormat::Workbook,
    )
    .await;
    // Blank banner row, then the header row, then data, exactly like a
    // daily file.
    assert!(rows[0].iter().all(|cell| cell.is_empty()));
    assert_eq!(rows[1][7], "Tracking Number");
    assert_eq!(rows[2][7], "1Z5V330A0322222222");
    assert_eq!(rows[3][7], "1Z5V330A0311234567");

    // The builder parses the combined file with the same profile it uses
    // for dailies.
    let outcome = build_tracking_index(&store, &BuildConfig::default())
        .await
        .unwrap();
    assert_eq!(outcome.index.len(), 2);
    assert_eq!(outcome.index["1Z5V330A0322222222"].po, "PO-2");
    assert_eq!(
        outcome.index["1Z5V330A0322222222"].source,
        "ss_combined.xlsx"
    );
}

#[tokio::test]
async fn rows_without_trackings_are_carried_through() {
    let store = MemoryBucketStore::new();
    let mut csv = sanmar_csv(&[("Acme", "PO-1", "1Z999AA10123456784")]);
    // A note row with no extractable tracking.
    csv.push_str(",,Subtotal,,,,,,,,,,\n");
    store.insert_at("manifests/sanmar_2024-01-01.csv", csv, ts(1, 8));

    let summary = combine_manifests(&store, &CombineConfig::default())
        .await
        .unwrap();
    let report = summary
        .suppliers
        .iter()
        .find(|r| r.supplier == SupplierType::Sanmar)
        .unwrap();
    assert_eq!(report.rows_kept, 2);
    assert_eq!(report.duplicates_dropped, 0);
}

#[tokio::test]
async fn suppliers_without_dailies_are_left_alone() {
    let store = MemoryBucketStore::new();
    store.insert_at(
        "manifests/sanmar_combined.csv",
        sanmar_csv(&[("Acme", "PO-1", "1Z999AA10123456784")]),
        ts(1, 8),
    );

    let before = store.get("manifests/sanmar_combined.csv").await.unwrap();
    let summary = combine_manifests(&store, &CombineConfig::default())
        .await
        .unwrap();
    let after = store.get("manifests/sanmar_combined.csv").await.unwrap();

    let report = summary
        .suppliers
        .iter()
        .find(|r| r.supplier == SupplierType::Sanmar)
        .unwrap();
    assert_eq!(report.daily_files, 0);
    assert_eq!(report.combined_path, None);
    assert_eq!(before, after);
}
