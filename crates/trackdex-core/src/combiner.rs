//! Periodic compaction of per-supplier daily manifests.
//!
//! Each supplier's daily files are scanned newest-first and deduplicated
//! by normalized tracking, newest file wins. That recency-first precedence
//! is distinct from the index builder's combined-before-daily convention;
//! both conventions are preserved as found. The prior combined file is
//! folded in as the oldest input so compaction never loses rows, and the
//! consumed dailies are deleted only after the new combined file is
//! written.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use tracing::{info, warn};

use trackdex_bucket::BucketStore;

use crate::columns::{self, resolve_column};
use crate::detect::{profile_for, CombinedSpec, Extraction, SupplierProfile, SUPPLIER_SCAN_ORDER};
use crate::fetch::{fetch_manifests, manifest_rows, FetchedManifest};
use crate::orders::is_order_source;
use crate::tracking::{fixed_column_trackings, scanned_trackings};
use crate::types::{CombineSummary, FileOutcome, SupplierCombineReport};

#[derive(Debug, Clone)]
pub struct CombineConfig {
    pub manifest_prefix: String,
    pub fetch_timeout: Duration,
    pub fetch_concurrency: usize,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            manifest_prefix: "manifests/".to_string(),
            fetch_timeout: Duration::from_secs(30),
            fetch_concurrency: 8,
        }
    }
}

/// Run the combiner over every supplier that has a combined-file spec.
pub async fn combine_manifests(
    store: &dyn BucketStore,
    config: &CombineConfig,
) -> Result<CombineSummary> {
    let started = Instant::now();

    let listing = store
        .list(&config.manifest_prefix)
        .await
        .context("failed to list manifests")?;

    let manifests = fetch_manifests(
        store,
        config.fetch_timeout,
        config.fetch_concurrency,
        listing,
    )
    .await;

    let mut suppliers = Vec::new();
    for supplier in SUPPLIER_SCAN_ORDER {
        let profile = profile_for(supplier).expect("scan-order supplier lacks profile");
        let Some(spec) = profile.combined else {
            continue;
        };
        suppliers.push(combine_supplier(store, config, profile, spec, &manifests).await);
    }

    let summary = CombineSummary {
        suppliers,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        suppliers = summary.suppliers.len(),
        duration_ms = summary.duration_ms,
        "combine run finished"
    );
    Ok(summary)
}

async fn combine_supplier(
    store: &dyn BucketStore,
    config: &CombineConfig,
    profile: &SupplierProfile,
    spec: CombinedSpec,
    manifests: &[FetchedManifest],
) -> SupplierCombineReport {
    let supplier = profile.supplier;

    // Dailies newest-first, then the prior combined file as the oldest
    // input so its rows only survive where no daily supersedes them.
    let mut dailies: Vec<&FetchedManifest> = manifests
        .iter()
        .filter(|m| m.supplier == supplier && !m.is_combined() && !is_order_source(&m.filename))
        .collect();
    dailies.sort_by(|a, b| {
        b.meta
            .uploaded_at
            .cmp(&a.meta.uploaded_at)
            .then_with(|| a.meta.path.cmp(&b.meta.path))
    });
    let prior_combined: Vec<&FetchedManifest> = manifests
        .iter()
        .filter(|m| m.supplier == supplier && m.is_combined())
        .collect();

    let mut report = SupplierCombineReport {
        supplier,
        daily_files: dailies.len(),
        rows_in: 0,
        rows_kept: 0,
        duplicates_dropped: 0,
        combined_path: None,
        files: Vec::new(),
    };

    if dailies.is_empty() {
        // Nothing to compact; the existing combined file stands.
        return report;
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut header_superset: Vec<String> = Vec::new();
    let mut kept_rows: Vec<Vec<String>> = Vec::new();
    let mut consumed_dailies: Vec<String> = Vec::new();
    let mut prior_combined_lost = false;

    for (manifest, is_daily) in dailies
        .iter()
        .map(|m| (*m, true))
        .chain(prior_combined.iter().map(|m| (*m, false)))
    {
        let rows = match manifest_rows(manifest) {
            Ok(rows) => rows,
            Err(file_report) => {
                if !is_daily {
                    prior_combined_lost = true;
                }
                report.files.push(file_report);
                continue;
            }
        };
        let Some(headers) = rows.get(profile.header_row) else {
            report.files.push(manifest.report(manifest.kind(), FileOutcome::Empty));
            continue;
        };
        for header in headers {
            if !header_superset.contains(header) {
                header_superset.push(header.clone());
            }
        }

        let data = &rows[profile.header_row + 1..];
        report.rows_in += data.len();
        let mut kept_here = 0usize;
        for row in data {
            match row_tracking_key(profile, row, headers) {
                Some(key) if seen.contains(&key) => report.duplicates_dropped += 1,
                Some(key) => {
                    seen.insert(key);
                    kept_rows.push(row.clone());
                    kept_here += 1;
                }
                // Rows without an extractable tracking are carried through
                // unchanged; they never participate in deduplication.
                None => {
                    kept_rows.push(row.clone());
                    kept_here += 1;
                }
            }
        }
        report.files.push(manifest.report(
            manifest.kind(),
            FileOutcome::Indexed {
                rows: data.len(),
                added: kept_here,
            },
        ));
        if is_daily {
            consumed_dailies.push(manifest.meta.url.clone());
        }
    }

    if prior_combined_lost {
        // Rewriting without the prior combined rows would lose data;
        // leave everything in place for the next run.
        warn!(supplier = %supplier, "prior combined file unreadable, skipping compaction");
        return report;
    }

    report.rows_kept = kept_rows.len();

    let path = profile
        .combined_path(&config.manifest_prefix)
        .expect("combinable profile has a spec");
    match write_combined(store, profile, spec, &path, &header_superset, &kept_rows).await {
        Ok(()) => {
            report.combined_path = Some(path.clone());
            info!(
                supplier = %supplier,
                path = %path,
                rows = report.rows_kept,
                duplicates = report.duplicates_dropped,
                "combined file replaced"
            );
            // Only now is it safe to drop the compacted dailies. A failed
            // delete leaves a duplicate source behind, which the builder's
            // combined-before-daily precedence already tolerates.
            for url in consumed_dailies {
                if let Err(err) = store.delete(&url).await {
                    warn!(url = %url, error = %err, "failed to delete compacted daily file");
                }
            }
        }
        Err(err) => {
            warn!(supplier = %supplier, error = %err, "failed to replace combined file");
        }
    }

    report
}

/// Dedup key for one row: its first extractable tracking number.
fn row_tracking_key(
    profile: &SupplierProfile,
    row: &[String],
    headers: &[String],
) -> Option<String> {
    let found = match profile.extraction {
        Extraction::FixedColumns { tracking } => fixed_column_trackings(row, tracking),
        Extraction::HeaderKeyed => {
            let column = resolve_column(headers, columns::TRACKING_SYNONYMS)?;
            fixed_column_trackings(row, &[column])
        }
        Extraction::ScanCells { max_cells } => scanned_trackings(row, max_cells),
    };
    found.into_iter().next()
}

/// Serialize and atomically replace the combined file (delete old, put
/// new), reproducing the supplier's header offset so the output parses
/// exactly like a daily file.
async fn write_combined(
    store: &dyn BucketStore,
    profile: &SupplierProfile,
    spec: CombinedSpec,
    path: &str,
    headers: &[String],
    rows: &[Vec<String>],
) -> Result<()> {
    let (bytes, content_type) = match spec.extension {
        "csv" => (
            serialize_csv(spec, headers, rows)?,
            "text/csv",
        ),
        "xlsx" => (
            serialize_workbook(spec, headers, rows)?,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        other => return Err(anyhow!("unsupported combined extension '{other}'")),
    };

    match store.delete(path).await {
        Ok(()) | Err(trackdex_bucket::BucketError::NotFound(_)) => {}
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to delete prior combined file for {}", profile.supplier)
            });
        }
    }
    store
        .put(path, Bytes::from(bytes), content_type)
        .await
        .with_context(|| format!("failed to write combined file for {}", profile.supplier))?;
    Ok(())
}

fn serialize_csv(spec: CombinedSpec, headers: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    if spec.leading_blank_row {
        writer.write_record([""]).context("failed to write blank row")?;
    }
    writer
        .write_record(headers)
        .context("failed to write combined header")?;
    for row in rows {
        let padded = pad_row(row, headers.len());
        writer
            .write_record(&padded)
            .context("failed to write combined row")?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow!("failed to flush combined csv: {err}"))
}

fn serialize_workbook(
    spec: CombinedSpec,
    headers: &[String],
    rows: &[Vec<String>],
) -> Result<Vec<u8>> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    let offset: u32 = if spec.leading_blank_row { 1 } else { 0 };

    if spec.leading_blank_row {
        // Anchor the used range at A1 so readers see the blank row instead
        // of a sheet that starts at the header.
        sheet
            .write_string(0, 0, "")
            .map_err(|err| anyhow!("failed to write banner cell: {err}"))?;
    }

    for (column, header) in headers.iter().enumerate() {
        sheet
            .write_string(offset, column as u16, header)
            .map_err(|err| anyhow!("failed to write combined header: {err}"))?;
    }
    for (index, row) in rows.iter().enumerate() {
        let padded = pad_row(row, headers.len());
        for (column, value) in padded.iter().enumerate() {
            sheet
                .write_string(offset + 1 + index as u32, column as u16, value)
                .map_err(|err| anyhow!("failed to write combined cell: {err}"))?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|err| anyhow!("failed to serialize combined workbook: {err}"))
}

fn pad_row(row: &[String], width: usize) -> Vec<String> {
    let mut padded = row.to_vec();
    if padded.len() < width {
        padded.resize(width, String::new());
    }
    padded
}
