//! The tracking index builder: one full, deterministic rebuild per run.
//!
//! Processing order is fixed: the order index is built first, then each
//! supplier's combined file is processed before its daily files, newest
//! upload first within a tier. The first occurrence of a tracking key in
//! that order wins; the scan order IS the dedup tie-break. Fetches run
//! concurrently, but the merge is applied strictly in the documented
//! order, so identical inputs always produce an identical index.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{info, warn};

use trackdex_bucket::{BucketError, BucketStore};
use trackdex_parser::RecordView;

use crate::columns::{self, resolve_column};
use crate::detect::{profile_for, Extraction, SupplierProfile, SUPPLIER_SCAN_ORDER};
use crate::fetch::{fetch_manifests, manifest_rows, FetchedManifest};
use crate::orders::{accumulate_orders, is_order_source, OrderIndex, MIN_ORDER_ID_DIGITS};
use crate::tracking::{
    digits_only, fixed_column_trackings, order_token_digits, reference_tokens, scanned_trackings,
};
use crate::types::{
    BuildSummary, FileOutcome, FileReport, IndexEntry, ManifestKind, OrderInfo, SkipReason,
    SupplierType, TrackingIndex,
};

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub manifest_prefix: String,
    pub index_path: String,
    pub fetch_timeout: Duration,
    pub fetch_concurrency: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            manifest_prefix: "manifests/".to_string(),
            index_path: "tracking_index.json".to_string(),
            fetch_timeout: Duration::from_secs(30),
            fetch_concurrency: 8,
        }
    }
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub index: TrackingIndex,
    pub summary: BuildSummary,
}

/// Build the index from every manifest under the configured prefix.
///
/// Only the initial listing can fail the run; everything after degrades
/// per-file into the summary.
pub async fn build_tracking_index(
    store: &dyn BucketStore,
    config: &BuildConfig,
) -> Result<BuildOutcome> {
    let started = Instant::now();

    let listing = store
        .list(&config.manifest_prefix)
        .await
        .context("failed to list manifests")?;
    info!(manifests = listing.len(), "starting index build");

    let manifests = fetch_manifests(
        store,
        config.fetch_timeout,
        config.fetch_concurrency,
        listing,
    )
    .await;

    let mut index = TrackingIndex::new();
    let mut files = Vec::new();
    let mut counts = std::collections::BTreeMap::new();
    let mut enriched = 0usize;

    // Pass 1: order manifests, oldest first so the newest file's rows land
    // last and win.
    let mut order_index = OrderIndex::new();
    let mut order_files: Vec<&FetchedManifest> = manifests
        .iter()
        .filter(|m| is_order_source(&m.filename))
        .collect();
    order_files.sort_by(|a, b| {
        a.meta
            .uploaded_at
            .cmp(&b.meta.uploaded_at)
            .then_with(|| a.meta.path.cmp(&b.meta.path))
    });
    for manifest in order_files {
        files.push(load_orders(manifest, &mut order_index));
    }
    info!(orders = order_index.len(), "order index ready");

    // Pass 2: tracking manifests, supplier by supplier, combined file
    // before dailies, newest upload first within each tier.
    for supplier in SUPPLIER_SCAN_ORDER {
        let profile = profile_for(supplier).expect("scan-order supplier lacks profile");
        let mut supplier_files: Vec<&FetchedManifest> = manifests
            .iter()
            .filter(|m| m.supplier == supplier)
            .collect();
        supplier_files.sort_by(|a, b| {
            b.is_combined()
                .cmp(&a.is_combined())
                .then_with(|| b.meta.uploaded_at.cmp(&a.meta.uploaded_at))
                .then_with(|| a.meta.path.cmp(&b.meta.path))
        });

        for manifest in supplier_files {
            let report = index_manifest(manifest, profile, &order_index, &mut index, &mut enriched);
            if let FileOutcome::Indexed { added, .. } = &report.outcome {
                *counts.entry(supplier.as_str().to_string()).or_insert(0) += added;
            }
            files.push(report);
        }
    }

    // Everything else is visible in the summary too.
    for manifest in &manifests {
        if is_order_source(&manifest.filename) || profile_for(manifest.supplier).is_some() {
            continue;
        }
        warn!(path = %manifest.meta.path, supplier = %manifest.supplier, "no parsing profile");
        files.push(manifest.report(
            manifest.kind(),
            FileOutcome::Skipped {
                reason: SkipReason::NoParsingProfile,
                message: format!("no parsing profile for supplier '{}'", manifest.supplier),
            },
        ));
    }

    let summary = BuildSummary {
        manifests_scanned: manifests.len(),
        trackings_indexed: index.len(),
        enriched,
        order_index_size: order_index.len(),
        counts_by_source: counts,
        duration_ms: started.elapsed().as_millis() as u64,
        files,
    };
    info!(
        trackings = summary.trackings_indexed,
        enriched = summary.enriched,
        skipped = summary.skipped().count(),
        duration_ms = summary.duration_ms,
        "index build finished"
    );

    Ok(BuildOutcome { index, summary })
}

/// Serialize and publish the index artifact, replacing the previous one
/// wholesale. The old artifact is only deleted once the new content is
/// fully serialized, so the unguarded window is the delete/put gap alone.
pub async fn publish_index(
    store: &dyn BucketStore,
    config: &BuildConfig,
    index: &TrackingIndex,
) -> Result<String> {
    let body = serde_json::to_vec(index).context("failed to serialize tracking index")?;

    match store.delete(&config.index_path).await {
        Ok(()) | Err(BucketError::NotFound(_)) => {}
        Err(err) => {
            return Err(err).context("failed to delete previous tracking index");
        }
    }

    let url = store
        .put(&config.index_path, Bytes::from(body), "application/json")
        .await
        .context("failed to publish tracking index")?;
    info!(url = %url, entries = index.len(), "tracking index published");
    Ok(url)
}

fn load_orders(manifest: &FetchedManifest, order_index: &mut OrderIndex) -> FileReport {
    let rows = match manifest_rows(manifest) {
        Ok(rows) => rows,
        Err(report) => return report,
    };

    let Some(records) = RecordView::from_rows(&rows, 0) else {
        return manifest.report(ManifestKind::Orders, FileOutcome::Empty);
    };
    if records.rows().is_empty() {
        return manifest.report(ManifestKind::Orders, FileOutcome::Empty);
    }

    let loaded = accumulate_orders(order_index, &records);
    manifest.report(
        ManifestKind::Orders,
        FileOutcome::Orders {
            orders_loaded: loaded,
        },
    )
}

fn index_manifest(
    manifest: &FetchedManifest,
    profile: &SupplierProfile,
    order_index: &OrderIndex,
    index: &mut TrackingIndex,
    enriched: &mut usize,
) -> FileReport {
    let kind = manifest.kind();
    let rows = match manifest_rows(manifest) {
        Ok(rows) => rows,
        Err(report) => return report,
    };
    // A header with nothing under it is "no data", not an error.
    if rows.len() <= profile.header_row + 1 {
        return manifest.report(kind, FileOutcome::Empty);
    }

    // Resolve columns up front for header-keyed suppliers; a manifest
    // without a tracking column cannot be usefully indexed.
    let (resolved_tracking, po_column, customer_column) = match profile.extraction {
        Extraction::HeaderKeyed => {
            let headers = &rows[profile.header_row];
            let Some(tracking) = resolve_column(headers, columns::TRACKING_SYNONYMS) else {
                return manifest.report(
                    kind,
                    FileOutcome::Skipped {
                        reason: SkipReason::NoTrackingColumn,
                        message: "no header matches the tracking synonyms".to_string(),
                    },
                );
            };
            (
                vec![tracking],
                resolve_column(headers, columns::PO_SYNONYMS),
                resolve_column(headers, columns::CUSTOMER_SYNONYMS),
            )
        }
        _ => (Vec::new(), profile.po_column, profile.customer_column),
    };

    let mut scanned = 0usize;
    let mut added = 0usize;

    for row in &rows[profile.header_row + 1..] {
        scanned += 1;
        let trackings = match profile.extraction {
            Extraction::FixedColumns { tracking } => fixed_column_trackings(row, tracking),
            Extraction::HeaderKeyed => fixed_column_trackings(row, &resolved_tracking),
            Extraction::ScanCells { max_cells } => scanned_trackings(row, max_cells),
        };
        if trackings.is_empty() {
            continue;
        }

        let po = cell_at(row, po_column);
        let customer = cell_at(row, customer_column);

        for tracking in trackings {
            if index.contains_key(&tracking) {
                continue;
            }
            let entry = make_entry(manifest, profile, row, &po, &customer, order_index, enriched);
            index.insert(tracking, entry);
            added += 1;
        }
    }

    manifest.report(
        kind,
        FileOutcome::Indexed {
            rows: scanned,
            added,
        },
    )
}

fn make_entry(
    manifest: &FetchedManifest,
    profile: &SupplierProfile,
    row: &[String],
    po: &str,
    customer: &str,
    order_index: &OrderIndex,
    enriched: &mut usize,
) -> IndexEntry {
    let mut entry = IndexEntry::new(
        &manifest.filename,
        profile.supplier,
        po.to_string(),
        customer.to_string(),
    );

    let mut hit = false;
    let po_digits = digits_only(po);
    if po_digits.len() >= MIN_ORDER_ID_DIGITS {
        if let Some(info) = order_index.get(&po_digits) {
            apply_order_info(&mut entry, info);
            hit = true;
        }
    }

    if profile.supplier == SupplierType::Inbound {
        entry.shipper_name = Some(customer.to_string());
        let reference = cell_at(row, profile.po_column);
        let tokens = reference_tokens(&reference);
        // First token that resolves to a known order wins; the rest are
        // kept for display only.
        for token in &tokens {
            let Some(digits) = order_token_digits(token) else {
                continue;
            };
            if let Some(info) = order_index.get(digits) {
                entry.po = digits.to_string();
                apply_order_info(&mut entry, info);
                hit = true;
                break;
            }
        }
        if !tokens.is_empty() {
            entry.reference_tokens = Some(tokens);
        }
    }

    if hit {
        *enriched += 1;
    }
    entry
}

fn apply_order_info(entry: &mut IndexEntry, info: &OrderInfo) {
    entry.department = info.department.clone();
    entry.due_date = info.due_date.clone();
    entry.status = info.status.clone();
    entry.pipeline_flag = info.pipeline_flag.clone();
}

fn cell_at(row: &[String], column: Option<usize>) -> String {
    column
        .and_then(|c| row.get(c))
        .map(|cell| cell.trim().to_string())
        .unwrap_or_default()
}
