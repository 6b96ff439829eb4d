//! Shared fetch/decode plumbing for the index builder and combiner.
//!
//! Fetches run concurrently over a buffered stream that preserves listing
//! order; every failure mode degrades into a per-file skip report so one
//! bad manifest never aborts a run.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tracing::warn;

use trackdex_bucket::{BucketStore, ObjectMeta};
use trackdex_parser::{ManifestFormat, ParseError};

use crate::detect::{detect_supplier, is_combined_name, SenderContext};
use crate::orders::is_order_source;
use crate::types::{FileOutcome, FileReport, ManifestKind, SkipReason, SupplierType};

/// A listed manifest plus its fetch result. `bytes` is `None` when the
/// fetch failed or timed out.
pub(crate) struct FetchedManifest {
    pub meta: ObjectMeta,
    pub filename: String,
    pub supplier: SupplierType,
    pub bytes: Option<Bytes>,
    pub fetch_skip: Option<(SkipReason, String)>,
    pub content_hash: Option<String>,
}

impl FetchedManifest {
    pub fn report(&self, kind: ManifestKind, outcome: FileOutcome) -> FileReport {
        FileReport {
            path: self.meta.path.clone(),
            supplier: self.supplier,
            kind,
            size: self.meta.size,
            content_hash: self.content_hash.clone(),
            outcome,
        }
    }

    pub fn kind(&self) -> ManifestKind {
        if is_combined_name(&self.filename) {
            ManifestKind::Combined
        } else if is_order_source(&self.filename) {
            ManifestKind::Orders
        } else {
            ManifestKind::Daily
        }
    }

    pub fn is_combined(&self) -> bool {
        is_combined_name(&self.filename)
    }
}

pub(crate) async fn fetch_manifests(
    store: &dyn BucketStore,
    timeout: Duration,
    concurrency: usize,
    listing: Vec<ObjectMeta>,
) -> Vec<FetchedManifest> {
    futures::stream::iter(listing.into_iter().map(|meta| async move {
        let fetched = tokio::time::timeout(timeout, store.get(&meta.url)).await;
        let filename = filename_of(&meta.path);
        let supplier = detect_supplier(&filename, SenderContext::default());
        match fetched {
            Ok(Ok(bytes)) => {
                let content_hash = blake3::hash(&bytes).to_hex().to_string();
                FetchedManifest {
                    meta,
                    filename,
                    supplier,
                    bytes: Some(bytes),
                    fetch_skip: None,
                    content_hash: Some(content_hash),
                }
            }
            Ok(Err(err)) => {
                warn!(path = %meta.path, error = %err, "manifest fetch failed");
                FetchedManifest {
                    meta,
                    filename,
                    supplier,
                    bytes: None,
                    fetch_skip: Some((SkipReason::FetchFailed, err.to_string())),
                    content_hash: None,
                }
            }
            Err(_) => {
                warn!(
                    path = %meta.path,
                    timeout_ms = timeout.as_millis() as u64,
                    "manifest fetch timed out"
                );
                FetchedManifest {
                    meta,
                    filename,
                    supplier,
                    bytes: None,
                    fetch_skip: Some((
                        SkipReason::FetchTimedOut,
                        format!("fetch exceeded {}ms", timeout.as_millis()),
                    )),
                    content_hash: None,
                }
            }
        }
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await
}

/// Decode a fetched manifest into rows, converting every failure mode into
/// a per-file skip report.
pub(crate) fn manifest_rows(manifest: &FetchedManifest) -> Result<Vec<Vec<String>>, FileReport> {
    let kind = manifest.kind();
    if let Some((reason, message)) = &manifest.fetch_skip {
        return Err(manifest.report(
            kind,
            FileOutcome::Skipped {
                reason: *reason,
                message: message.clone(),
            },
        ));
    }
    let bytes = manifest.bytes.as_ref().expect("fetched manifest has bytes");

    let Some(format) = ManifestFormat::for_filename(&manifest.filename) else {
        return Err(manifest.report(
            kind,
            FileOutcome::Skipped {
                reason: SkipReason::UnsupportedExtension,
                message: format!("unsupported extension on '{}'", manifest.filename),
            },
        ));
    };

    match trackdex_parser::read_rows(bytes, format) {
        Ok(rows) => Ok(rows),
        Err(err @ ParseError::CorruptedCsv { .. }) => {
            warn!(path = %manifest.meta.path, error = %err, "csv failed corruption gate");
            Err(manifest.report(
                kind,
                FileOutcome::Skipped {
                    reason: SkipReason::CorruptedCsv,
                    message: err.to_string(),
                },
            ))
        }
        Err(err) => {
            warn!(path = %manifest.meta.path, error = %err, "workbook unreadable");
            Err(manifest.report(
                kind,
                FileOutcome::Skipped {
                    reason: SkipReason::WorkbookUnreadable,
                    message: err.to_string(),
                },
            ))
        }
    }
}

pub(crate) fn filename_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
