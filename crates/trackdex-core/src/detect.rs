//! Supplier classification and per-supplier parsing profiles.
//!
//! Classification is an ordered predicate list evaluated in three passes:
//! sender-address patterns first, then subject patterns, then filename
//! tokens. The precedence lives in data so it can be audited and tested
//! without touching any parsing code.

use once_cell::sync::Lazy;

use crate::types::SupplierType;

#[derive(Debug, Clone, Copy)]
pub struct DetectRule {
    pub supplier: SupplierType,
    pub senders: &'static [&'static str],
    pub subjects: &'static [&'static str],
    pub filename_tokens: &'static [&'static str],
}

pub static DETECT_RULES: Lazy<Vec<DetectRule>> = Lazy::new(|| {
    vec![
        DetectRule {
            supplier: SupplierType::Sanmar,
            senders: &["sanmar.com"],
            subjects: &["sanmar"],
            filename_tokens: &["sanmar"],
        },
        DetectRule {
            supplier: SupplierType::Ss,
            senders: &["ssactivewear.com"],
            subjects: &["s&s activewear", "s&s"],
            filename_tokens: &["s&s", "ss_", "ss-", "activewear"],
        },
        DetectRule {
            supplier: SupplierType::Customink,
            senders: &["customink.com"],
            subjects: &["customink"],
            filename_tokens: &["customink", "orders"],
        },
        DetectRule {
            supplier: SupplierType::Inbound,
            senders: &["quantumview", "ups.com"],
            subjects: &["quantum view", "inbound"],
            filename_tokens: &["inbound", "quantumview"],
        },
        DetectRule {
            supplier: SupplierType::Alphabroder,
            senders: &["alphabroder.com"],
            subjects: &["alphabroder"],
            filename_tokens: &["alphabroder"],
        },
    ]
});

/// Optional email metadata available when a manifest arrives by webhook.
/// Listing-driven runs only have the filename.
#[derive(Debug, Clone, Copy, Default)]
pub struct SenderContext<'a> {
    pub sender: Option<&'a str>,
    pub subject: Option<&'a str>,
}

/// Classify a manifest. Total: anything unrecognized is `Unknown`.
pub fn detect_supplier(filename: &str, ctx: SenderContext<'_>) -> SupplierType {
    if let Some(sender) = ctx.sender {
        let sender = sender.to_lowercase();
        for rule in DETECT_RULES.iter() {
            if rule.senders.iter().any(|pattern| sender.contains(pattern)) {
                return rule.supplier;
            }
        }
    }

    if let Some(subject) = ctx.subject {
        let subject = subject.to_lowercase();
        for rule in DETECT_RULES.iter() {
            if rule.subjects.iter().any(|pattern| subject.contains(pattern)) {
                return rule.supplier;
            }
        }
    }

    let filename = filename.to_lowercase();
    for rule in DETECT_RULES.iter() {
        if rule
            .filename_tokens
            .iter()
            .any(|token| filename.contains(token))
        {
            return rule.supplier;
        }
    }

    SupplierType::Unknown
}

/// How tracking numbers are pulled out of a supplier's rows.
#[derive(Debug, Clone, Copy)]
pub enum Extraction {
    /// Known column positions (0-indexed), accept on normalized length.
    FixedColumns { tracking: &'static [usize] },
    /// No reliable layout: resolve the tracking column from the header row.
    HeaderKeyed,
    /// No tracking column at all: scan the leading cells of every row.
    ScanCells { max_cells: usize },
}

/// Output shape of a supplier's combined file.
#[derive(Debug, Clone, Copy)]
pub struct CombinedSpec {
    pub extension: &'static str,
    /// Reproduce the supplier's blank row above the header so the combined
    /// file parses with the same header offset as its dailies.
    pub leading_blank_row: bool,
}

/// One supplier's parsing shape. The orchestrator dispatches purely on
/// this record.
#[derive(Debug, Clone, Copy)]
pub struct SupplierProfile {
    pub supplier: SupplierType,
    /// Row index of the header; data rows start immediately after.
    pub header_row: usize,
    pub extraction: Extraction,
    pub po_column: Option<usize>,
    pub customer_column: Option<usize>,
    pub combined: Option<CombinedSpec>,
}

impl SupplierProfile {
    pub fn combined_path(&self, prefix: &str) -> Option<String> {
        let spec = self.combined?;
        Some(format!(
            "{prefix}{}_combined.{}",
            self.supplier.as_str(),
            spec.extension
        ))
    }
}

pub static SUPPLIER_PROFILES: Lazy<Vec<SupplierProfile>> = Lazy::new(|| {
    vec![
        SupplierProfile {
            supplier: SupplierType::Sanmar,
            header_row: 0,
            // Columns L and M; dual-carrier rows carry one tracking in each.
            extraction: Extraction::FixedColumns {
                tracking: &[11, 12],
            },
            po_column: Some(4),
            customer_column: Some(2),
            combined: Some(CombinedSpec {
                extension: "csv",
                leading_blank_row: false,
            }),
        },
        SupplierProfile {
            supplier: SupplierType::Ss,
            // S&S sheets carry a non-data banner row above the header.
            header_row: 1,
            extraction: Extraction::FixedColumns { tracking: &[7] },
            po_column: Some(2),
            customer_column: Some(1),
            combined: Some(CombinedSpec {
                extension: "xlsx",
                leading_blank_row: true,
            }),
        },
        SupplierProfile {
            supplier: SupplierType::Customink,
            header_row: 0,
            extraction: Extraction::HeaderKeyed,
            po_column: None,
            customer_column: None,
            combined: None,
        },
        SupplierProfile {
            supplier: SupplierType::Inbound,
            header_row: 0,
            extraction: Extraction::ScanCells { max_cells: 10 },
            // Column B holds the pipe-delimited reference, column E the
            // shipper name.
            po_column: Some(1),
            customer_column: Some(4),
            combined: None,
        },
    ]
});

/// Supplier scan order for the index builder's tracking pass.
pub const SUPPLIER_SCAN_ORDER: [SupplierType; 4] = [
    SupplierType::Sanmar,
    SupplierType::Ss,
    SupplierType::Customink,
    SupplierType::Inbound,
];

pub fn profile_for(supplier: SupplierType) -> Option<&'static SupplierProfile> {
    SUPPLIER_PROFILES
        .iter()
        .find(|profile| profile.supplier == supplier)
}

pub fn is_combined_name(filename: &str) -> bool {
    filename.to_lowercase().contains("_combined")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_tokens_classify_daily_files() {
        let ctx = SenderContext::default();
        assert_eq!(
            detect_supplier("sanmar_2024-01-01.csv", ctx),
            SupplierType::Sanmar
        );
        assert_eq!(
            detect_supplier("ss_2024-01-01_051829.xlsx", ctx),
            SupplierType::Ss
        );
        assert_eq!(detect_supplier("S&S_jan.xlsx", ctx), SupplierType::Ss);
        assert_eq!(
            detect_supplier("activewear_dump.xlsx", ctx),
            SupplierType::Ss
        );
        assert_eq!(
            detect_supplier("customink_orders.xlsx", ctx),
            SupplierType::Customink
        );
        assert_eq!(
            detect_supplier("quantumview_2024.csv", ctx),
            SupplierType::Inbound
        );
        assert_eq!(
            detect_supplier("alphabroder_2024.csv", ctx),
            SupplierType::Alphabroder
        );
        assert_eq!(detect_supplier("mystery.csv", ctx), SupplierType::Unknown);
    }

    #[test]
    fn combined_names_keep_their_supplier() {
        let ctx = SenderContext::default();
        assert_eq!(
            detect_supplier("sanmar_combined.csv", ctx),
            SupplierType::Sanmar
        );
        assert_eq!(
            detect_supplier("ss_combined.xlsx", ctx),
            SupplierType::Ss
        );
        assert!(is_combined_name("ss_combined.xlsx"));
        assert!(!is_combined_name("ss_2024-01-01.xlsx"));
    }

    #[test]
    fn sender_outranks_subject_outranks_filename() {
        // Filename says sanmar, sender says S&S: sender wins.
        let supplier = detect_supplier(
            "sanmar_2024-01-01.csv",
            SenderContext {
                sender: Some("noreply@ssactivewear.com"),
                subject: Some("SanMar shipment"),
            },
        );
        assert_eq!(supplier, SupplierType::Ss);

        // No sender match: subject wins over filename.
        let supplier = detect_supplier(
            "sanmar_2024-01-01.csv",
            SenderContext {
                sender: Some("robot@example.com"),
                subject: Some("Quantum View daily"),
            },
        );
        assert_eq!(supplier, SupplierType::Inbound);
    }

    #[test]
    fn every_scan_order_supplier_has_a_profile() {
        for supplier in SUPPLIER_SCAN_ORDER {
            assert!(profile_for(supplier).is_some(), "{supplier} lacks profile");
        }
        assert!(profile_for(SupplierType::Alphabroder).is_none());
        assert!(profile_for(SupplierType::Unknown).is_none());
    }

    #[test]
    fn combined_path_follows_profile_format() {
        let sanmar = profile_for(SupplierType::Sanmar).unwrap();
        assert_eq!(
            sanmar.combined_path("manifests/").as_deref(),
            Some("manifests/sanmar_combined.csv")
        );
        let ss = profile_for(SupplierType::Ss).unwrap();
        assert_eq!(
            ss.combined_path("manifests/").as_deref(),
            Some("manifests/ss_combined.xlsx")
        );
        assert!(profile_for(SupplierType::Inbound)
            .unwrap()
            .combined_path("manifests/")
            .is_none());
    }
}
