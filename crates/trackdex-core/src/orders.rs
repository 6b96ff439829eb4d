//! Order-manifest ingestion: a PO-digit-keyed enrichment map.

use std::collections::HashMap;

use chrono::NaiveDate;
use trackdex_parser::RecordView;

use crate::tracking::digits_only;
use crate::types::OrderInfo;

pub type OrderIndex = HashMap<String, OrderInfo>;

/// Order ids must be at least this many digits to be worth indexing;
/// shorter digit strings are line numbers and quantities.
pub const MIN_ORDER_ID_DIGITS: usize = 6;

/// Order sources are recognized by filename, not header shape.
pub fn is_order_source(filename: &str) -> bool {
    let lowered = filename.to_lowercase();
    lowered.contains("customink") || lowered.contains("orders")
}

/// Fold one order manifest into the index. Returns how many order rows
/// were loaded.
///
/// Header roles are scanned independently here rather than through the
/// column resolver: order exports routinely carry several matching headers
/// ("Order", "Order Status") and for these files the last matching header
/// wins. Entries overwrite earlier ones, so callers feed files
/// oldest-first and the newest data lands last.
pub fn accumulate_orders(index: &mut OrderIndex, records: &RecordView) -> usize {
    let mut order_col = None;
    let mut dept_col = None;
    let mut due_col = None;
    let mut status_col = None;

    for (position, header) in records.lowered_headers().iter().enumerate() {
        if header.contains("order") || header == "id" {
            order_col = Some(position);
        }
        if header.contains("vendor") || header.contains("department") {
            dept_col = Some(position);
        }
        if header.contains("due") {
            due_col = Some(position);
        }
        if header.contains("status") {
            status_col = Some(position);
        }
    }

    let Some(order_col) = order_col else {
        return 0;
    };

    let mut loaded = 0;
    for row in records.rows() {
        let digits = digits_only(records.cell(row, order_col));
        if digits.len() < MIN_ORDER_ID_DIGITS {
            continue;
        }

        let status = status_col.and_then(|col| non_empty(records.cell(row, col)));
        let info = OrderInfo {
            department: dept_col.and_then(|col| non_empty(records.cell(row, col))),
            due_date: due_col
                .and_then(|col| non_empty(records.cell(row, col)))
                .map(|raw| humanize_due_date(&raw)),
            pipeline_flag: status
                .as_deref()
                .and_then(pipeline_flag)
                .map(str::to_string),
            status,
        };
        index.insert(digits, info);
        loaded += 1;
    }
    loaded
}

/// Derived tag from an order's free-text status.
pub fn pipeline_flag(status: &str) -> Option<&'static str> {
    let lowered = status.to_lowercase();
    if lowered.contains("on hold") {
        Some("On Hold")
    } else if lowered.contains("pipeline") || lowered.contains("pending") {
        Some("Pipelined")
    } else {
        None
    }
}

/// Short human form of a due date ("Mon, Jan 5"). Unparseable input passes
/// through unchanged.
pub fn humanize_due_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let candidate = trimmed
        .split(|c| c == 'T' || c == ' ')
        .next()
        .unwrap_or(trimmed);
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
            return format!("{}, {} {}", date.format("%a"), date.format("%b"), date.format("%-d"));
        }
    }
    trimmed.to_string()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
