/// Physical layout of a manifest file, declared by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Csv,
    Workbook,
}

impl ManifestFormat {
    /// Map a filename to its format, or `None` for extensions the reader
    /// does not understand.
    pub fn for_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Some(ManifestFormat::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Some(ManifestFormat::Workbook)
        } else {
            None
        }
    }
}

/// Header-keyed view over row-major cell data.
///
/// Rows above `header_row` are discarded; lookups are case-insensitive on
/// the lowered header text.
#[derive(Debug, Clone)]
pub struct RecordView {
    headers: Vec<String>,
    lowered: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecordView {
    pub fn from_rows(rows: &[Vec<String>], header_row: usize) -> Option<Self> {
        let headers = rows.get(header_row)?.clone();
        let lowered = headers.iter().map(|h| h.to_lowercase()).collect();
        let data = rows.get(header_row + 1..).unwrap_or_default().to_vec();
        Some(Self {
            headers,
            lowered,
            rows: data,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Index of the first header whose lowered text satisfies `pred`.
    pub fn find_header(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.lowered.iter().position(|h| pred(h))
    }

    pub fn lowered_headers(&self) -> &[String] {
        &self.lowered
    }

    pub fn cell<'a>(&'a self, row: &'a [String], column: usize) -> &'a str {
        row.get(column).map(String::as_str).unwrap_or_default()
    }
}
