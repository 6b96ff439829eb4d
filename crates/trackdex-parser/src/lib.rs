pub mod errors;
pub mod model;
mod text;
mod workbook;

pub use errors::ParseError;
pub use model::{ManifestFormat, RecordView};
pub use text::{csv_gate, parse_csv_text};
pub use workbook::read_workbook_rows;

/// Parse raw manifest bytes into row-major cell data.
///
/// CSV bytes are decoded lossily and must pass the corruption gate before
/// the splitter runs. Workbook bytes are read from the first sheet only.
pub fn read_rows(bytes: &[u8], format: ManifestFormat) -> Result<Vec<Vec<String>>, ParseError> {
    match format {
        ManifestFormat::Csv => {
            let content = String::from_utf8_lossy(bytes);
            csv_gate(&content)?;
            Ok(parse_csv_text(&content))
        }
        ManifestFormat::Workbook => read_workbook_rows(bytes),
    }
}

#[cfg(test)]
mod tests;
