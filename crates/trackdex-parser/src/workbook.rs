use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::errors::ParseError;

/// Read the first sheet of a binary workbook into row-major strings.
///
/// Only the first sheet is ever consulted; supplier exports place their data
/// there and later sheets hold pivot caches or styling noise.
pub fn read_workbook_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ParseError> {
    let cursor = Cursor::new(bytes);
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|err| ParseError::Workbook {
        message: err.to_string(),
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ParseError::NoSheets)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| ParseError::Workbook {
            message: err.to_string(),
        })?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        // Float display drops a zero fraction, so numeric PO columns
        // round-trip as plain digit strings.
        other => other.to_string().trim().to_string(),
    }
}
