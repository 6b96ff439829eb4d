use crate::errors::ParseError;
use crate::model::{ManifestFormat, RecordView};
use crate::{csv_gate, parse_csv_text, read_rows};

fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            sheet
                .write_string(r as u32, c as u16, *value)
                .expect("write cell");
        }
    }
    workbook.save_to_buffer().expect("serialize workbook")
}

#[test]
fn splits_simple_lines_on_commas() {
    let rows = parse_csv_text("a,b,c\nd,e,f\n");
    assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["d", "e", "f"]]);
}

#[test]
fn commas_inside_quotes_are_literal() {
    let rows = parse_csv_text("\"Acme, Inc\",PO100\n");
    assert_eq!(rows, vec![vec!["Acme, Inc", "PO100"]]);
}

#[test]
fn quotes_are_stripped_and_cells_trimmed() {
    let rows = parse_csv_text("\"Tracking Number\" ,  PO  \n");
    assert_eq!(rows, vec![vec!["Tracking Number", "PO"]]);
}

#[test]
fn escaped_quotes_are_not_supported() {
    // Documented limitation: "" does not collapse to a single quote, the
    // two toggles cancel and the quotes vanish.
    let rows = parse_csv_text("\"say \"\"hi\"\"\",x\n");
    assert_eq!(rows, vec![vec!["say hi", "x"]]);
}

#[test]
fn gate_accepts_quoted_and_known_tokens() {
    assert!(csv_gate("\"Tracking\",\"PO\"\n").is_ok());
    assert!(csv_gate("Tracking Number,PO\n").is_ok());
    assert!(csv_gate("Date,Carrier\n").is_ok());
    assert!(csv_gate("").is_ok());
}

#[test]
fn gate_rejects_binary_looking_content() {
    let err = csv_gate("PK\u{3}\u{4}garbage").unwrap_err();
    match err {
        ParseError::CorruptedCsv { reason } => assert!(reason.contains("PK")),
        other => panic!("expected CorruptedCsv, got {other:?}"),
    }
}

#[test]
fn read_rows_applies_gate_before_splitting() {
    let err = read_rows(b"<html>not a csv</html>", ManifestFormat::Csv).unwrap_err();
    assert!(matches!(err, ParseError::CorruptedCsv { .. }));
}

#[test]
fn reads_first_sheet_of_workbook() {
    let bytes = workbook_bytes(&[&["Tracking", "PO"], &["1Z999AA10123456784", "PO100"]]);
    let rows = read_rows(&bytes, ManifestFormat::Workbook).expect("workbook parse failed");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], "1Z999AA10123456784");
}

#[test]
fn workbook_numeric_cells_render_without_fraction() {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "PO").unwrap();
    sheet.write_number(1, 0, 1234567.0).unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let rows = read_rows(&bytes, ManifestFormat::Workbook).expect("workbook parse failed");
    assert_eq!(rows[1][0], "1234567");
}

#[test]
fn garbage_workbook_bytes_are_an_error() {
    let err = read_rows(b"definitely not a zip", ManifestFormat::Workbook).unwrap_err();
    assert!(matches!(err, ParseError::Workbook { .. }));
}

#[test]
fn format_follows_extension() {
    assert_eq!(
        ManifestFormat::for_filename("sanmar_2024-01-01.csv"),
        Some(ManifestFormat::Csv)
    );
    assert_eq!(
        ManifestFormat::for_filename("ss_combined.XLSX"),
        Some(ManifestFormat::Workbook)
    );
    assert_eq!(ManifestFormat::for_filename("notes.txt"), None);
}

#[test]
fn record_view_skips_rows_above_header() {
    let rows = vec![
        vec!["".to_string()],
        vec!["Tracking".to_string(), "PO".to_string()],
        vec!["1Z1".to_string(), "PO1".to_string()],
    ];
    let view = RecordView::from_rows(&rows, 1).expect("header row missing");
    assert_eq!(view.headers(), ["Tracking", "PO"]);
    assert_eq!(view.rows().len(), 1);
    assert_eq!(view.find_header(|h| h.contains("po")), Some(1));
}
