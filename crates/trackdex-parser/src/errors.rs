use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("csv content failed the corruption gate: {reason}")]
    CorruptedCsv { reason: String },

    #[error("workbook could not be opened: {message}")]
    Workbook { message: String },

    #[error("workbook contains no sheets")]
    NoSheets,
}
