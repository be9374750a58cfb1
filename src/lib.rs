//! quince reads and writes Excel workbooks in the OOXML SpreadsheetML
//! (`.xlsx`) format, with optional Agile password encryption.
//!
//! Build a [`Workbook`] in memory, fill its sheets with tagged
//! [`CellValue`]s, register shared [`Style`]s, and save; or open an existing
//! file, encrypted or not, back into the same model. Formulas are carried as
//! text with an optional cached result and never evaluated.
//!
//! # Example
//!
//! ```rust,no_run
//! use quince::{EncryptionOptions, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.add_sheet("Data")?;
//! sheet.set_value(0, 0, "Name")?;
//! sheet.set_value(1, 0, "Alice")?;
//! sheet.set_value(1, 1, 30.0)?;
//!
//! workbook.save("plain.xlsx")?;
//! workbook.save_with_encryption("secret.xlsx", &EncryptionOptions::aes_256("hunter2"))?;
//!
//! let reopened = Workbook::open_with_password("secret.xlsx", "hunter2")?;
//! assert_eq!(reopened.sheet(0).unwrap().value(1, 1).unwrap().as_number(), Some(30.0));
//! # Ok::<(), quince::Error>(())
//! ```

pub mod cellref;
pub mod cfb;
pub mod crypto;
pub mod datetime;
pub mod error;
pub mod sheet;
pub mod xlsx;
pub mod xml;

pub use cellref::{CellRange, MAX_COL, MAX_ROW, col_to_letters, letters_to_col, parse_ref, to_ref};
pub use crypto::{EncryptionAlgorithm, EncryptionOptions};
pub use datetime::{from_excel_date, is_valid_excel_date, to_excel_date};
pub use error::{Error, Result};
pub use sheet::protection::{PasswordHash, ProtectionOptions, SheetProtection};
pub use sheet::rules::{
    AutoFilter, ComparisonOperator, ConditionalFormat, ConditionalFormatType, CustomFilter,
    DataValidation, DataValidationType, FilterColumn, FilterOperator,
};
pub use sheet::style::{
    Alignment, Border, BorderSide, BorderStyle, Font, HorizontalAlignment, Style, StyleTable,
    VerticalAlignment,
};
pub use sheet::{Cell, CellError, CellValue, Row, Sheet, Workbook};
