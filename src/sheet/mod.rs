//! The in-memory workbook model.
//!
//! A [`Workbook`] owns an ordered list of [`Sheet`]s and the shared style
//! table. Sheets store rows sparsely, rows store cells sparsely, and both
//! maps are keyed by 0-based indices ordered ascending so the writer can
//! emit them in document order without sorting.

pub mod protection;
pub mod rules;
pub mod style;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::cellref::{CellRange, MAX_COL, MAX_ROW};
use crate::crypto::EncryptionOptions;
use crate::error::{Error, Result};

pub use protection::{ProtectionOptions, SheetProtection};
pub use rules::{AutoFilter, ConditionalFormat, DataValidation};
pub use style::{Style, StyleTable};

/// An Excel error sigil stored in a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellError {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
}

impl CellError {
    /// The sigil Excel displays, e.g. `#DIV/0!`.
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::NA => "#N/A",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "#NULL!" => CellError::Null,
            "#DIV/0!" => CellError::Div0,
            "#VALUE!" => CellError::Value,
            "#REF!" => CellError::Ref,
            "#NAME?" => CellError::Name,
            "#NUM!" => CellError::Num,
            "#N/A" => CellError::NA,
            _ => return None,
        })
    }
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types of data that can be stored in a cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Empty cell content, distinct from an absent cell
    #[default]
    Empty,
    /// Text, stored inline with surrounding whitespace preserved
    Text(String),
    /// IEEE-754 double; also carries integers, currency, and percentages
    Number(f64),
    Bool(bool),
    /// Semantic date; persisted as a serial [`Number`](CellValue::Number)
    Date(NaiveDateTime),
    /// A1-style formula without the leading `=`, plus an optional cached
    /// result
    Formula {
        expression: String,
        cached: Box<CellValue>,
    },
    Error(CellError),
}

impl CellValue {
    /// Build a formula value with no cached result.
    pub fn formula(expression: impl Into<String>) -> Self {
        CellValue::Formula {
            expression: expression.into(),
            cached: Box::new(CellValue::Empty),
        }
    }

    /// Build a formula value with a cached result.
    pub fn formula_with_cache(expression: impl Into<String>, cached: CellValue) -> Self {
        CellValue::Formula {
            expression: expression.into(),
            cached: Box::new(cached),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::Date(dt)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

/// A cell: its value and a style table slot. Slot 0 is the default style.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub style: u32,
}

/// A sparse row of cells.
#[derive(Debug, Clone, Default)]
pub struct Row {
    cells: BTreeMap<u32, Cell>,
    /// Custom height in points; `None` means automatic
    pub height: Option<f64>,
    pub hidden: bool,
}

impl Row {
    /// Cells in ascending column order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, &Cell)> {
        self.cells.iter().map(|(&col, cell)| (col, cell))
    }

    pub fn cell(&self, col: u32) -> Option<&Cell> {
        self.cells.get(&col)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn cell_entry(&mut self, col: u32) -> &mut Cell {
        self.cells.entry(col).or_default()
    }
}

fn check_cell_bounds(row: u32, col: u32) -> Result<()> {
    if row > MAX_ROW {
        return Err(Error::InvalidArgument(format!(
            "row {row} exceeds the maximum of {MAX_ROW}"
        )));
    }
    if col > MAX_COL {
        return Err(Error::InvalidArgument(format!(
            "column {col} exceeds the maximum of {MAX_COL}"
        )));
    }
    Ok(())
}

/// One worksheet of a workbook.
#[derive(Debug)]
pub struct Sheet {
    name: String,
    /// 1-based id used by the persisted parts
    sheet_id: u32,
    rows: BTreeMap<u32, Row>,
    /// Custom column widths in characters; absent means automatic
    column_widths: BTreeMap<u32, f64>,
    merged: Vec<CellRange>,
    conditional_formats: Vec<ConditionalFormat>,
    validations: Vec<DataValidation>,
    auto_filter: Option<AutoFilter>,
    protection: Option<SheetProtection>,
    hidden: bool,
}

impl Sheet {
    pub(crate) fn new(name: String, sheet_id: u32) -> Self {
        Self {
            name,
            sheet_id,
            rows: BTreeMap::new(),
            column_widths: BTreeMap::new(),
            merged: Vec::new(),
            conditional_formats: Vec::new(),
            validations: Vec::new(),
            auto_filter: None,
            protection: None,
            hidden: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The 1-based id used in the workbook part and worksheet file name.
    pub fn sheet_id(&self) -> u32 {
        self.sheet_id
    }

    /// Set a cell value, creating the row and cell as needed. The cell keeps
    /// its current style.
    pub fn set_value(&mut self, row: u32, col: u32, value: impl Into<CellValue>) -> Result<()> {
        check_cell_bounds(row, col)?;
        self.rows.entry(row).or_default().cell_entry(col).value = value.into();
        Ok(())
    }

    /// Set a cell value together with its style id.
    pub fn set_styled_value(
        &mut self,
        row: u32,
        col: u32,
        value: impl Into<CellValue>,
        style: u32,
    ) -> Result<()> {
        check_cell_bounds(row, col)?;
        let cell = self.rows.entry(row).or_default().cell_entry(col);
        cell.value = value.into();
        cell.style = style;
        Ok(())
    }

    /// Assign a style to a cell without touching its value.
    pub fn set_style(&mut self, row: u32, col: u32, style: u32) -> Result<()> {
        check_cell_bounds(row, col)?;
        self.rows.entry(row).or_default().cell_entry(col).style = style;
        Ok(())
    }

    /// Look up a cell. Absent cells return `None`; an explicitly empty cell
    /// returns `Some`.
    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.rows.get(&row).and_then(|r| r.cell(col))
    }

    /// The value of a cell, or `None` when the cell is absent.
    pub fn value(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cell(row, col).map(|c| &c.value)
    }

    /// Mutable access to a cell, created on first access.
    pub fn cell_mut(&mut self, row: u32, col: u32) -> Result<&mut Cell> {
        check_cell_bounds(row, col)?;
        Ok(self.rows.entry(row).or_default().cell_entry(col))
    }

    pub fn row(&self, row: u32) -> Option<&Row> {
        self.rows.get(&row)
    }

    /// Rows in ascending row-number order.
    pub fn rows(&self) -> impl Iterator<Item = (u32, &Row)> {
        self.rows.iter().map(|(&num, row)| (num, row))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Set a custom row height in points.
    pub fn set_row_height(&mut self, row: u32, height: f64) -> Result<()> {
        check_cell_bounds(row, 0)?;
        if !(height > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "row height must be positive: {height}"
            )));
        }
        self.rows.entry(row).or_default().height = Some(height);
        Ok(())
    }

    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) -> Result<()> {
        check_cell_bounds(row, 0)?;
        self.rows.entry(row).or_default().hidden = hidden;
        Ok(())
    }

    /// Set a custom column width in characters.
    pub fn set_column_width(&mut self, col: u32, width: f64) -> Result<()> {
        check_cell_bounds(0, col)?;
        if !(width > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "column width must be positive: {width}"
            )));
        }
        self.column_widths.insert(col, width);
        Ok(())
    }

    pub fn column_width(&self, col: u32) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    /// Custom column widths in ascending column order.
    pub fn column_widths(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.column_widths.iter().map(|(&col, &width)| (col, width))
    }

    /// Merge a rectangular region. Overlapping an existing merged region is
    /// rejected.
    pub fn merge(
        &mut self,
        start_row: u32,
        start_col: u32,
        end_row: u32,
        end_col: u32,
    ) -> Result<()> {
        let range = CellRange::new(start_row, start_col, end_row, end_col)?;
        if let Some(existing) = self.merged.iter().find(|m| m.intersects(&range)) {
            return Err(Error::InvalidArgument(format!(
                "merged region {range} overlaps {existing}"
            )));
        }
        self.merged.push(range);
        Ok(())
    }

    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged
    }

    pub fn add_conditional_format(&mut self, format: ConditionalFormat) {
        self.conditional_formats.push(format);
    }

    pub fn conditional_formats(&self) -> &[ConditionalFormat] {
        &self.conditional_formats
    }

    pub fn add_data_validation(&mut self, validation: DataValidation) {
        self.validations.push(validation);
    }

    pub fn data_validations(&self) -> &[DataValidation] {
        &self.validations
    }

    pub fn set_auto_filter(&mut self, filter: AutoFilter) {
        self.auto_filter = Some(filter);
    }

    pub fn auto_filter(&self) -> Option<&AutoFilter> {
        self.auto_filter.as_ref()
    }

    /// Protect the sheet without a password.
    pub fn protect(&mut self, options: ProtectionOptions) {
        self.protection = Some(SheetProtection::new(options));
    }

    /// Protect the sheet with a password. The password is hashed immediately
    /// and not retained.
    pub fn protect_with_password(
        &mut self,
        options: ProtectionOptions,
        password: &str,
    ) -> Result<()> {
        self.protection = Some(SheetProtection::with_password(options, password)?);
        Ok(())
    }

    pub fn protection(&self) -> Option<&SheetProtection> {
        self.protection.as_ref()
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    // restoration hooks for the worksheet parser

    pub(crate) fn set_row_record(&mut self, row_num: u32, row: Row) {
        self.rows.insert(row_num, row);
    }

    pub(crate) fn insert_merged_unchecked(&mut self, range: CellRange) {
        self.merged.push(range);
    }

    pub(crate) fn set_protection_record(&mut self, protection: SheetProtection) {
        self.protection = Some(protection);
    }
}

/// An in-memory workbook: the root of ownership for sheets and styles.
#[derive(Debug)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    styles: StyleTable,
}

impl Workbook {
    /// Create an empty workbook with the default style table.
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            styles: StyleTable::new(),
        }
    }

    /// Append a sheet. Names are case-sensitive, non-empty, and unique.
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut Sheet> {
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "sheet name must not be empty".to_string(),
            ));
        }
        if self.sheets.iter().any(|s| s.name() == name) {
            return Err(Error::InvalidArgument(format!(
                "duplicate sheet name: {name}"
            )));
        }

        let sheet_id = self.sheets.len() as u32 + 1;
        self.sheets.push(Sheet::new(name.to_string(), sheet_id));
        Ok(self.sheets.last_mut().expect("sheet just pushed"))
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name() == name)
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Register a style, returning its id. Structurally equal styles are
    /// deduplicated.
    pub fn add_style(&mut self, style: &Style) -> u32 {
        self.styles.add(style)
    }

    pub fn style(&self, id: u32) -> Option<&Style> {
        self.styles.get(id)
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub(crate) fn set_styles(&mut self, styles: StyleTable) {
        self.styles = styles;
    }

    /// Open a plain `.xlsx` file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::xlsx::package::load_workbook(path.as_ref(), None)
    }

    /// Open a `.xlsx` file, decrypting it with `password` when it is an
    /// encrypted compound file.
    pub fn open_with_password<P: AsRef<Path>>(path: P, password: &str) -> Result<Self> {
        crate::xlsx::package::load_workbook(path.as_ref(), Some(password))
    }

    /// Save as a plain `.xlsx` file. The destination is replaced atomically
    /// and left untouched on error.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::xlsx::package::save_workbook(self, path.as_ref(), None)
    }

    /// Save as an Agile-encrypted `.xlsx` compound file.
    pub fn save_with_encryption<P: AsRef<Path>>(
        &self,
        path: P,
        options: &EncryptionOptions,
    ) -> Result<()> {
        crate::xlsx::package::save_workbook(self, path.as_ref(), Some(options))
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}
