//! The SpreadsheetML package codec: part names, content types, and the
//! reader/writer pairs for each XML part.

pub mod package;
pub mod shared_strings;
pub mod styles;
pub mod worksheet;

/// Main SpreadsheetML namespace.
pub const NS_SPREADSHEETML: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Relationship namespace used by `r:id` attributes.
pub const NS_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Namespace of the `_rels` part contents.
pub const NS_PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship type of the main workbook part.
pub const REL_TYPE_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// Relationship type of a worksheet part.
pub const REL_TYPE_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

/// Relationship type of the styles part.
pub const REL_TYPE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

/// Content type of the workbook part.
pub const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

/// Content type of a worksheet part.
pub const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// Content type of the styles part.
pub const CT_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

/// Content type of the relationship parts.
pub const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";

/// Content type of plain XML parts.
pub const CT_XML: &str = "application/xml";

/// ZIP entry name of the content-types manifest.
pub const PART_CONTENT_TYPES: &str = "[Content_Types].xml";

/// ZIP entry name of the package relationships.
pub const PART_ROOT_RELS: &str = "_rels/.rels";

/// ZIP entry name of the workbook relationships.
pub const PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";

/// ZIP entry name of the workbook part.
pub const PART_WORKBOOK: &str = "xl/workbook.xml";

/// ZIP entry name of the styles part.
pub const PART_STYLES: &str = "xl/styles.xml";

/// ZIP entry name of the shared-strings part.
pub const PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";

/// ZIP entry name of worksheet `n` (1-based).
pub fn worksheet_part_name(sheet_id: u32) -> String {
    format!("xl/worksheets/sheet{sheet_id}.xml")
}
