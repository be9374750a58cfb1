//! Per-sheet formatting and validation rules: conditional formats, data
//! validations, and auto-filters.

use crate::cellref::CellRange;

/// The OOXML `cfRule` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalFormatType {
    CellIs,
    Expression,
    ColorScale,
    DataBar,
    IconSet,
    Top10,
    AboveAverage,
    DuplicateValues,
    UniqueValues,
    ContainsText,
    NotContainsText,
    BeginsWith,
    EndsWith,
    ContainsBlanks,
    ContainsErrors,
}

impl ConditionalFormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionalFormatType::CellIs => "cellIs",
            ConditionalFormatType::Expression => "expression",
            ConditionalFormatType::ColorScale => "colorScale",
            ConditionalFormatType::DataBar => "dataBar",
            ConditionalFormatType::IconSet => "iconSet",
            ConditionalFormatType::Top10 => "top10",
            ConditionalFormatType::AboveAverage => "aboveAverage",
            ConditionalFormatType::DuplicateValues => "duplicateValues",
            ConditionalFormatType::UniqueValues => "uniqueValues",
            ConditionalFormatType::ContainsText => "containsText",
            ConditionalFormatType::NotContainsText => "notContainsText",
            ConditionalFormatType::BeginsWith => "beginsWith",
            ConditionalFormatType::EndsWith => "endsWith",
            ConditionalFormatType::ContainsBlanks => "containsBlanks",
            ConditionalFormatType::ContainsErrors => "containsErrors",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "cellIs" => ConditionalFormatType::CellIs,
            "expression" => ConditionalFormatType::Expression,
            "colorScale" => ConditionalFormatType::ColorScale,
            "dataBar" => ConditionalFormatType::DataBar,
            "iconSet" => ConditionalFormatType::IconSet,
            "top10" => ConditionalFormatType::Top10,
            "aboveAverage" => ConditionalFormatType::AboveAverage,
            "duplicateValues" => ConditionalFormatType::DuplicateValues,
            "uniqueValues" => ConditionalFormatType::UniqueValues,
            "containsText" => ConditionalFormatType::ContainsText,
            "notContainsText" => ConditionalFormatType::NotContainsText,
            "beginsWith" => ConditionalFormatType::BeginsWith,
            "endsWith" => ConditionalFormatType::EndsWith,
            "containsBlanks" => ConditionalFormatType::ContainsBlanks,
            "containsErrors" => ConditionalFormatType::ContainsErrors,
            _ => return None,
        })
    }
}

/// The OOXML comparison operator used by `cfRule` and `dataValidation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    None,
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    GreaterThanOrEqual,
    GreaterThan,
    Between,
    NotBetween,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::None => "",
            ComparisonOperator::LessThan => "lessThan",
            ComparisonOperator::LessThanOrEqual => "lessThanOrEqual",
            ComparisonOperator::Equal => "equal",
            ComparisonOperator::NotEqual => "notEqual",
            ComparisonOperator::GreaterThanOrEqual => "greaterThanOrEqual",
            ComparisonOperator::GreaterThan => "greaterThan",
            ComparisonOperator::Between => "between",
            ComparisonOperator::NotBetween => "notBetween",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "lessThan" => ComparisonOperator::LessThan,
            "lessThanOrEqual" => ComparisonOperator::LessThanOrEqual,
            "equal" => ComparisonOperator::Equal,
            "notEqual" => ComparisonOperator::NotEqual,
            "greaterThanOrEqual" => ComparisonOperator::GreaterThanOrEqual,
            "greaterThan" => ComparisonOperator::GreaterThan,
            "between" => ComparisonOperator::Between,
            "notBetween" => ComparisonOperator::NotBetween,
            _ => ComparisonOperator::None,
        }
    }
}

/// One conditional-formatting rule applied to a range.
///
/// `style_id` references the workbook style table; the styles part derives a
/// differential format for every non-default style, so the persisted `dxfId`
/// is `style_id - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalFormat {
    pub range: CellRange,
    pub rule_type: ConditionalFormatType,
    pub operator: ComparisonOperator,
    pub formula1: Option<String>,
    pub formula2: Option<String>,
    pub style_id: u32,
}

impl ConditionalFormat {
    /// A `cellIs` rule comparing cell values against one formula operand.
    pub fn cell_is(
        range: CellRange,
        operator: ComparisonOperator,
        formula: impl Into<String>,
        style_id: u32,
    ) -> Self {
        Self {
            range,
            rule_type: ConditionalFormatType::CellIs,
            operator,
            formula1: Some(formula.into()),
            formula2: None,
            style_id,
        }
    }

    /// An `expression` rule driven by an arbitrary formula.
    pub fn expression(range: CellRange, formula: impl Into<String>, style_id: u32) -> Self {
        Self {
            range,
            rule_type: ConditionalFormatType::Expression,
            operator: ComparisonOperator::None,
            formula1: Some(formula.into()),
            formula2: None,
            style_id,
        }
    }
}

/// The `dataValidation` constraint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataValidationType {
    Any,
    Whole,
    Decimal,
    List,
    Date,
    Time,
    TextLength,
    Custom,
}

impl DataValidationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataValidationType::Any => "none",
            DataValidationType::Whole => "whole",
            DataValidationType::Decimal => "decimal",
            DataValidationType::List => "list",
            DataValidationType::Date => "date",
            DataValidationType::Time => "time",
            DataValidationType::TextLength => "textLength",
            DataValidationType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "whole" => DataValidationType::Whole,
            "decimal" => DataValidationType::Decimal,
            "list" => DataValidationType::List,
            "date" => DataValidationType::Date,
            "time" => DataValidationType::Time,
            "textLength" => DataValidationType::TextLength,
            "custom" => DataValidationType::Custom,
            _ => DataValidationType::Any,
        }
    }
}

/// One data-validation rule applied to a range.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValidation {
    pub range: CellRange,
    pub validation_type: DataValidationType,
    pub operator: Option<ComparisonOperator>,
    pub formula1: Option<String>,
    pub formula2: Option<String>,
    pub error_title: Option<String>,
    pub error_message: Option<String>,
    /// Whether list validations offer the in-cell dropdown
    pub show_dropdown: bool,
}

impl DataValidation {
    pub fn new(range: CellRange, validation_type: DataValidationType) -> Self {
        Self {
            range,
            validation_type,
            operator: None,
            formula1: None,
            formula2: None,
            error_title: None,
            error_message: None,
            show_dropdown: true,
        }
    }
}

/// Comparison operator for custom auto-filter clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "equal",
            FilterOperator::NotEqual => "notEqual",
            FilterOperator::GreaterThan => "greaterThan",
            FilterOperator::GreaterThanOrEqual => "greaterThanOrEqual",
            FilterOperator::LessThan => "lessThan",
            FilterOperator::LessThanOrEqual => "lessThanOrEqual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "equal" => FilterOperator::Equal,
            "notEqual" => FilterOperator::NotEqual,
            "greaterThan" => FilterOperator::GreaterThan,
            "greaterThanOrEqual" => FilterOperator::GreaterThanOrEqual,
            "lessThan" => FilterOperator::LessThan,
            "lessThanOrEqual" => FilterOperator::LessThanOrEqual,
            _ => return None,
        })
    }
}

/// A two-clause custom filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomFilter {
    pub op1: FilterOperator,
    pub val1: String,
    pub op2: Option<FilterOperator>,
    pub val2: Option<String>,
    /// `true` combines the clauses with AND, `false` with OR
    pub and: bool,
}

/// Filter state of one column inside an auto-filter range.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterColumn {
    /// 0-based column offset within the auto-filter range
    pub index: u32,
    /// Literal values kept by a value filter
    pub values: Vec<String>,
    pub custom: Option<CustomFilter>,
}

/// An auto-filter over a range, with optional per-column criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoFilter {
    pub range: CellRange,
    pub columns: Vec<FilterColumn>,
}

impl AutoFilter {
    pub fn new(range: CellRange) -> Self {
        Self {
            range,
            columns: Vec::new(),
        }
    }
}
