//! Writer and parser for a single `xl/worksheets/sheetN.xml` part.
//!
//! Section order inside `<worksheet>` is fixed and Excel rejects files that
//! deviate: `cols`, `sheetData`, `sheetProtection`, `autoFilter`,
//! `mergeCells`, `conditionalFormatting` groups, `dataValidations`. Rows are
//! emitted in ascending row order and cells in ascending column order.

use crate::cellref::{self, CellRange};
use crate::datetime;
use crate::error::{Error, Result};
use crate::sheet::protection::{PasswordHash, ProtectionOptions, SheetProtection};
use crate::sheet::rules::{
    AutoFilter, ComparisonOperator, ConditionalFormat, ConditionalFormatType, CustomFilter,
    DataValidation, DataValidationType, FilterColumn, FilterOperator,
};
use crate::sheet::{Cell, CellError, CellValue, Row, Sheet};
use crate::xml::{StartTag, XmlEvent, XmlReader, XmlWriter};

use super::styles::format_number;

/// Serialize one worksheet part.
pub fn write_worksheet(sheet: &Sheet) -> Result<String> {
    let mut w = XmlWriter::new();
    w.start_document();
    w.start_element("worksheet");
    w.attribute("xmlns", super::NS_SPREADSHEETML);
    w.attribute("xmlns:r", super::NS_RELATIONSHIPS);

    write_dimension(&mut w, sheet)?;
    write_cols(&mut w, sheet)?;
    write_sheet_data(&mut w, sheet)?;
    write_protection(&mut w, sheet)?;
    write_auto_filter(&mut w, sheet)?;
    write_merge_cells(&mut w, sheet)?;
    write_conditional_formatting(&mut w, sheet)?;
    write_data_validations(&mut w, sheet)?;

    w.end_element()?;
    w.end_document()
}

fn write_dimension(w: &mut XmlWriter, sheet: &Sheet) -> Result<()> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (row_num, row) in sheet.rows() {
        for (col, _) in row.cells() {
            let b = bounds.get_or_insert((row_num, col, row_num, col));
            b.0 = b.0.min(row_num);
            b.1 = b.1.min(col);
            b.2 = b.2.max(row_num);
            b.3 = b.3.max(col);
        }
    }

    if let Some((r1, c1, r2, c2)) = bounds {
        let range = CellRange::new(r1, c1, r2, c2)?;
        w.start_element("dimension");
        w.attribute("ref", &range.to_a1());
        w.end_element()?;
    }
    Ok(())
}

fn write_cols(w: &mut XmlWriter, sheet: &Sheet) -> Result<()> {
    if sheet.column_widths().next().is_none() {
        return Ok(());
    }

    w.start_element("cols");
    for (col, width) in sheet.column_widths() {
        w.start_element("col");
        w.attribute("min", &(col + 1).to_string());
        w.attribute("max", &(col + 1).to_string());
        w.attribute("width", &format_number(width));
        w.attribute("customWidth", "1");
        w.end_element()?;
    }
    w.end_element()
}

fn write_sheet_data(w: &mut XmlWriter, sheet: &Sheet) -> Result<()> {
    w.start_element("sheetData");
    for (row_num, row) in sheet.rows() {
        if row.is_empty() && row.height.is_none() && !row.hidden {
            continue;
        }

        w.start_element("row");
        w.attribute("r", &(row_num + 1).to_string());
        if let Some(height) = row.height {
            w.attribute("ht", &format_number(height));
            w.attribute("customHeight", "1");
        }
        if row.hidden {
            w.attribute("hidden", "1");
        }

        for (col, cell) in row.cells() {
            write_cell(w, row_num, col, cell)?;
        }
        w.end_element()?;
    }
    w.end_element()
}

fn has_edge_whitespace(text: &str) -> bool {
    let first = text.chars().next();
    let last = text.chars().next_back();
    first.map(char::is_whitespace).unwrap_or(false) || last.map(char::is_whitespace).unwrap_or(false)
}

fn write_inline_text(w: &mut XmlWriter, text: &str) -> Result<()> {
    w.start_element("is");
    w.start_element("t");
    if has_edge_whitespace(text) {
        w.attribute("xml:space", "preserve");
    }
    w.text(text);
    w.end_element()?;
    w.end_element()
}

fn write_cell(w: &mut XmlWriter, row: u32, col: u32, cell: &Cell) -> Result<()> {
    // empty cells are not persisted
    if cell.value.is_empty() {
        return Ok(());
    }

    let reference = cellref::to_ref(row, col);
    w.start_element("c");
    w.attribute("r", &reference);
    if cell.style > 0 {
        w.attribute("s", &cell.style.to_string());
    }

    match &cell.value {
        CellValue::Empty => unreachable!("empty cells are filtered above"),
        CellValue::Text(text) => {
            w.attribute("t", "inlineStr");
            write_inline_text(w, text)?;
        },
        CellValue::Number(value) => {
            w.start_element("v");
            w.text(&format_number(*value));
            w.end_element()?;
        },
        CellValue::Bool(value) => {
            w.attribute("t", "b");
            w.start_element("v");
            w.text(if *value { "1" } else { "0" });
            w.end_element()?;
        },
        CellValue::Date(datetime) => {
            let serial = datetime::to_excel_date(datetime)?;
            w.start_element("v");
            w.text(&format_number(serial));
            w.end_element()?;
        },
        CellValue::Formula { expression, cached } => {
            match cached.as_ref() {
                CellValue::Text(_) => w.attribute("t", "str"),
                CellValue::Bool(_) => w.attribute("t", "b"),
                CellValue::Error(_) => w.attribute("t", "e"),
                _ => {},
            }
            w.start_element("f");
            w.text(expression);
            w.end_element()?;
            match cached.as_ref() {
                CellValue::Empty => {},
                CellValue::Text(text) => {
                    w.start_element("v");
                    w.text(text);
                    w.end_element()?;
                },
                CellValue::Number(value) => {
                    w.start_element("v");
                    w.text(&format_number(*value));
                    w.end_element()?;
                },
                CellValue::Bool(value) => {
                    w.start_element("v");
                    w.text(if *value { "1" } else { "0" });
                    w.end_element()?;
                },
                CellValue::Date(datetime) => {
                    let serial = datetime::to_excel_date(datetime)?;
                    w.start_element("v");
                    w.text(&format_number(serial));
                    w.end_element()?;
                },
                CellValue::Error(code) => {
                    w.start_element("v");
                    w.text(code.as_str());
                    w.end_element()?;
                },
                CellValue::Formula { .. } => {
                    return Err(Error::InvalidArgument(format!(
                        "cached value of {reference} must not be a formula"
                    )));
                },
            }
        },
        CellValue::Error(code) => {
            w.attribute("t", "e");
            w.start_element("v");
            w.text(code.as_str());
            w.end_element()?;
        },
    }

    w.end_element()
}

fn write_protection(w: &mut XmlWriter, sheet: &Sheet) -> Result<()> {
    let Some(protection) = sheet.protection() else {
        return Ok(());
    };

    w.start_element("sheetProtection");
    w.attribute("sheet", "1");

    if let Some(password) = &protection.password {
        w.attribute("algorithmName", &password.algorithm);
        w.attribute("hashValue", &password.hash);
        w.attribute("saltValue", &password.salt);
        w.attribute("spinCount", &password.spin_count.to_string());
    }

    // legacy object/scenario locks are always on
    w.attribute("objects", "1");
    w.attribute("scenarios", "1");

    // permissions are inverse: the attribute names the forbidden action
    let options = &protection.options;
    let flags = [
        ("selectLockedCells", options.select_locked_cells),
        ("selectUnlockedCells", options.select_unlocked_cells),
        ("formatCells", options.format_cells),
        ("formatColumns", options.format_columns),
        ("formatRows", options.format_rows),
        ("insertRows", options.insert_rows),
        ("insertColumns", options.insert_columns),
        ("deleteRows", options.delete_rows),
        ("deleteColumns", options.delete_columns),
        ("sort", options.sort),
        ("autoFilter", options.auto_filter),
        ("pivotTables", options.pivot_tables),
    ];
    for (name, allowed) in flags {
        if !allowed {
            w.attribute(name, "1");
        }
    }

    w.end_element()
}

fn write_auto_filter(w: &mut XmlWriter, sheet: &Sheet) -> Result<()> {
    let Some(filter) = sheet.auto_filter() else {
        return Ok(());
    };

    w.start_element("autoFilter");
    w.attribute("ref", &filter.range.to_a1());
    for column in &filter.columns {
        w.start_element("filterColumn");
        w.attribute("colId", &column.index.to_string());

        if let Some(custom) = &column.custom {
            w.start_element("customFilters");
            if custom.and {
                w.attribute("and", "1");
            }
            w.start_element("customFilter");
            w.attribute("operator", custom.op1.as_str());
            w.attribute("val", &custom.val1);
            w.end_element()?;
            if let (Some(op2), Some(val2)) = (custom.op2, &custom.val2) {
                w.start_element("customFilter");
                w.attribute("operator", op2.as_str());
                w.attribute("val", val2);
                w.end_element()?;
            }
            w.end_element()?;
        } else if !column.values.is_empty() {
            w.start_element("filters");
            for value in &column.values {
                w.start_element("filter");
                w.attribute("val", value);
                w.end_element()?;
            }
            w.end_element()?;
        }

        w.end_element()?;
    }
    w.end_element()
}

fn write_merge_cells(w: &mut XmlWriter, sheet: &Sheet) -> Result<()> {
    let merged = sheet.merged_regions();
    if merged.is_empty() {
        return Ok(());
    }

    w.start_element("mergeCells");
    w.attribute("count", &merged.len().to_string());
    for range in merged {
        w.start_element("mergeCell");
        w.attribute("ref", &range.to_a1());
        w.end_element()?;
    }
    w.end_element()
}

fn write_conditional_formatting(w: &mut XmlWriter, sheet: &Sheet) -> Result<()> {
    for (priority, rule) in sheet.conditional_formats().iter().enumerate() {
        w.start_element("conditionalFormatting");
        w.attribute("sqref", &rule.range.to_a1());
        w.start_element("cfRule");
        w.attribute("type", rule.rule_type.as_str());
        if rule.style_id > 0 {
            // differential formats are the style table shifted by one
            w.attribute("dxfId", &(rule.style_id - 1).to_string());
        }
        w.attribute("priority", &(priority + 1).to_string());
        if rule.operator != ComparisonOperator::None {
            w.attribute("operator", rule.operator.as_str());
        }
        for formula in [&rule.formula1, &rule.formula2].into_iter().flatten() {
            w.start_element("formula");
            w.text(formula);
            w.end_element()?;
        }
        w.end_element()?;
        w.end_element()?;
    }
    Ok(())
}

fn write_data_validations(w: &mut XmlWriter, sheet: &Sheet) -> Result<()> {
    let validations = sheet.data_validations();
    if validations.is_empty() {
        return Ok(());
    }

    w.start_element("dataValidations");
    w.attribute("count", &validations.len().to_string());
    for validation in validations {
        w.start_element("dataValidation");
        w.attribute("type", validation.validation_type.as_str());
        if let Some(operator) = validation.operator {
            if operator != ComparisonOperator::None {
                w.attribute("operator", operator.as_str());
            }
        }
        w.attribute("sqref", &validation.range.to_a1());
        // the attribute hides the dropdown, so it is written when the rule
        // turns the dropdown off
        if !validation.show_dropdown {
            w.attribute("showDropDown", "1");
        }
        if validation.error_title.is_some() || validation.error_message.is_some() {
            w.attribute("showErrorMessage", "1");
        }
        if let Some(title) = &validation.error_title {
            w.attribute("errorTitle", title);
        }
        if let Some(message) = &validation.error_message {
            w.attribute("error", message);
        }
        if let Some(formula) = &validation.formula1 {
            w.start_element("formula1");
            w.text(formula);
            w.end_element()?;
        }
        if let Some(formula) = &validation.formula2 {
            w.start_element("formula2");
            w.text(formula);
            w.end_element()?;
        }
        w.end_element()?;
    }
    w.end_element()
}

/// Parse a worksheet part into `sheet`, resolving shared-string cells
/// through `shared_strings`.
pub fn parse_worksheet(xml: &str, shared_strings: &[String], sheet: &mut Sheet) -> Result<()> {
    let mut reader = XmlReader::new(xml);

    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) => match tag.name.as_str() {
                "col" => parse_col(&tag, sheet)?,
                "row" => parse_row(&mut reader, &tag, shared_strings, sheet)?,
                "sheetProtection" => parse_protection(&tag, sheet),
                "autoFilter" => parse_auto_filter(&mut reader, &tag, sheet)?,
                "mergeCell" => {
                    let reference = tag
                        .attr("ref")
                        .ok_or_else(|| Error::Corrupt("mergeCell without ref".to_string()))?;
                    sheet.insert_merged_unchecked(CellRange::parse(reference)?);
                },
                "conditionalFormatting" => parse_conditional_formatting(&mut reader, &tag, sheet)?,
                "dataValidation" => parse_data_validation(&mut reader, &tag, sheet)?,
                _ => {},
            },
            XmlEvent::EndDocument => break,
            _ => {},
        }
    }

    Ok(())
}

fn parse_col(tag: &StartTag, sheet: &mut Sheet) -> Result<()> {
    let min: u32 = tag
        .attr("min")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::Corrupt("col without min".to_string()))?;
    let max: u32 = tag.attr("max").and_then(|v| v.parse().ok()).unwrap_or(min);
    let Some(width) = tag.attr("width").and_then(|v| v.parse::<f64>().ok()) else {
        return Ok(());
    };

    if min == 0 || max < min {
        return Err(Error::Corrupt(format!("invalid col range {min}..{max}")));
    }
    for col in (min - 1)..=(max - 1) {
        sheet.set_column_width(col, width)?;
    }
    Ok(())
}

fn parse_row(
    reader: &mut XmlReader<'_>,
    tag: &StartTag,
    shared_strings: &[String],
    sheet: &mut Sheet,
) -> Result<()> {
    let row_1based: u32 = tag
        .attr("r")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::Corrupt("row without number".to_string()))?;
    if row_1based == 0 {
        return Err(Error::Corrupt("row number must be positive".to_string()));
    }
    let row_num = row_1based - 1;

    let mut row = Row::default();
    row.height = tag.attr("ht").and_then(|v| v.parse().ok());
    row.hidden = tag.attr("hidden") == Some("1");

    loop {
        match reader.next()? {
            XmlEvent::StartElement(cell_tag) if cell_tag.name == "c" => {
                let (col, cell) = parse_cell(reader, &cell_tag, shared_strings)?;
                *row.cell_entry(col) = cell;
            },
            XmlEvent::EndElement(name) if name == "row" => break,
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt("unterminated row element".to_string()));
            },
            _ => {},
        }
    }

    sheet.set_row_record(row_num, row);
    Ok(())
}

/// Read one `<c>` element and produce its model cell.
fn parse_cell(
    reader: &mut XmlReader<'_>,
    tag: &StartTag,
    shared_strings: &[String],
) -> Result<(u32, Cell)> {
    let reference = tag
        .attr("r")
        .ok_or_else(|| Error::Corrupt("cell without reference".to_string()))?
        .to_string();
    let (_, col) = cellref::parse_ref(&reference)
        .map_err(|_| Error::Corrupt(format!("bad cell reference {reference}")))?;

    let style: u32 = tag.attr("s").and_then(|v| v.parse().ok()).unwrap_or(0);
    let cell_type = tag.attr("t").map(|t| t.to_string());

    let mut formula: Option<String> = None;
    let mut raw_value: Option<String> = None;
    let mut inline_text: Option<String> = None;

    loop {
        match reader.next()? {
            XmlEvent::StartElement(child) => match child.name.as_str() {
                "f" => formula = Some(reader.read_text_until_end()?),
                "v" => raw_value = Some(reader.read_text_until_end()?),
                "is" => inline_text = Some(parse_inline_string(reader)?),
                _ => reader.skip_element()?,
            },
            XmlEvent::EndElement(name) if name == "c" => break,
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt(format!("unterminated cell {reference}")));
            },
            _ => {},
        }
    }

    let plain_value = |raw: Option<String>| -> Result<CellValue> {
        let type_name = cell_type.as_deref().unwrap_or("n");
        match type_name {
            "n" => Ok(match raw {
                Some(text) => CellValue::Number(text.parse().map_err(|_| {
                    Error::Corrupt(format!("bad number in {reference}: {text}"))
                })?),
                None => CellValue::Empty,
            }),
            "b" => Ok(CellValue::Bool(raw.as_deref() == Some("1"))),
            "e" => {
                let code = raw.unwrap_or_default();
                CellError::parse(&code)
                    .map(CellValue::Error)
                    .ok_or_else(|| Error::Corrupt(format!("bad error code in {reference}: {code}")))
            },
            "s" => {
                let index: usize = raw
                    .as_deref()
                    .unwrap_or("")
                    .parse()
                    .map_err(|_| Error::Corrupt(format!("bad shared-string index in {reference}")))?;
                shared_strings
                    .get(index)
                    .map(|s| CellValue::Text(s.clone()))
                    .ok_or_else(|| {
                        Error::Corrupt(format!("shared-string index {index} out of range"))
                    })
            },
            "inlineStr" => Ok(CellValue::Text(inline_text.clone().unwrap_or_default())),
            "str" => Ok(CellValue::Text(raw.unwrap_or_default())),
            other => Err(Error::Corrupt(format!(
                "cell {reference} has unsupported type {other:?}"
            ))),
        }
    };

    let value = match formula {
        Some(expression) => {
            let cached = if raw_value.is_some() || inline_text.is_some() {
                plain_value(raw_value)?
            } else {
                CellValue::Empty
            };
            CellValue::Formula {
                expression,
                cached: Box::new(cached),
            }
        },
        None => plain_value(raw_value)?,
    };

    Ok((col, Cell { value, style }))
}

fn parse_inline_string(reader: &mut XmlReader<'_>) -> Result<String> {
    let mut text = String::new();
    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) if tag.name == "t" => {
                text.push_str(&reader.read_text_until_end()?);
            },
            XmlEvent::StartElement(_) => {},
            XmlEvent::EndElement(name) if name == "is" => break,
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt("unterminated inline string".to_string()));
            },
            _ => {},
        }
    }
    Ok(text)
}

fn parse_protection(tag: &StartTag, sheet: &mut Sheet) {
    let forbidden = |name: &str| tag.attr(name) == Some("1");

    let options = ProtectionOptions {
        select_locked_cells: !forbidden("selectLockedCells"),
        select_unlocked_cells: !forbidden("selectUnlockedCells"),
        format_cells: !forbidden("formatCells"),
        format_columns: !forbidden("formatColumns"),
        format_rows: !forbidden("formatRows"),
        insert_rows: !forbidden("insertRows"),
        insert_columns: !forbidden("insertColumns"),
        delete_rows: !forbidden("deleteRows"),
        delete_columns: !forbidden("deleteColumns"),
        sort: !forbidden("sort"),
        auto_filter: !forbidden("autoFilter"),
        pivot_tables: !forbidden("pivotTables"),
    };

    let password = match (tag.attr("hashValue"), tag.attr("saltValue")) {
        (Some(hash), Some(salt)) => Some(PasswordHash {
            algorithm: tag.attr("algorithmName").unwrap_or("SHA-512").to_string(),
            salt: salt.to_string(),
            hash: hash.to_string(),
            spin_count: tag
                .attr("spinCount")
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::sheet::protection::DEFAULT_SPIN_COUNT),
        }),
        _ => None,
    };

    sheet.set_protection_record(SheetProtection { options, password });
}

fn parse_auto_filter(reader: &mut XmlReader<'_>, tag: &StartTag, sheet: &mut Sheet) -> Result<()> {
    let reference = tag
        .attr("ref")
        .ok_or_else(|| Error::Corrupt("autoFilter without ref".to_string()))?;
    let mut filter = AutoFilter::new(CellRange::parse(reference)?);

    let mut column: Option<FilterColumn> = None;
    let mut custom_and = false;

    loop {
        match reader.next()? {
            XmlEvent::StartElement(child) => match child.name.as_str() {
                "filterColumn" => {
                    column = Some(FilterColumn {
                        index: child.attr("colId").and_then(|v| v.parse().ok()).unwrap_or(0),
                        ..FilterColumn::default()
                    });
                },
                "filter" => {
                    if let (Some(col), Some(value)) = (column.as_mut(), child.attr("val")) {
                        col.values.push(value.to_string());
                    }
                },
                "customFilters" => custom_and = child.attr("and") == Some("1"),
                "customFilter" => {
                    let operator = child
                        .attr("operator")
                        .and_then(FilterOperator::parse)
                        .unwrap_or(FilterOperator::Equal);
                    let value = child.attr("val").unwrap_or_default().to_string();
                    if let Some(col) = column.as_mut() {
                        match col.custom.as_mut() {
                            None => {
                                col.custom = Some(CustomFilter {
                                    op1: operator,
                                    val1: value,
                                    op2: None,
                                    val2: None,
                                    and: custom_and,
                                });
                            },
                            Some(existing) => {
                                existing.op2 = Some(operator);
                                existing.val2 = Some(value);
                                existing.and = custom_and;
                            },
                        }
                    }
                },
                _ => {},
            },
            XmlEvent::EndElement(name) => match name.as_str() {
                "filterColumn" => {
                    if let Some(col) = column.take() {
                        filter.columns.push(col);
                    }
                },
                "autoFilter" => break,
                _ => {},
            },
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt("unterminated autoFilter".to_string()));
            },
            _ => {},
        }
    }

    sheet.set_auto_filter(filter);
    Ok(())
}

fn parse_conditional_formatting(
    reader: &mut XmlReader<'_>,
    tag: &StartTag,
    sheet: &mut Sheet,
) -> Result<()> {
    let range = CellRange::parse(
        tag.attr("sqref")
            .ok_or_else(|| Error::Corrupt("conditionalFormatting without sqref".to_string()))?,
    )?;

    let mut rule: Option<ConditionalFormat> = None;

    loop {
        match reader.next()? {
            XmlEvent::StartElement(child) => match child.name.as_str() {
                "cfRule" => {
                    let rule_type = child
                        .attr("type")
                        .and_then(ConditionalFormatType::parse)
                        .ok_or_else(|| {
                            Error::Corrupt(format!(
                                "unknown cfRule type {:?}",
                                child.attr("type").unwrap_or("missing")
                            ))
                        })?;
                    rule = Some(ConditionalFormat {
                        range,
                        rule_type,
                        operator: child
                            .attr("operator")
                            .map(ComparisonOperator::parse)
                            .unwrap_or(ComparisonOperator::None),
                        formula1: None,
                        formula2: None,
                        style_id: child
                            .attr("dxfId")
                            .and_then(|v| v.parse::<u32>().ok())
                            .map(|dxf| dxf + 1)
                            .unwrap_or(0),
                    });
                },
                "formula" => {
                    let formula = reader.read_text_until_end()?;
                    if let Some(rule) = rule.as_mut() {
                        if rule.formula1.is_none() {
                            rule.formula1 = Some(formula);
                        } else if rule.formula2.is_none() {
                            rule.formula2 = Some(formula);
                        }
                    }
                },
                _ => reader.skip_element()?,
            },
            XmlEvent::EndElement(name) => match name.as_str() {
                "cfRule" => {
                    if let Some(rule) = rule.take() {
                        sheet.add_conditional_format(rule);
                    }
                },
                "conditionalFormatting" => break,
                _ => {},
            },
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt("unterminated conditionalFormatting".to_string()));
            },
            _ => {},
        }
    }

    Ok(())
}

fn parse_data_validation(
    reader: &mut XmlReader<'_>,
    tag: &StartTag,
    sheet: &mut Sheet,
) -> Result<()> {
    let range = CellRange::parse(
        tag.attr("sqref")
            .ok_or_else(|| Error::Corrupt("dataValidation without sqref".to_string()))?,
    )?;

    let mut validation = DataValidation::new(
        range,
        tag.attr("type")
            .map(DataValidationType::parse)
            .unwrap_or(DataValidationType::Any),
    );
    validation.operator = tag.attr("operator").map(ComparisonOperator::parse);
    validation.error_title = tag.attr("errorTitle").map(str::to_string);
    validation.error_message = tag.attr("error").map(str::to_string);
    validation.show_dropdown = tag.attr("showDropDown") != Some("1");

    loop {
        match reader.next()? {
            XmlEvent::StartElement(child) => match child.name.as_str() {
                "formula1" => validation.formula1 = Some(reader.read_text_until_end()?),
                "formula2" => validation.formula2 = Some(reader.read_text_until_end()?),
                _ => reader.skip_element()?,
            },
            XmlEvent::EndElement(name) if name == "dataValidation" => break,
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt("unterminated dataValidation".to_string()));
            },
            _ => {},
        }
    }

    sheet.add_data_validation(validation);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Workbook;

    fn roundtrip(sheet: &Sheet) -> Sheet {
        let xml = write_worksheet(sheet).unwrap();
        let mut parsed = Sheet::new(sheet.name().to_string(), sheet.sheet_id());
        parse_worksheet(&xml, &[], &mut parsed).unwrap();
        parsed
    }

    #[test]
    fn test_cell_value_roundtrip() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        sheet.set_value(0, 0, "Name").unwrap();
        sheet.set_value(0, 1, 30.5).unwrap();
        sheet.set_value(1, 0, true).unwrap();
        sheet.set_value(1, 1, CellError::Div0).unwrap();
        sheet.set_value(2, 0, "").unwrap();
        sheet
            .set_value(2, 1, CellValue::formula_with_cache("A1+B1", CellValue::Number(30.0)))
            .unwrap();
        sheet.set_value(3, 0, CellValue::formula("SUM(A1:A3)")).unwrap();

        let parsed = roundtrip(sheet);
        assert_eq!(parsed.value(0, 0), Some(&CellValue::Text("Name".into())));
        assert_eq!(parsed.value(0, 1), Some(&CellValue::Number(30.5)));
        assert_eq!(parsed.value(1, 0), Some(&CellValue::Bool(true)));
        assert_eq!(parsed.value(1, 1), Some(&CellValue::Error(CellError::Div0)));
        // empty string is text, not an absent cell
        assert_eq!(parsed.value(2, 0), Some(&CellValue::Text(String::new())));
        assert_eq!(
            parsed.value(2, 1),
            Some(&CellValue::formula_with_cache("A1+B1", CellValue::Number(30.0)))
        );
        assert_eq!(parsed.value(3, 0), Some(&CellValue::formula("SUM(A1:A3)")));
    }

    #[test]
    fn test_whitespace_preserved() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        sheet.set_value(0, 0, "  leading").unwrap();
        sheet.set_value(0, 1, "trailing  ").unwrap();

        let xml = write_worksheet(sheet).unwrap();
        assert!(xml.contains(r#"xml:space="preserve""#));

        let parsed = roundtrip(sheet);
        assert_eq!(parsed.value(0, 0), Some(&CellValue::Text("  leading".into())));
        assert_eq!(parsed.value(0, 1), Some(&CellValue::Text("trailing  ".into())));
    }

    #[test]
    fn test_empty_cells_omitted() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        sheet.set_value(0, 0, CellValue::Empty).unwrap();
        sheet.set_value(0, 1, 1.0).unwrap();

        let xml = write_worksheet(sheet).unwrap();
        assert!(!xml.contains(r#"r="A1""#));
        assert!(xml.contains(r#"r="B1""#));
    }

    #[test]
    fn test_section_order() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        sheet.set_value(0, 0, 1.0).unwrap();
        sheet.set_column_width(0, 20.0).unwrap();
        sheet.merge(4, 0, 5, 1).unwrap();
        sheet.protect(ProtectionOptions::default());
        sheet.set_auto_filter(AutoFilter::new(CellRange::parse("A1:B1").unwrap()));
        sheet.add_conditional_format(ConditionalFormat::cell_is(
            CellRange::parse("A1:A8").unwrap(),
            ComparisonOperator::GreaterThan,
            "79.0",
            1,
        ));
        let mut dv = DataValidation::new(
            CellRange::parse("B2:B9").unwrap(),
            DataValidationType::Whole,
        );
        dv.operator = Some(ComparisonOperator::Between);
        dv.formula1 = Some("1".to_string());
        dv.formula2 = Some("10".to_string());
        sheet.add_data_validation(dv);

        let xml = write_worksheet(sheet).unwrap();
        let positions: Vec<usize> = [
            "<cols>",
            "<sheetData>",
            "<sheetProtection ",
            "<autoFilter ",
            "<mergeCells ",
            "<conditionalFormatting ",
            "<dataValidations ",
        ]
        .iter()
        .map(|section| xml.find(section).unwrap_or_else(|| panic!("missing {section}")))
        .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted, "sections out of order");
    }

    #[test]
    fn test_protection_inverse_flags() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        let options = ProtectionOptions {
            format_cells: false,
            insert_rows: false,
            sort: true,
            auto_filter: true,
            ..ProtectionOptions::default()
        };
        sheet.protect(options.clone());

        let xml = write_worksheet(sheet).unwrap();
        assert!(xml.contains(r#"formatCells="1""#));
        assert!(xml.contains(r#"insertRows="1""#));
        assert!(!xml.contains("sort="));
        assert!(!xml.contains("autoFilter="));
        assert!(xml.contains(r#"objects="1""#));
        assert!(xml.contains(r#"scenarios="1""#));

        let parsed = roundtrip(sheet);
        assert_eq!(parsed.protection().unwrap().options, options);
    }

    #[test]
    fn test_conditional_format_dxf_mapping() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        sheet.add_conditional_format(ConditionalFormat::cell_is(
            CellRange::parse("A1:A8").unwrap(),
            ComparisonOperator::GreaterThan,
            "79.0",
            3,
        ));

        let xml = write_worksheet(sheet).unwrap();
        assert!(xml.contains(r#"type="cellIs""#));
        assert!(xml.contains(r#"operator="greaterThan""#));
        assert!(xml.contains(r#"dxfId="2""#));
        assert!(xml.contains("<formula>79.0</formula>"));

        let parsed = roundtrip(sheet);
        let rule = &parsed.conditional_formats()[0];
        assert_eq!(rule.range.to_a1(), "A1:A8");
        assert_eq!(rule.style_id, 3);
        assert_eq!(rule.formula1.as_deref(), Some("79.0"));
    }

    #[test]
    fn test_validation_roundtrip() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        let mut dv = DataValidation::new(
            CellRange::parse("C1:C20").unwrap(),
            DataValidationType::List,
        );
        dv.formula1 = Some("\"Red,Green,Blue\"".to_string());
        dv.error_title = Some("Pick one".to_string());
        dv.error_message = Some("Use the dropdown".to_string());
        sheet.add_data_validation(dv.clone());

        let parsed = roundtrip(sheet);
        assert_eq!(parsed.data_validations(), &[dv]);
    }

    #[test]
    fn test_autofilter_roundtrip() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        let mut filter = AutoFilter::new(CellRange::parse("A1:C9").unwrap());
        filter.columns.push(FilterColumn {
            index: 0,
            values: vec!["Alice".to_string(), "Bob".to_string()],
            custom: None,
        });
        filter.columns.push(FilterColumn {
            index: 2,
            values: Vec::new(),
            custom: Some(CustomFilter {
                op1: FilterOperator::GreaterThan,
                val1: "5".to_string(),
                op2: Some(FilterOperator::LessThanOrEqual),
                val2: Some("10".to_string()),
                and: true,
            }),
        });
        sheet.set_auto_filter(filter.clone());

        let parsed = roundtrip(sheet);
        assert_eq!(parsed.auto_filter(), Some(&filter));
    }

    #[test]
    fn test_row_and_column_metadata() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        sheet.set_value(1, 1, 5.0).unwrap();
        sheet.set_row_height(1, 28.5).unwrap();
        sheet.set_row_hidden(3, true).unwrap();
        sheet.set_column_width(2, 17.25).unwrap();

        let parsed = roundtrip(sheet);
        assert_eq!(parsed.row(1).unwrap().height, Some(28.5));
        assert!(parsed.row(3).unwrap().hidden);
        assert_eq!(parsed.column_width(2), Some(17.25));
    }

    #[test]
    fn test_shared_string_cells() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>1</v></c></row></sheetData></worksheet>"#;
        let shared = vec!["zero".to_string(), "one".to_string()];
        let mut sheet = Sheet::new("S".to_string(), 1);
        parse_worksheet(xml, &shared, &mut sheet).unwrap();
        assert_eq!(sheet.value(0, 0), Some(&CellValue::Text("one".into())));

        let bad = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>7</v></c></row></sheetData></worksheet>"#;
        let mut sheet = Sheet::new("S".to_string(), 1);
        assert!(parse_worksheet(bad, &shared, &mut sheet).is_err());
    }

    #[test]
    fn test_unknown_cell_type_rejected() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1" t="q"><v>1</v></c></row></sheetData></worksheet>"#;
        let mut sheet = Sheet::new("S".to_string(), 1);
        let err = parse_worksheet(xml, &[], &mut sheet).unwrap_err();
        assert!(err.to_string().contains("A1"));
    }

    #[test]
    fn test_merged_regions_roundtrip() {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet("S").unwrap();
        sheet.merge(0, 0, 1, 3).unwrap();
        sheet.merge(4, 0, 4, 1).unwrap();

        let parsed = roundtrip(sheet);
        assert_eq!(parsed.merged_regions(), sheet.merged_regions());
    }
}
