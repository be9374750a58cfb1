//! Writer and parser for the `xl/styles.xml` part.
//!
//! The style table flattens into the part's interior indexes: unique fonts,
//! fills, borders, and custom number formats, referenced by 0-based index
//! from one `cellXf` per style slot. The first two fills are the `none` and
//! `gray125` patterns Excel requires, and custom number formats start at id
//! 164 because 0 through 163 are reserved for the built-in formats. Every
//! non-default style also yields a differential format (`dxf`) so
//! conditional-formatting rules can reference it as `dxfId = style id - 1`.

use crate::error::{Error, Result};
use crate::sheet::style::{
    Alignment, Border, BorderSide, BorderStyle, Color, Font, HorizontalAlignment, Style,
    StyleTable, VerticalAlignment,
};
use crate::xml::{StartTag, XmlEvent, XmlReader, XmlWriter};

/// First number-format id available to custom formats.
const CUSTOM_NUMFMT_BASE: u32 = 164;

fn color_hex(color: Color) -> String {
    format!("{color:08X}")
}

fn parse_color_attr(tag: &StartTag) -> Option<Color> {
    tag.attr("rgb")
        .and_then(|v| u32::from_str_radix(v, 16).ok())
}

fn index_of<T: PartialEq>(items: &mut Vec<T>, item: T) -> usize {
    if let Some(pos) = items.iter().position(|existing| existing == &item) {
        pos
    } else {
        items.push(item);
        items.len() - 1
    }
}

/// Serialize the workbook style table.
pub fn write_styles(styles: &StyleTable) -> Result<String> {
    // collect the interior tables; fonts and borders always hold the
    // defaults at index 0, fills reserve the two mandatory pattern slots
    let mut fonts: Vec<Font> = vec![Font::default()];
    let mut fills: Vec<Color> = Vec::new();
    let mut borders: Vec<Border> = vec![Border::default()];
    let mut numfmts: Vec<String> = Vec::new();

    struct Xf {
        font_id: usize,
        fill_id: usize,
        border_id: usize,
        numfmt_id: u32,
        alignment: Alignment,
        wrap_text: bool,
        locked: bool,
    }

    let mut xfs = Vec::with_capacity(styles.len());
    for style in styles.styles() {
        let font_id = index_of(&mut fonts, style.font.clone());
        let fill_id = if style.fill_color == 0 {
            0
        } else {
            // indexes 0 and 1 are the reserved pattern fills
            index_of(&mut fills, style.fill_color) + 2
        };
        let border_id = index_of(&mut borders, style.border);
        let numfmt_id = match &style.number_format {
            Some(code) => CUSTOM_NUMFMT_BASE + index_of(&mut numfmts, code.clone()) as u32,
            None => 0,
        };
        xfs.push(Xf {
            font_id,
            fill_id,
            border_id,
            numfmt_id,
            alignment: style.alignment,
            wrap_text: style.wrap_text,
            locked: style.locked,
        });
    }

    let mut w = XmlWriter::new();
    w.start_document();
    w.start_element("styleSheet");
    w.attribute("xmlns", super::NS_SPREADSHEETML);

    if !numfmts.is_empty() {
        w.start_element("numFmts");
        w.attribute("count", &numfmts.len().to_string());
        for (i, code) in numfmts.iter().enumerate() {
            w.start_element("numFmt");
            w.attribute("numFmtId", &(CUSTOM_NUMFMT_BASE + i as u32).to_string());
            w.attribute("formatCode", code);
            w.end_element()?;
        }
        w.end_element()?;
    }

    w.start_element("fonts");
    w.attribute("count", &fonts.len().to_string());
    for font in &fonts {
        write_font(&mut w, font)?;
    }
    w.end_element()?;

    w.start_element("fills");
    w.attribute("count", &(fills.len() + 2).to_string());
    for pattern in ["none", "gray125"] {
        w.start_element("fill");
        w.start_element("patternFill");
        w.attribute("patternType", pattern);
        w.end_element()?;
        w.end_element()?;
    }
    for &color in &fills {
        w.start_element("fill");
        w.start_element("patternFill");
        w.attribute("patternType", "solid");
        w.start_element("fgColor");
        w.attribute("rgb", &color_hex(color));
        w.end_element()?;
        w.start_element("bgColor");
        w.attribute("indexed", "64");
        w.end_element()?;
        w.end_element()?;
        w.end_element()?;
    }
    w.end_element()?;

    w.start_element("borders");
    w.attribute("count", &borders.len().to_string());
    for border in &borders {
        write_border(&mut w, border)?;
    }
    w.end_element()?;

    w.start_element("cellStyleXfs");
    w.attribute("count", "1");
    w.start_element("xf");
    w.attribute("numFmtId", "0");
    w.attribute("fontId", "0");
    w.attribute("fillId", "0");
    w.attribute("borderId", "0");
    w.end_element()?;
    w.end_element()?;

    w.start_element("cellXfs");
    w.attribute("count", &xfs.len().to_string());
    for xf in &xfs {
        w.start_element("xf");
        w.attribute("numFmtId", &xf.numfmt_id.to_string());
        w.attribute("fontId", &xf.font_id.to_string());
        w.attribute("fillId", &xf.fill_id.to_string());
        w.attribute("borderId", &xf.border_id.to_string());
        w.attribute("xfId", "0");
        if xf.numfmt_id != 0 {
            w.attribute("applyNumberFormat", "1");
        }
        if xf.font_id != 0 {
            w.attribute("applyFont", "1");
        }
        if xf.fill_id != 0 {
            w.attribute("applyFill", "1");
        }
        if xf.border_id != 0 {
            w.attribute("applyBorder", "1");
        }

        let custom_alignment = xf.alignment != Alignment::default() || xf.wrap_text;
        if custom_alignment {
            w.attribute("applyAlignment", "1");
        }
        if !xf.locked {
            w.attribute("applyProtection", "1");
        }
        if custom_alignment {
            w.start_element("alignment");
            if xf.alignment.horizontal != HorizontalAlignment::General {
                w.attribute("horizontal", xf.alignment.horizontal.as_str());
            }
            if xf.alignment.vertical != VerticalAlignment::Bottom {
                w.attribute("vertical", xf.alignment.vertical.as_str());
            }
            if xf.wrap_text {
                w.attribute("wrapText", "1");
            }
            w.end_element()?;
        }
        if !xf.locked {
            w.start_element("protection");
            w.attribute("locked", "0");
            w.end_element()?;
        }
        w.end_element()?;
    }
    w.end_element()?;

    w.start_element("cellStyles");
    w.attribute("count", "1");
    w.start_element("cellStyle");
    w.attribute("name", "Normal");
    w.attribute("xfId", "0");
    w.attribute("builtinId", "0");
    w.end_element()?;
    w.end_element()?;

    // one differential format per non-default style
    w.start_element("dxfs");
    w.attribute("count", &styles.len().saturating_sub(1).to_string());
    for style in styles.styles().iter().skip(1) {
        w.start_element("dxf");
        write_font(&mut w, &style.font)?;
        if style.fill_color != 0 {
            w.start_element("fill");
            w.start_element("patternFill");
            w.start_element("bgColor");
            w.attribute("rgb", &color_hex(style.fill_color));
            w.end_element()?;
            w.end_element()?;
            w.end_element()?;
        }
        w.end_element()?;
    }
    w.end_element()?;

    w.end_element()?;
    w.end_document()
}

fn write_font(w: &mut XmlWriter, font: &Font) -> Result<()> {
    w.start_element("font");
    if font.bold {
        w.empty_element("b");
    }
    if font.italic {
        w.empty_element("i");
    }
    if font.underline {
        w.empty_element("u");
    }
    if font.strikethrough {
        w.empty_element("strike");
    }
    w.start_element("sz");
    w.attribute("val", &format_number(font.size));
    w.end_element()?;
    w.start_element("color");
    w.attribute("rgb", &color_hex(font.color));
    w.end_element()?;
    w.start_element("name");
    w.attribute("val", &font.name);
    w.end_element()?;
    w.end_element()
}

fn write_border(w: &mut XmlWriter, border: &Border) -> Result<()> {
    w.start_element("border");
    for (name, side) in [
        ("left", &border.left),
        ("right", &border.right),
        ("top", &border.top),
        ("bottom", &border.bottom),
    ] {
        w.start_element(name);
        if side.style != BorderStyle::None {
            w.attribute("style", side.style.as_str());
            w.start_element("color");
            w.attribute("rgb", &color_hex(side.color));
            w.end_element()?;
        }
        w.end_element()?;
    }
    w.empty_element("diagonal");
    w.end_element()
}

/// Format a double the way Excel writes them: integral values without the
/// trailing `.0`.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Parse the styles part back into a style table. The `cellXfs` order is the
/// style-id order used by cells' `s` attributes.
pub fn parse_styles(xml: &str) -> Result<StyleTable> {
    let mut numfmts: Vec<(u32, String)> = Vec::new();
    let mut fonts: Vec<Font> = Vec::new();
    let mut fills: Vec<Color> = Vec::new();
    let mut borders: Vec<Border> = Vec::new();
    let mut styles: Vec<Style> = Vec::new();
    let mut in_cell_xfs = false;

    let mut reader = XmlReader::new(xml);
    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) => match tag.name.as_str() {
                "numFmt" => {
                    if let (Some(id), Some(code)) = (tag.attr("numFmtId"), tag.attr("formatCode")) {
                        let id = id
                            .parse()
                            .map_err(|_| Error::Corrupt(format!("bad numFmtId: {id}")))?;
                        numfmts.push((id, code.to_string()));
                    }
                },
                "font" => fonts.push(parse_font(&mut reader)?),
                "fill" => fills.push(parse_fill(&mut reader)?),
                "border" => borders.push(parse_border(&mut reader)?),
                "cellXfs" => in_cell_xfs = true,
                "xf" if in_cell_xfs => {
                    styles.push(parse_xf(&mut reader, &tag, &numfmts, &fonts, &fills, &borders)?);
                },
                "dxfs" => reader.skip_element()?,
                _ => {},
            },
            XmlEvent::EndElement(name) if name == "cellXfs" => in_cell_xfs = false,
            XmlEvent::EndDocument => break,
            _ => {},
        }
    }

    Ok(StyleTable::from_styles(styles))
}

fn parse_font(reader: &mut XmlReader<'_>) -> Result<Font> {
    let mut font = Font::default();
    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) => {
                match tag.name.as_str() {
                    "b" => font.bold = true,
                    "i" => font.italic = true,
                    "u" => font.underline = true,
                    "strike" => font.strikethrough = true,
                    "sz" => {
                        if let Some(size) = tag.attr("val").and_then(|v| v.parse().ok()) {
                            font.size = size;
                        }
                    },
                    "color" => {
                        if let Some(color) = parse_color_attr(&tag) {
                            font.color = color;
                        }
                    },
                    "name" => {
                        if let Some(name) = tag.attr("val") {
                            font.name = name.to_string();
                        }
                    },
                    _ => {},
                }
            },
            XmlEvent::EndElement(name) if name == "font" => break,
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt("unterminated font element".to_string()));
            },
            _ => {},
        }
    }
    Ok(font)
}

fn parse_fill(reader: &mut XmlReader<'_>) -> Result<Color> {
    let mut solid = false;
    let mut color = 0u32;
    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) => match tag.name.as_str() {
                "patternFill" => solid = tag.attr("patternType") == Some("solid"),
                "fgColor" if solid => {
                    if let Some(rgb) = parse_color_attr(&tag) {
                        color = rgb;
                    }
                },
                _ => {},
            },
            XmlEvent::EndElement(name) if name == "fill" => break,
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt("unterminated fill element".to_string()));
            },
            _ => {},
        }
    }
    Ok(color)
}

fn parse_border(reader: &mut XmlReader<'_>) -> Result<Border> {
    let mut border = Border::default();
    let mut current: Option<(String, BorderSide)> = None;

    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) => match tag.name.as_str() {
                "left" | "right" | "top" | "bottom" => {
                    let style = tag.attr("style").map(BorderStyle::parse).unwrap_or_default();
                    current = Some((
                        tag.name.clone(),
                        BorderSide {
                            style,
                            ..BorderSide::default()
                        },
                    ));
                },
                "color" => {
                    if let (Some((_, side)), Some(rgb)) = (current.as_mut(), parse_color_attr(&tag))
                    {
                        side.color = rgb;
                    }
                },
                _ => {},
            },
            XmlEvent::EndElement(name) => match name.as_str() {
                "left" | "right" | "top" | "bottom" => {
                    if let Some((side_name, side)) = current.take() {
                        match side_name.as_str() {
                            "left" => border.left = side,
                            "right" => border.right = side,
                            "top" => border.top = side,
                            _ => border.bottom = side,
                        }
                    }
                },
                "border" => break,
                _ => {},
            },
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt("unterminated border element".to_string()));
            },
            _ => {},
        }
    }
    Ok(border)
}

fn parse_xf(
    reader: &mut XmlReader<'_>,
    tag: &StartTag,
    numfmts: &[(u32, String)],
    fonts: &[Font],
    fills: &[Color],
    borders: &[Border],
) -> Result<Style> {
    let get_index = |attr: &str| {
        tag.attr(attr)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0)
    };

    let mut style = Style {
        font: fonts.get(get_index("fontId")).cloned().unwrap_or_default(),
        fill_color: fills.get(get_index("fillId")).copied().unwrap_or(0),
        border: borders.get(get_index("borderId")).copied().unwrap_or_default(),
        ..Style::default()
    };

    if let Some(id) = tag.attr("numFmtId").and_then(|v| v.parse::<u32>().ok()) {
        if id >= CUSTOM_NUMFMT_BASE {
            style.number_format = numfmts
                .iter()
                .find(|(fmt_id, _)| *fmt_id == id)
                .map(|(_, code)| code.clone());
        }
    }

    // children: alignment and protection
    loop {
        match reader.next()? {
            XmlEvent::StartElement(child) => match child.name.as_str() {
                "alignment" => {
                    if let Some(value) = child.attr("horizontal") {
                        style.alignment.horizontal = HorizontalAlignment::parse(value);
                    }
                    if let Some(value) = child.attr("vertical") {
                        style.alignment.vertical = VerticalAlignment::parse(value);
                    }
                    if child.attr("wrapText") == Some("1") {
                        style.wrap_text = true;
                    }
                },
                "protection" => {
                    if child.attr("locked") == Some("0") {
                        style.locked = false;
                    }
                },
                _ => {},
            },
            XmlEvent::EndElement(name) if name == "xf" => break,
            XmlEvent::EndDocument => {
                return Err(Error::Corrupt("unterminated xf element".to_string()));
            },
            _ => {},
        }
    }

    Ok(style)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> StyleTable {
        let mut table = StyleTable::new();

        let mut header = Style::default();
        header.font.bold = true;
        header.font.size = 14.0;
        header.fill_color = 0xFFDD_EEFF;
        header.alignment = Alignment {
            horizontal: HorizontalAlignment::Center,
            vertical: VerticalAlignment::Middle,
        };
        header.wrap_text = true;
        table.add(&header);

        let mut money = Style::default();
        money.number_format = Some("#,##0.00".to_string());
        money.border.bottom = BorderSide {
            style: BorderStyle::Thin,
            color: 0xFF00_0000,
        };
        money.locked = false;
        table.add(&money);

        table
    }

    #[test]
    fn test_roundtrip() {
        let table = sample_table();
        let xml = write_styles(&table).unwrap();
        let parsed = parse_styles(&xml).unwrap();

        assert_eq!(parsed.len(), table.len());
        for (expected, actual) in table.styles().iter().zip(parsed.styles()) {
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn test_reserved_fills_and_numfmt_base() {
        let xml = write_styles(&sample_table()).unwrap();
        assert!(xml.contains(r#"<patternFill patternType="none"/>"#));
        assert!(xml.contains(r#"<patternFill patternType="gray125"/>"#));
        assert!(xml.contains(r#"numFmtId="164""#));
        assert!(xml.contains(r##"formatCode="#,##0.00""##));
    }

    #[test]
    fn test_dxf_count_is_styles_minus_one() {
        let xml = write_styles(&sample_table()).unwrap();
        assert!(xml.contains(r#"<dxfs count="2">"#));
    }

    #[test]
    fn test_default_only_table() {
        let table = StyleTable::new();
        let xml = write_styles(&table).unwrap();
        assert!(xml.contains(r#"<cellXfs count="1">"#));
        assert!(xml.contains(r#"<dxfs count="0">"#));

        let parsed = parse_styles(&xml).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get(0).unwrap(), &Style::default());
    }

    #[test]
    fn test_parse_accepts_duplicates() {
        let xml = r#"<styleSheet><fonts count="1"><font><sz val="11"/><color rgb="FF000000"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellXfs></styleSheet>"#;
        let parsed = parse_styles(xml).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get(0), parsed.get(1));
    }
}
