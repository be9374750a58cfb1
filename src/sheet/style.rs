//! Cell styling: fonts, borders, fills, alignment, and the workbook style
//! table.
//!
//! Styles are value types compared structurally. The workbook owns a single
//! ordered style table; slot 0 is the immutable default style and
//! `StyleTable::add` deduplicates structurally equal entries so repeated
//! registration of the same style is cheap.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// ARGB color, `0xAARRGGBB`. `0x00000000` means "no color" where a color is
/// optional (fills).
pub type Color = u32;

/// Opaque black.
pub const COLOR_BLACK: Color = 0xFF00_0000;

/// Font settings for a cell style.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub name: String,
    /// Size in points
    pub size: f64,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            name: "Calibri".to_string(),
            size: 11.0,
            color: COLOR_BLACK,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
        }
    }
}

/// Line style of one border side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Double,
    Dashed,
    Dotted,
}

impl BorderStyle {
    /// The OOXML `style` attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            BorderStyle::None => "none",
            BorderStyle::Thin => "thin",
            BorderStyle::Medium => "medium",
            BorderStyle::Thick => "thick",
            BorderStyle::Double => "double",
            BorderStyle::Dashed => "dashed",
            BorderStyle::Dotted => "dotted",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "thin" => BorderStyle::Thin,
            "medium" => BorderStyle::Medium,
            "thick" => BorderStyle::Thick,
            "double" => BorderStyle::Double,
            "dashed" => BorderStyle::Dashed,
            "dotted" => BorderStyle::Dotted,
            _ => BorderStyle::None,
        }
    }
}

/// One side of a cell border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BorderSide {
    pub style: BorderStyle,
    pub color: Color,
}

impl Default for BorderSide {
    fn default() -> Self {
        Self {
            style: BorderStyle::None,
            color: COLOR_BLACK,
        }
    }
}

/// The four borders of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Border {
    pub left: BorderSide,
    pub right: BorderSide,
    pub top: BorderSide,
    pub bottom: BorderSide,
}

impl Border {
    /// Whether any side draws a line.
    pub fn is_any(&self) -> bool {
        self.left.style != BorderStyle::None
            || self.right.style != BorderStyle::None
            || self.top.style != BorderStyle::None
            || self.bottom.style != BorderStyle::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlignment {
    #[default]
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
}

impl HorizontalAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            HorizontalAlignment::General => "general",
            HorizontalAlignment::Left => "left",
            HorizontalAlignment::Center => "center",
            HorizontalAlignment::Right => "right",
            HorizontalAlignment::Fill => "fill",
            HorizontalAlignment::Justify => "justify",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "left" => HorizontalAlignment::Left,
            "center" => HorizontalAlignment::Center,
            "right" => HorizontalAlignment::Right,
            "fill" => HorizontalAlignment::Fill,
            "justify" => HorizontalAlignment::Justify,
            _ => HorizontalAlignment::General,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlignment {
    Top,
    Middle,
    #[default]
    Bottom,
}

impl VerticalAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalAlignment::Top => "top",
            VerticalAlignment::Middle => "center",
            VerticalAlignment::Bottom => "bottom",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "top" => VerticalAlignment::Top,
            "center" => VerticalAlignment::Middle,
            _ => VerticalAlignment::Bottom,
        }
    }
}

/// Text alignment within a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Alignment {
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
}

/// A complete cell style.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub font: Font,
    pub border: Border,
    /// ARGB solid fill; `0x00000000` means no fill
    pub fill_color: Color,
    pub alignment: Alignment,
    /// Custom number format code, e.g. `"0.00%"` or `"yyyy-mm-dd"`
    pub number_format: Option<String>,
    pub wrap_text: bool,
    pub locked: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font: Font::default(),
            border: Border::default(),
            fill_color: 0,
            alignment: Alignment::default(),
            number_format: None,
            wrap_text: false,
            locked: true,
        }
    }
}

fn hash_font<H: Hasher>(font: &Font, state: &mut H) {
    font.name.hash(state);
    font.size.to_bits().hash(state);
    font.color.hash(state);
    (font.bold, font.italic, font.underline, font.strikethrough).hash(state);
}

fn hash_style(style: &Style) -> u64 {
    let mut state = std::collections::hash_map::DefaultHasher::new();
    hash_font(&style.font, &mut state);
    style.border.hash(&mut state);
    style.fill_color.hash(&mut state);
    style.alignment.hash(&mut state);
    style.number_format.hash(&mut state);
    (style.wrap_text, style.locked).hash(&mut state);
    state.finish()
}

/// The workbook's ordered style table with structural deduplication.
#[derive(Debug)]
pub struct StyleTable {
    styles: Vec<Style>,
    /// Structural hash to candidate slots; confirmed by equality on lookup
    index: HashMap<u64, Vec<u32>>,
}

impl StyleTable {
    /// Create a table holding only the default style at slot 0.
    pub fn new() -> Self {
        let mut table = Self {
            styles: Vec::new(),
            index: HashMap::new(),
        };
        table.add(&Style::default());
        table
    }

    /// Register a style, returning its id. Structurally equal styles share
    /// one slot.
    pub fn add(&mut self, style: &Style) -> u32 {
        let hash = hash_style(style);
        if let Some(candidates) = self.index.get(&hash) {
            for &id in candidates {
                if &self.styles[id as usize] == style {
                    return id;
                }
            }
        }

        let id = self.styles.len() as u32;
        self.styles.push(style.clone());
        self.index.entry(hash).or_default().push(id);
        id
    }

    /// Look up a style by id.
    pub fn get(&self, id: u32) -> Option<&Style> {
        self.styles.get(id as usize)
    }

    /// All styles in slot order.
    pub fn styles(&self) -> &[Style] {
        &self.styles
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Rebuild a table from parsed styles, preserving slot order. An empty
    /// source falls back to the default table.
    pub fn from_styles(styles: Vec<Style>) -> Self {
        if styles.is_empty() {
            return Self::new();
        }
        let mut index: HashMap<u64, Vec<u32>> = HashMap::new();
        for (id, style) in styles.iter().enumerate() {
            index.entry(hash_style(style)).or_default().push(id as u32);
        }
        Self { styles, index }
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}
