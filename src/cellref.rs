//! Conversion between `(row, column)` indices and A1-style references.
//!
//! Rows and columns are 0-based throughout the crate; the textual form uses
//! base-26 column letters and 1-based row numbers, so `(0, 0)` is `"A1"` and
//! `(26, 27)` is `"AB27"`.

use crate::error::{Error, Result};

/// Highest legal 0-based row index (1,048,576 rows).
pub const MAX_ROW: u32 = 1_048_575;

/// Highest legal 0-based column index (16,384 columns, `A` through `XFD`).
pub const MAX_COL: u32 = 16_383;

/// Convert a 0-based column index to Excel column letters.
///
/// `0 -> "A"`, `25 -> "Z"`, `26 -> "AA"`, `701 -> "ZZ"`.
pub fn col_to_letters(col: u32) -> String {
    let mut letters = String::new();
    let mut n = col + 1;

    while n > 0 {
        n -= 1;
        let letter = ((n % 26) as u8 + b'A') as char;
        letters.insert(0, letter);
        n /= 26;
    }

    letters
}

/// Convert Excel column letters to a 0-based column index.
///
/// Accepts upper or lower case on input.
pub fn letters_to_col(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidArgument("empty column letters".to_string()));
    }

    let mut col = 0u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(Error::InvalidArgument(format!(
                "invalid column letters: {letters}"
            )));
        }
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }

    Ok(col - 1)
}

/// Format a 0-based `(row, col)` pair as an A1 reference.
pub fn to_ref(row: u32, col: u32) -> String {
    format!("{}{}", col_to_letters(col), row + 1)
}

/// Parse an A1 reference into a 0-based `(row, col)` pair.
///
/// Dollar signs from absolute references (`$B$2`) are accepted and ignored.
pub fn parse_ref(reference: &str) -> Result<(u32, u32)> {
    let mut col_str = String::new();
    let mut row_str = String::new();

    for ch in reference.chars() {
        if ch == '$' {
            continue;
        }
        if ch.is_ascii_alphabetic() {
            if !row_str.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "invalid cell reference: {reference}"
                )));
            }
            col_str.push(ch);
        } else {
            row_str.push(ch);
        }
    }

    if col_str.is_empty() || row_str.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "invalid cell reference: {reference}"
        )));
    }

    let col = letters_to_col(&col_str)?;
    let row_1based = row_str.parse::<u32>().map_err(|_| {
        Error::InvalidArgument(format!("invalid row number in reference: {reference}"))
    })?;
    if row_1based == 0 {
        return Err(Error::InvalidArgument(format!(
            "invalid row number in reference: {reference}"
        )));
    }

    Ok((row_1based - 1, col))
}

/// A rectangular, inclusive cell range with 0-based coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl CellRange {
    /// Create a range. Both corners must be in bounds and the start must not
    /// exceed the end on either axis.
    pub fn new(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Result<Self> {
        if start_row > end_row || start_col > end_col {
            return Err(Error::InvalidArgument(format!(
                "range start must not exceed end: ({start_row},{start_col})..({end_row},{end_col})"
            )));
        }
        if end_row > MAX_ROW || end_col > MAX_COL {
            return Err(Error::InvalidArgument(format!(
                "range exceeds sheet bounds: ({end_row},{end_col})"
            )));
        }
        Ok(Self {
            start_row,
            start_col,
            end_row,
            end_col,
        })
    }

    /// Create a single-cell range.
    pub fn cell(row: u32, col: u32) -> Result<Self> {
        Self::new(row, col, row, col)
    }

    /// Parse `"A1:F6"` or the single-cell form `"A1"`.
    pub fn parse(text: &str) -> Result<Self> {
        match text.split_once(':') {
            Some((start, end)) => {
                let (r1, c1) = parse_ref(start)?;
                let (r2, c2) = parse_ref(end)?;
                Self::new(r1, c1, r2, c2)
            },
            None => {
                let (row, col) = parse_ref(text)?;
                Self::cell(row, col)
            },
        }
    }

    /// Whether this range shares at least one cell with `other`.
    pub fn intersects(&self, other: &CellRange) -> bool {
        self.start_row <= other.end_row
            && other.start_row <= self.end_row
            && self.start_col <= other.end_col
            && other.start_col <= self.end_col
    }

    /// Format as `"A1:F6"`, or `"A1"` when the range is a single cell.
    pub fn to_a1(&self) -> String {
        if self.start_row == self.end_row && self.start_col == self.end_col {
            to_ref(self.start_row, self.start_col)
        } else {
            format!(
                "{}:{}",
                to_ref(self.start_row, self.start_col),
                to_ref(self.end_row, self.end_col)
            )
        }
    }
}

impl std::fmt::Display for CellRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_a1())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_to_letters() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(702), "AAA");
        assert_eq!(col_to_letters(MAX_COL), "XFD");
    }

    #[test]
    fn test_letters_to_col() {
        assert_eq!(letters_to_col("A").unwrap(), 0);
        assert_eq!(letters_to_col("z").unwrap(), 25);
        assert_eq!(letters_to_col("aa").unwrap(), 26);
        assert_eq!(letters_to_col("XFD").unwrap(), MAX_COL);
        assert!(letters_to_col("").is_err());
        assert!(letters_to_col("A1").is_err());
    }

    #[test]
    fn test_to_ref() {
        assert_eq!(to_ref(0, 0), "A1");
        assert_eq!(to_ref(26, 26), "AA27");
        assert_eq!(to_ref(1, 1), "B2");
    }

    #[test]
    fn test_parse_ref() {
        assert_eq!(parse_ref("A1").unwrap(), (0, 0));
        assert_eq!(parse_ref("AA27").unwrap(), (26, 26));
        assert_eq!(parse_ref("$B$2").unwrap(), (1, 1));
        assert!(parse_ref("A0").is_err());
        assert!(parse_ref("1A").is_err());
        assert!(parse_ref("").is_err());
    }

    #[test]
    fn test_roundtrip_corners() {
        for &(row, col) in &[(0, 0), (MAX_ROW, MAX_COL), (999, 25), (12345, 16000)] {
            assert_eq!(parse_ref(&to_ref(row, col)).unwrap(), (row, col));
        }
    }

    #[test]
    fn test_range_parse() {
        let range = CellRange::parse("A1:F6").unwrap();
        assert_eq!(range, CellRange::new(0, 0, 5, 5).unwrap());
        assert_eq!(range.to_a1(), "A1:F6");

        let single = CellRange::parse("B2").unwrap();
        assert_eq!(single.to_a1(), "B2");

        assert!(CellRange::new(5, 0, 0, 0).is_err());
    }

    #[test]
    fn test_range_intersects() {
        let a = CellRange::new(0, 0, 3, 3).unwrap();
        let b = CellRange::new(3, 3, 6, 6).unwrap();
        let c = CellRange::new(4, 4, 8, 8).unwrap();
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(b.intersects(&c));
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_ref_roundtrip(row in 0u32..=MAX_ROW, col in 0u32..=MAX_COL) {
                prop_assert_eq!(parse_ref(&to_ref(row, col)).unwrap(), (row, col));
            }

            #[test]
            fn prop_letters_roundtrip(col in 0u32..=MAX_COL) {
                prop_assert_eq!(letters_to_col(&col_to_letters(col)).unwrap(), col);
            }
        }
    }
}
