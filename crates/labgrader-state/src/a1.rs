//! A1 notation for spreadsheet ranges.
//!
//! Columns and rows are 1-based, as in the spreadsheet UI. A range always
//! names its sheet; the rendered form quotes the sheet title so group
//! names made of digits or containing spaces stay unambiguous.

use serde::{Deserialize, Serialize};

use crate::error::A1Error;

/// Render a 1-based column index as A1 letters (`1 -> A`, `27 -> AA`).
pub fn column_letters(mut col: u32) -> Result<String, A1Error> {
    if col == 0 {
        return Err(A1Error::ZeroColumn);
    }
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    Ok(String::from_utf8(letters).unwrap_or_default())
}

/// Parse A1 column letters back into a 1-based index.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return None;
        }
        acc.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)
    })
}

/// A single cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub col: u32,
    pub row: u32,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    fn parse(s: &str, range: &str) -> Result<Self, A1Error> {
        let malformed = |reason: &str| A1Error::Malformed {
            range: range.to_string(),
            reason: reason.to_string(),
        };
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| malformed("cell reference has no row"))?;
        let (letters, digits) = s.split_at(split);
        let col = column_index(letters).ok_or_else(|| malformed("bad column letters"))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| malformed("bad row number"))?;
        if row == 0 {
            return Err(malformed("rows start at 1"));
        }
        Ok(Self { col, row })
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letters = column_letters(self.col).map_err(|_| std::fmt::Error)?;
        write!(f, "{}{}", letters, self.row)
    }
}

/// A rectangular range on one sheet, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct A1Range {
    pub sheet: String,
    pub start: CellRef,
    pub end: CellRef,
}

impl A1Range {
    /// Range covering a single cell.
    pub fn cell(sheet: &str, col: u32, row: u32) -> Self {
        let at = CellRef::new(col, row);
        Self {
            sheet: sheet.to_string(),
            start: at,
            end: at,
        }
    }

    /// Horizontal strip on `row` spanning `first_col..=last_col`.
    pub fn row_span(sheet: &str, row: u32, first_col: u32, last_col: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            start: CellRef::new(first_col, row),
            end: CellRef::new(last_col.max(first_col), row),
        }
    }

    /// Vertical strip in `col` spanning `first_row..=last_row`.
    pub fn column_span(sheet: &str, col: u32, first_row: u32, last_row: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            start: CellRef::new(col, first_row),
            end: CellRef::new(col, last_row.max(first_row)),
        }
    }

    /// Parse `Sheet!C2:AA2`, `'Group 1'!B3` and friends.
    pub fn parse(range: &str) -> Result<Self, A1Error> {
        let malformed = |reason: &str| A1Error::Malformed {
            range: range.to_string(),
            reason: reason.to_string(),
        };
        let bang = range
            .rfind('!')
            .ok_or_else(|| malformed("missing sheet separator '!'"))?;
        let (raw_sheet, cells) = (&range[..bang], &range[bang + 1..]);
        let sheet = if raw_sheet.len() >= 2 && raw_sheet.starts_with('\'') && raw_sheet.ends_with('\'')
        {
            raw_sheet[1..raw_sheet.len() - 1].replace("''", "'")
        } else {
            raw_sheet.to_string()
        };
        if sheet.is_empty() {
            return Err(malformed("empty sheet name"));
        }

        let (start, end) = match cells.split_once(':') {
            Some((a, b)) => (CellRef::parse(a, range)?, CellRef::parse(b, range)?),
            None => {
                let at = CellRef::parse(cells, range)?;
                (at, at)
            }
        };
        if end.col < start.col || end.row < start.row {
            return Err(malformed("range end precedes start"));
        }
        Ok(Self { sheet, start, end })
    }

    /// Whether this range names exactly one cell.
    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }
}

impl std::fmt::Display for A1Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}'!{}", self.sheet.replace('\'', "''"), self.start)?;
        if !self.is_single_cell() {
            write!(f, ":{}", self.end)?;
        }
        Ok(())
    }
}
