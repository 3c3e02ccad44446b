//! Absolute cell addresses.
//!
//! Converts between spreadsheet notation (`B3`, `$B$3`, `Sheet1!$AA$10`) and
//! the 1-based row/column pairs carried by [`Origin`](super::Origin) and
//! [`CellSnapshot`](super::CellSnapshot).
//!
//! # Examples
//!
//! ```ignore
//! let cell = CellRef::parse("$B$3").unwrap();
//! assert_eq!((cell.row, cell.col), (3, 2));
//! assert_eq!(cell.to_string(), "$B$3");
//! ```

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A 1-based absolute cell position.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

fn a1_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$?(?<letters>[A-Za-z]+)\$?(?<numbers>[0-9]+)$")
            .expect("A1 reference regex must compile")
    })
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> CellRef {
        CellRef { row, col }
    }

    /// Parse `B3` or `$B$3`. Returns None for malformed or zero positions.
    pub fn parse(name: &str) -> Option<CellRef> {
        let caps = a1_re().captures(name.trim())?;

        let mut col = 0usize;
        for c in caps["letters"].to_ascii_uppercase().bytes() {
            let digit = (c - b'A') as usize + 1;
            col = col.checked_mul(26)?.checked_add(digit)?;
        }
        let row = caps["numbers"].parse::<usize>().ok()?;
        if row == 0 {
            return None;
        }

        Some(CellRef::new(row, col))
    }

    /// Column number to letters (1 -> A, 26 -> Z, 27 -> AA).
    pub fn col_to_letters(col: usize) -> String {
        let mut result = String::new();
        let mut n = col as u128;
        while n > 0 {
            n -= 1;
            result.insert(0, (b'A' + (n % 26) as u8) as char);
            n /= 26;
        }
        result
    }

    /// Address qualified with a sheet name, quoting names that need it.
    pub fn qualified(&self, sheet: &str) -> String {
        let needs_quotes = sheet
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '_'));
        if needs_quotes {
            format!("'{}'!{}", sheet.replace('\'', "''"), self)
        } else {
            format!("{}!{}", sheet, self)
        }
    }
}

impl std::str::FromStr for CellRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellRef::parse(s).ok_or_else(|| format!("Invalid cell reference: {}", s))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}${}", CellRef::col_to_letters(self.col), self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::CellRef;

    #[test]
    fn parses_relative_and_absolute_forms() {
        assert_eq!(CellRef::parse("B3"), Some(CellRef::new(3, 2)));
        assert_eq!(CellRef::parse("$AA$10"), Some(CellRef::new(10, 27)));
        assert_eq!(CellRef::parse("a1"), Some(CellRef::new(1, 1)));
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert!(CellRef::parse("").is_none());
        assert!(CellRef::parse("A0").is_none());
        assert!(CellRef::parse("1A").is_none());
        assert!(CellRef::parse(&format!("{}1", "Z".repeat(40))).is_none());
    }

    #[test]
    fn qualified_quotes_sheet_names_with_spaces() {
        let cell = CellRef::new(2, 3);
        assert_eq!(cell.qualified("S1"), "S1!$C$2");
        assert_eq!(cell.qualified("My Sheet"), "'My Sheet'!$C$2");
    }
}
