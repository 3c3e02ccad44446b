//! Names for evaluation units.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

pub const DIGEST_PREFIX: &str = "CQ_";

/// Worksheet functions a unit name must not shadow.
pub const BUILTIN_FUNCTION_NAMES: &[&str] = &[
    "ABS", "ADDRESS", "AND", "AVERAGE", "AVERAGEIF", "AVERAGEIFS", "CEILING", "CHAR", "CHOOSE",
    "CLEAN", "CODE", "COLUMN", "COLUMNS", "CONCAT", "CONCATENATE", "COUNT", "COUNTA",
    "COUNTBLANK", "COUNTIF", "COUNTIFS", "DATE", "DATEVALUE", "DAY", "DAYS", "EDATE", "EOMONTH",
    "EXACT", "EXP", "FALSE", "FILTER", "FIND", "FLOOR", "HLOOKUP", "HOUR", "IF", "IFERROR",
    "IFNA", "IFS", "INDEX", "INDIRECT", "INT", "ISBLANK", "ISERROR", "ISNUMBER", "ISTEXT",
    "LAMBDA", "LARGE", "LEFT", "LEN", "LET", "LN", "LOG", "LOG10", "LOOKUP", "LOWER", "MATCH",
    "MAX", "MAXIFS", "MEDIAN", "MID", "MIN", "MINIFS", "MINUTE", "MOD", "MODE", "MONTH", "NOT",
    "NOW", "OFFSET", "OR", "PI", "POWER", "PRODUCT", "PROPER", "RAND", "RANDBETWEEN", "RANK",
    "REPLACE", "REPT", "RIGHT", "ROUND", "ROUNDDOWN", "ROUNDUP", "ROW", "ROWS", "SEARCH",
    "SECOND", "SEQUENCE", "SIGN", "SMALL", "SORT", "SORTBY", "SQRT", "STDEV", "SUBSTITUTE",
    "SUBTOTAL", "SUM", "SUMIF", "SUMIFS", "SUMPRODUCT", "SWITCH", "TEXT", "TEXTJOIN", "TIME",
    "TODAY", "TRANSPOSE", "TRIM", "TRUE", "TRUNC", "UNIQUE", "UPPER", "VALUE", "VAR", "VLOOKUP",
    "WEEKDAY", "XLOOKUP", "XMATCH", "XOR", "YEAR",
];

fn non_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Z0-9_]").expect("unit name regex must compile"))
}

/// Reserved names, compared case-insensitively.
#[derive(Clone, Debug)]
pub struct ReservedNames {
    names: HashSet<String>,
}

impl Default for ReservedNames {
    fn default() -> Self {
        ReservedNames::with_extra::<&str>(&[])
    }
}

impl ReservedNames {
    /// Built-in function names plus `extra`.
    pub fn with_extra<S: AsRef<str>>(extra: &[S]) -> ReservedNames {
        let names = BUILTIN_FUNCTION_NAMES
            .iter()
            .map(|n| n.to_string())
            .chain(extra.iter().map(|n| n.as_ref().to_uppercase()))
            .collect();
        ReservedNames { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_uppercase())
    }
}

/// `CQ_` followed by the first 8 hex digits of the SHA-256 of `text`.
pub fn digest_name(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    format!("{}{}", DIGEST_PREFIX, &hex[..8])
}

/// Pick the unit name for `text`, honouring `preferred` when it survives
/// sanitizing.
pub fn unit_name(text: &str, preferred: Option<&str>, reserved: &ReservedNames) -> String {
    let Some(name) = preferred.map(sanitize).filter(|n| n.chars().any(|c| c != '_')) else {
        return digest_name(text);
    };
    let leading_digit = name.starts_with(|c: char| c.is_ascii_digit());
    if leading_digit || reserved.contains(&name) {
        format!("_{}", name)
    } else {
        name
    }
}

fn sanitize(name: &str) -> String {
    non_name_re()
        .replace_all(&name.trim().to_uppercase(), "")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_names_are_stable() {
        let a = digest_name("tbl.rows.count()");
        assert_eq!(a, digest_name("tbl.rows.count()"));
        assert_ne!(a, digest_name("tbl.rows.count() "));
        assert!(a.starts_with("CQ_"));
        assert_eq!(a.len(), 11);
        assert!(a[3..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn preferred_names_are_sanitized() {
        let reserved = ReservedNames::default();
        assert_eq!(unit_name("x", Some("adults over-30"), &reserved), "ADULTSOVER30");
        assert_eq!(unit_name("x", Some("9lives"), &reserved), "_9LIVES");
        assert_eq!(unit_name("x", Some("sum"), &reserved), "_SUM");
        assert_eq!(unit_name("x", Some("!!!"), &reserved), digest_name("x"));
        assert_eq!(unit_name("x", Some("__"), &reserved), digest_name("x"));
        assert_eq!(unit_name("x", None, &reserved), digest_name("x"));
    }

    #[test]
    fn configured_names_are_reserved_case_insensitively() {
        let reserved = ReservedNames::with_extra(&["Report"]);
        assert_eq!(unit_name("x", Some("report"), &reserved), "_REPORT");
        assert!(reserved.contains("vlookup"));
    }
}
