//! Choosing the two sheets to reconcile.
//!
//! Sheets are classified by name: purchase books (the base side), GSTR-2B and
//! GSTR-3B. When no sheet is named explicitly, the preferred pairs are
//! Books/2B, then Books/3B, then 3B/2B, and finally a workbook with exactly
//! two sheets.

use std::fmt;

use crate::error::IoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Books,
    Gstr2b,
    Gstr3b,
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Books => write!(f, "books"),
            Self::Gstr2b => write!(f, "GSTR-2B"),
            Self::Gstr3b => write!(f, "GSTR-3B"),
        }
    }
}

const BOOKS_KEYWORDS: &[&str] = &["book", "purchase", "ledger", "register"];

/// Classify a sheet by its name.
pub fn classify_sheet(name: &str) -> Option<SheetKind> {
    let lower = name.to_lowercase();
    // "pr" only as a separate word, so "Apr" or "Summary Pre" stay unclassified
    let is_pr_token = lower.split(|c: char| !c.is_alphanumeric()).any(|t| t == "pr");
    if BOOKS_KEYWORDS.iter().any(|k| lower.contains(k)) || is_pr_token {
        Some(SheetKind::Books)
    } else if lower.contains("2b") {
        Some(SheetKind::Gstr2b)
    } else if lower.contains("3b") {
        Some(SheetKind::Gstr3b)
    } else {
        None
    }
}

/// The two sheets chosen for a run: `a` is the base side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPair {
    pub a: String,
    pub b: String,
}

/// Pick the sheet pair from a workbook's sheet names. Explicit names win;
/// a single explicit name is completed from the remaining sheets.
pub fn detect_pair(names: &[String], a: Option<&str>, b: Option<&str>) -> Result<SheetPair, IoError> {
    for name in [a, b].into_iter().flatten() {
        if !names.iter().any(|n| n == name) {
            return Err(IoError::UnknownSheet { name: name.to_string(), available: names.to_vec() });
        }
    }

    let pair = match (a, b) {
        (Some(a), Some(b)) => SheetPair { a: a.to_string(), b: b.to_string() },
        (Some(a), None) => {
            let b = complete(names, a, &[SheetKind::Gstr2b, SheetKind::Gstr3b])
                .ok_or_else(|| ambiguous(names, "side B"))?;
            SheetPair { a: a.to_string(), b }
        }
        (None, Some(b)) => {
            let a = complete(names, b, &[SheetKind::Books, SheetKind::Gstr3b])
                .ok_or_else(|| ambiguous(names, "side A"))?;
            SheetPair { a, b: b.to_string() }
        }
        (None, None) => auto_pair(names).ok_or_else(|| ambiguous(names, "the sheet pair"))?,
    };

    if pair.a == pair.b {
        return Err(IoError::SheetPair(format!(
            "side A and side B must be different sheets (both are '{}')",
            pair.a
        )));
    }
    Ok(pair)
}

/// Pick one sheet from a workbook that supplies a single side (two-file
/// mode): the explicit name, else the first sheet of a preferred kind, else
/// the first sheet.
pub fn pick_sheet(names: &[String], explicit: Option<&str>, preferred: &[SheetKind]) -> Result<String, IoError> {
    if let Some(name) = explicit {
        return if names.iter().any(|n| n == name) {
            Ok(name.to_string())
        } else {
            Err(IoError::UnknownSheet { name: name.to_string(), available: names.to_vec() })
        };
    }
    preferred
        .iter()
        .find_map(|kind| first_of(names, *kind))
        .or_else(|| names.first())
        .cloned()
        .ok_or_else(|| IoError::SheetPair("workbook has no sheets".into()))
}

fn first_of(names: &[String], kind: SheetKind) -> Option<&String> {
    names.iter().find(|n| classify_sheet(n) == Some(kind))
}

fn auto_pair(names: &[String]) -> Option<SheetPair> {
    let preferred = [
        (SheetKind::Books, SheetKind::Gstr2b),
        (SheetKind::Books, SheetKind::Gstr3b),
        (SheetKind::Gstr3b, SheetKind::Gstr2b),
    ];
    for (kind_a, kind_b) in preferred {
        if let (Some(a), Some(b)) = (first_of(names, kind_a), first_of(names, kind_b)) {
            return Some(SheetPair { a: a.clone(), b: b.clone() });
        }
    }
    match names {
        [a, b] => Some(SheetPair { a: a.clone(), b: b.clone() }),
        _ => None,
    }
}

/// Counterpart for an explicitly named sheet: the first sheet of a preferred
/// kind, else the only other sheet.
fn complete(names: &[String], given: &str, kinds: &[SheetKind]) -> Option<String> {
    let others: Vec<&String> = names.iter().filter(|n| n.as_str() != given).collect();
    for kind in kinds {
        if let Some(found) = others.iter().find(|n| classify_sheet(n) == Some(*kind)) {
            return Some((*found).clone());
        }
    }
    match others.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    }
}

fn ambiguous(names: &[String], what: &str) -> IoError {
    IoError::SheetPair(format!(
        "could not auto-detect {what}; name the sheets explicitly (available: {})",
        names.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classification() {
        assert_eq!(classify_sheet("Purchase Register"), Some(SheetKind::Books));
        assert_eq!(classify_sheet("Books FY24"), Some(SheetKind::Books));
        assert_eq!(classify_sheet("PR"), Some(SheetKind::Books));
        assert_eq!(classify_sheet("PR-Apr"), Some(SheetKind::Books));
        assert_eq!(classify_sheet("GSTR-2B"), Some(SheetKind::Gstr2b));
        assert_eq!(classify_sheet("gstr2b apr"), Some(SheetKind::Gstr2b));
        assert_eq!(classify_sheet("GSTR 3B"), Some(SheetKind::Gstr3b));
        assert_eq!(classify_sheet("Summary"), None);
        assert_eq!(classify_sheet("Apr"), None);
    }

    #[test]
    fn books_and_2b_preferred() {
        let pair = detect_pair(&names(&["GSTR-3B", "Notes", "GSTR-2B", "Purchase Register"]), None, None).unwrap();
        assert_eq!(pair, SheetPair { a: "Purchase Register".into(), b: "GSTR-2B".into() });
    }

    #[test]
    fn books_and_3b_then_3b_and_2b() {
        let pair = detect_pair(&names(&["GSTR-3B", "Ledger"]), None, None).unwrap();
        assert_eq!(pair.a, "Ledger");
        assert_eq!(pair.b, "GSTR-3B");

        let pair = detect_pair(&names(&["GSTR-2B", "GSTR-3B", "Notes"]), None, None).unwrap();
        assert_eq!(pair.a, "GSTR-3B");
        assert_eq!(pair.b, "GSTR-2B");
    }

    #[test]
    fn two_unclassified_sheets_in_order() {
        let pair = detect_pair(&names(&["Sheet1", "Sheet2"]), None, None).unwrap();
        assert_eq!(pair, SheetPair { a: "Sheet1".into(), b: "Sheet2".into() });
    }

    #[test]
    fn undetectable() {
        let err = detect_pair(&names(&["One", "Two", "Three"]), None, None).unwrap_err();
        assert!(err.to_string().contains("One, Two, Three"));
        assert!(detect_pair(&names(&["Only"]), None, None).is_err());
    }

    #[test]
    fn explicit_names() {
        let list = names(&["Mine", "Theirs", "Other"]);
        let pair = detect_pair(&list, Some("Theirs"), Some("Mine")).unwrap();
        assert_eq!(pair, SheetPair { a: "Theirs".into(), b: "Mine".into() });

        let err = detect_pair(&list, Some("Mine"), Some("Mine")).unwrap_err();
        assert!(err.to_string().contains("must be different"));

        let err = detect_pair(&list, Some("Missing"), None).unwrap_err();
        assert!(matches!(err, IoError::UnknownSheet { .. }));
    }

    #[test]
    fn one_explicit_name_is_completed() {
        let list = names(&["My Books", "GSTR-2B", "GSTR-3B"]);
        let pair = detect_pair(&list, Some("My Books"), None).unwrap();
        assert_eq!(pair.b, "GSTR-2B");

        let pair = detect_pair(&list, None, Some("GSTR-3B")).unwrap();
        assert_eq!(pair.a, "My Books");

        let pair = detect_pair(&names(&["X", "Y"]), None, Some("X")).unwrap();
        assert_eq!(pair.a, "Y");

        assert!(detect_pair(&names(&["X", "Y", "Z"]), Some("X"), None).is_err());
    }

    #[test]
    fn single_sheet_for_one_side() {
        let list = names(&["Notes", "GSTR-3B", "GSTR-2B"]);
        assert_eq!(pick_sheet(&list, None, &[SheetKind::Gstr2b, SheetKind::Gstr3b]).unwrap(), "GSTR-2B");
        assert_eq!(pick_sheet(&list, None, &[SheetKind::Books]).unwrap(), "Notes");
        assert_eq!(pick_sheet(&list, Some("GSTR-3B"), &[SheetKind::Gstr2b]).unwrap(), "GSTR-3B");
        assert!(matches!(
            pick_sheet(&list, Some("Books"), &[]).unwrap_err(),
            IoError::UnknownSheet { .. }
        ));
        assert!(pick_sheet(&[], None, &[SheetKind::Books]).is_err());
    }
}
