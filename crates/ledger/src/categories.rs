//! Fixed category vocabularies per transaction kind.
//!
//! The vocabulary is advisory: forms offer it, the ledger stores whatever
//! non-empty category it is given.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::TransactionKind;

pub const EXPENSE_CATEGORIES: [&str; 6] =
    ["Food", "Transport", "Bills", "Shopping", "Health", "Other"];

pub const INVESTMENT_CATEGORIES: [&str; 6] = [
    "Stocks",
    "Crypto",
    "Mutual Funds",
    "Real Estate",
    "Bonds",
    "Other",
];

pub fn categories_for(kind: TransactionKind) -> &'static [&'static str] {
    match kind {
        TransactionKind::Expense => &EXPENSE_CATEGORIES,
        TransactionKind::Investment => &INVESTMENT_CATEGORIES,
    }
}

/// Match free-form input against the vocabulary of `kind`.
///
/// Case, accents, punctuation and spacing are ignored, so `"mutual  funds"`
/// and `"Mútual-Funds"` both resolve to `"Mutual Funds"`.
pub fn canonical_category(kind: TransactionKind, input: &str) -> Option<&'static str> {
    let key = normalize_key(input)?;
    categories_for(kind)
        .iter()
        .copied()
        .find(|candidate| normalize_key(candidate).as_deref() == Some(key.as_str()))
}

fn normalize_key(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut out = String::new();
    let mut prev_space = false;
    for ch in trimmed.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }

    let out = out.trim_end().to_string();
    if out.is_empty() { None } else { Some(out) }
}
