// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement classification from SQL text

use once_cell::sync::Lazy;
use regex::Regex;

/// Leading keyword, skipping whitespace, line comments and block comments
static LEADING_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\s+|--[^\n]*(?:\n|$)|/\*(?s:.*?)\*/)*([A-Za-z]+)")
        .expect("leading keyword pattern is valid")
});

/// Data-modifying verb anywhere in the statement, for `WITH ... INSERT` forms
static MODIFYING_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:insert|update|delete|replace)\b").expect("modifying verb pattern is valid")
});

const READ_KEYWORDS: &[&str] = &["select", "with", "show", "explain", "describe", "desc", "pragma", "values"];

/// Whether a statement only reads
///
/// Reads are dropped by the shutdown drain; writes are still executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Read,
    Write,
}

impl QueryKind {
    /// Classify by the first keyword; anything unrecognised counts as a write
    pub fn classify(sql: &str) -> Self {
        match leading_keyword(sql).as_deref() {
            Some("with") if MODIFYING_VERB.is_match(sql) => QueryKind::Write,
            Some(keyword) if READ_KEYWORDS.contains(&keyword) => QueryKind::Read,
            _ => QueryKind::Write,
        }
    }

    pub fn is_read(self) -> bool {
        self == QueryKind::Read
    }
}

/// First SQL keyword, lowercased
pub fn leading_keyword(sql: &str) -> Option<String> {
    LEADING_KEYWORD
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Number of positional placeholders in `sql`
///
/// Counts bare `?` outside quoted text. Numbered `?NNN` placeholders
/// contribute their highest number instead.
pub fn placeholder_count(sql: &str) -> usize {
    let mut bare = 0usize;
    let mut numbered = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                        digits.push(*d);
                        chars.next();
                    }
                    match digits.parse::<usize>() {
                        Ok(n) => numbered = numbered.max(n),
                        Err(_) => bare += 1,
                    }
                }
                _ => {}
            },
        }
    }
    bare.max(numbered)
}
