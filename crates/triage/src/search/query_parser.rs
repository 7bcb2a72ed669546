//! Gmail-style query parser
//!
//! Parses search queries with operators like:
//! - `from:john@example.com`, `to:team@company.com`, `subject:meeting`
//! - `is:unread`, `is:starred`, `is:important` - boolean filters
//! - `has:attachment` - attachment filter
//! - `label:work`, `category:promotions`
//! - `older_than:7d`, `newer_than:1d` - relative date filters
//! - `larger:5M`, `smaller:100K` - size filters
//! - `filename:pdf`
//! - `-term` - exclusion
//!
//! The whole query is lower-cased before matching, so free-text keywords lose
//! their original case. `OR` is accepted but does not group anything.

use serde::{Deserialize, Serialize};

/// Number of emails a freshly parsed filter asks for
pub const DEFAULT_MAX_EMAILS: usize = 10;

/// An operator filter that keeps its operator name, e.g. `older_than:7d`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedFilter {
    /// Operator name without the colon (`older_than`, `larger`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw operator value, not validated
    pub value: String,
}

impl TypedFilter {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// Structured form of a Gmail search string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFilter {
    /// How many emails the caller wants fetched
    pub max_emails: usize,
    /// The query exactly as it was given
    pub raw_query: String,
    /// from: value (last occurrence wins)
    pub from_sender: String,
    /// to: value (last occurrence wins)
    pub to_recipient: String,
    /// subject: value (last occurrence wins)
    pub subject_filter: String,
    /// Free-text terms, space-joined
    pub keyword: String,
    pub unread_only: bool,
    pub starred_only: bool,
    pub important_only: bool,
    pub has_attachment: bool,
    pub labels: Vec<String>,
    pub categories: Vec<String>,
    /// older_than: / newer_than:
    pub date_filters: Vec<TypedFilter>,
    /// larger: / smaller:
    pub size_filters: Vec<TypedFilter>,
    pub filename_filters: Vec<String>,
    /// Terms given with a leading `-`
    pub exclude_terms: Vec<String>,
}

impl Default for ParsedFilter {
    fn default() -> Self {
        Self {
            max_emails: DEFAULT_MAX_EMAILS,
            raw_query: String::new(),
            from_sender: String::new(),
            to_recipient: String::new(),
            subject_filter: String::new(),
            keyword: String::new(),
            unread_only: false,
            starred_only: false,
            important_only: false,
            has_attachment: false,
            labels: Vec::new(),
            categories: Vec::new(),
            date_filters: Vec::new(),
            size_filters: Vec::new(),
            filename_filters: Vec::new(),
            exclude_terms: Vec::new(),
        }
    }
}

impl ParsedFilter {
    /// Override the number of emails to fetch
    pub fn with_max_emails(mut self, max_emails: usize) -> Self {
        self.max_emails = max_emails;
        self
    }

    /// Check if the filter has no criteria at all
    pub fn is_empty(&self) -> bool {
        self.same_criteria(&ParsedFilter::default())
    }

    /// Compare search criteria, ignoring `raw_query` and `max_emails`
    ///
    /// Two filters with the same criteria select the same emails even when
    /// they were parsed from textually different queries.
    pub fn same_criteria(&self, other: &ParsedFilter) -> bool {
        self.from_sender == other.from_sender
            && self.to_recipient == other.to_recipient
            && self.subject_filter == other.subject_filter
            && self.keyword == other.keyword
            && self.unread_only == other.unread_only
            && self.starred_only == other.starred_only
            && self.important_only == other.important_only
            && self.has_attachment == other.has_attachment
            && self.labels == other.labels
            && self.categories == other.categories
            && self.date_filters == other.date_filters
            && self.size_filters == other.size_filters
            && self.filename_filters == other.filename_filters
            && self.exclude_terms == other.exclude_terms
    }
}

/// Parse a Gmail search string into a [`ParsedFilter`]
///
/// Never fails: unknown operators are dropped and operator values are stored
/// as-is without validation.
pub fn parse_search(query: &str) -> ParsedFilter {
    let mut filter = ParsedFilter {
        raw_query: query.to_string(),
        ..ParsedFilter::default()
    };

    if query.is_empty() {
        return filter;
    }

    let tokens = tokenize(&query.to_lowercase());
    let mut keywords: Vec<&str> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if let Some(term) = token.strip_prefix('-') {
            push_unique(&mut filter.exclude_terms, term.to_string());
        } else if let Some((operator, value)) = token.split_once(':') {
            apply_operator(&mut filter, operator, value);
        } else if token.eq_ignore_ascii_case("or") && i > 0 && i + 1 < tokens.len() {
            // OR between two terms: accepted, no grouping
        } else {
            keywords.push(strip_quotes(token));
        }
    }

    filter.keyword = keywords.join(" ").trim().to_string();
    filter
}

/// Serialize a filter back into a Gmail search string
///
/// Emits operators in a fixed order, so the output is canonical rather than a
/// copy of the original query.
pub fn to_query(filter: &ParsedFilter) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !filter.from_sender.is_empty() {
        parts.push(format!("from:{}", filter.from_sender));
    }
    if !filter.to_recipient.is_empty() {
        parts.push(format!("to:{}", filter.to_recipient));
    }
    if !filter.subject_filter.is_empty() {
        parts.push(format!("subject:{}", filter.subject_filter));
    }
    if filter.unread_only {
        parts.push("is:unread".to_string());
    }
    if filter.starred_only {
        parts.push("is:starred".to_string());
    }
    if filter.important_only {
        parts.push("is:important".to_string());
    }
    if filter.has_attachment {
        parts.push("has:attachment".to_string());
    }

    parts.extend(filter.labels.iter().map(|l| format!("label:{l}")));
    parts.extend(filter.categories.iter().map(|c| format!("category:{c}")));
    parts.extend(
        filter
            .date_filters
            .iter()
            .chain(filter.size_filters.iter())
            .map(|f| format!("{}:{}", f.kind, f.value)),
    );
    parts.extend(filter.filename_filters.iter().map(|f| format!("filename:{f}")));

    if !filter.keyword.is_empty() {
        parts.push(quote_keyword(&filter.keyword));
    }

    parts.extend(filter.exclude_terms.iter().map(|t| format!("-{t}")));

    parts.join(" ")
}

/// Quote a keyword blob that would otherwise reparse as something else
///
/// Whitespace would let inner `or` or `-word` tokens act as operators, and a
/// lone `or` or leading `-` would too. Blobs containing `"` or `:` are left
/// alone since quoting cannot protect them.
fn quote_keyword(keyword: &str) -> String {
    let ambiguous = keyword.contains(char::is_whitespace)
        || keyword.starts_with('-')
        || keyword == "or";
    if ambiguous && !keyword.contains(['"', ':']) {
        format!("\"{keyword}\"")
    } else {
        keyword.to_string()
    }
}

fn apply_operator(filter: &mut ParsedFilter, operator: &str, value: &str) {
    match operator {
        "from" => filter.from_sender = value.to_string(),
        "to" => filter.to_recipient = value.to_string(),
        "subject" => filter.subject_filter = value.to_string(),
        "is" => match value {
            "unread" => filter.unread_only = true,
            "starred" => filter.starred_only = true,
            "important" => filter.important_only = true,
            _ => {}
        },
        "has" => {
            if value == "attachment" {
                filter.has_attachment = true;
            }
        }
        "label" => push_unique(&mut filter.labels, value.to_string()),
        "category" => push_unique(&mut filter.categories, value.to_string()),
        "older_than" | "newer_than" => {
            push_unique(&mut filter.date_filters, TypedFilter::new(operator, value))
        }
        "larger" | "smaller" => {
            push_unique(&mut filter.size_filters, TypedFilter::new(operator, value))
        }
        "filename" => push_unique(&mut filter.filename_filters, value.to_string()),
        _ => {}
    }
}

/// Split on whitespace, keeping `"double quoted"` runs together
///
/// A quote only opens a phrase when a closing quote follows; otherwise it is
/// part of an ordinary word.
fn tokenize(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        if chars[i] == '"' {
            if let Some(len) = chars[i + 1..].iter().position(|&c| c == '"') {
                let end = i + 1 + len;
                tokens.push(chars[i..=end].iter().collect());
                i = end + 1;
                continue;
            }
        }

        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        tokens.push(chars[start..i].iter().collect());
    }

    tokens
}

fn strip_quotes(token: &str) -> &str {
    if token.starts_with('"') && token.ends_with('"') {
        if token.len() < 2 {
            return "";
        }
        return &token[1..token.len() - 1];
    }
    token
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}
