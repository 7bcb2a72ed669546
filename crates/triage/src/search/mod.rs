//! Gmail search-string handling
//!
//! Converts free-text Gmail queries (`from:`, `is:unread`, `label:`, ...) into
//! a structured [`ParsedFilter`] and back.

mod query_parser;

pub use query_parser::{DEFAULT_MAX_EMAILS, ParsedFilter, TypedFilter, parse_search, to_query};

/// Rewrite a query into its canonical operator order
///
/// # Example
/// ```
/// let canonical = triage::search::canonicalize("report from:alice -spam is:unread");
/// assert_eq!(canonical, "from:alice is:unread report -spam");
/// ```
pub fn canonicalize(query: &str) -> String {
    to_query(&parse_search(query))
}
