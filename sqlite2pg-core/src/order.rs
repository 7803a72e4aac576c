//! Table order resolution.
//!
//! Parent tables must be copied before the child tables whose foreign keys
//! reference them. The preferred order is supplied by the caller; tables it
//! does not mention are appended in source catalog order.

use std::collections::HashSet;

/// Parent-before-child order of the school social-network schema.
pub const DEFAULT_TABLE_ORDER: &[&str] = &[
    "users",
    "conversations",
    "conversation_participants",
    "messages",
    "posts",
    "likes",
    "comments",
    "notifications",
    "post_attachments",
    "clubs",
    "club_members",
    "calendar_events",
    "sessions",
];

/// Returns [`DEFAULT_TABLE_ORDER`] as owned names.
pub fn default_table_order() -> Vec<String> {
    DEFAULT_TABLE_ORDER.iter().map(|t| t.to_string()).collect()
}

/// Produces a total order over `source_tables`.
///
/// Preferred tables present in the source come first, in preferred order;
/// preferred entries missing from the source are ignored. Every other source
/// table follows in the order the source reported it. Each table appears once.
///
/// # Example
/// ```rust
/// use sqlite2pg_core::order::resolve_order;
///
/// let source = ["comments", "posts", "extra", "users"].map(String::from);
/// let preferred = ["users", "posts", "comments"].map(String::from);
///
/// assert_eq!(
///     resolve_order(&source, &preferred),
///     vec!["users", "posts", "comments", "extra"]
/// );
/// ```
pub fn resolve_order(source_tables: &[String], preferred: &[String]) -> Vec<String> {
    let present: HashSet<&str> = source_tables.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(source_tables.len());
    let mut order = Vec::with_capacity(source_tables.len());

    for table in preferred {
        if present.contains(table.as_str()) && seen.insert(table.as_str()) {
            order.push(table.clone());
        }
    }

    for table in source_tables {
        if seen.insert(table.as_str()) {
            order.push(table.clone());
        }
    }

    order
}

/// Parses a comma-separated table list such as `users,posts,comments`.
///
/// Whitespace around names is trimmed and empty entries are dropped.
pub fn parse_table_order(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
