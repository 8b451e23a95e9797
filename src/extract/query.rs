// src/extract/query.rs

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::Dependencies;

pub(crate) static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid"));

/// Placeholder names in order of first appearance, without duplicates.
pub fn placeholders(query: &str) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    PLACEHOLDER
        .captures_iter(query)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| seen.insert(*name))
        .collect()
}

/// Every distinct placeholder is a read. Query cells never write.
pub fn extract_query(query: &str) -> Dependencies {
    Dependencies {
        reads: placeholders(query).into_iter().map(str::to_string).collect(),
        writes: BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_reads() {
        let deps = extract_query("SELECT * FROM users WHERE id = {user_id} AND org = {org}");
        assert_eq!(
            deps.reads.into_iter().collect::<Vec<_>>(),
            vec!["org".to_string(), "user_id".to_string()]
        );
        assert!(deps.writes.is_empty());
    }

    #[test]
    fn duplicates_collapse_and_order_follows_first_use() {
        assert_eq!(placeholders("{b} {a} {b}"), vec!["b", "a"]);
    }

    #[test]
    fn non_identifiers_are_ignored() {
        assert!(placeholders("SELECT '{1abc}', '{ x }', '{}'").is_empty());
    }
}
