//! The `search_keys` filter grammar.

use crate::error::{QueryError, Result};

/// Parse a `k1:v1,k2:v2` equality-filter list.
///
/// Each comma-separated pair must contain exactly one colon; keys and values
/// are trimmed. Any malformed pair rejects the whole filter — a partial
/// parse would silently drop constraints and widen the result set.
pub fn parse_search_keys(raw: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for pair in raw.split(',') {
        let mut parts = pair.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                pairs.push((key.trim().to_string(), value.trim().to_string()));
            }
            _ => {
                return Err(QueryError::InvalidFilter(format!(
                    "invalid key-value pair: {pair}"
                )));
            }
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_trims() {
        let pairs = parse_search_keys("user:u1, region : eu").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("user".to_string(), "u1".to_string()),
                ("region".to_string(), "eu".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_pair_without_colon() {
        let err = parse_search_keys("a-b-c").unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
    }

    #[test]
    fn rejects_pair_with_two_colons() {
        let err = parse_search_keys("a:b:c").unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
    }

    #[test]
    fn one_bad_pair_rejects_the_whole_filter() {
        let err = parse_search_keys("user:u1,broken").unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
    }

    #[test]
    fn allows_empty_values() {
        let pairs = parse_search_keys("flag:").unwrap();
        assert_eq!(pairs, vec![("flag".to_string(), String::new())]);
    }
}
