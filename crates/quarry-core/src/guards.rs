//! Shared guardrails for query payload bounds and traversal limits.

pub const MAX_QUERY_LENGTH: usize = 512;
pub const MAX_RESULT_LIMIT: usize = 100;
pub const MAX_EXPANSION_HOPS: usize = 4;
pub const MAX_EXPANDED_PER_SEED: usize = 32;
pub const MAX_CONTEXT_FRAGMENTS: usize = 32;

pub fn clamp_limit(value: usize, maximum: usize) -> usize {
    value.clamp(1, maximum)
}

pub fn clamp_hops(value: usize) -> usize {
    value.clamp(1, MAX_EXPANSION_HOPS)
}

/// Trim and bound a query string to `MAX_QUERY_LENGTH`, never splitting a
/// character in the middle.
pub fn truncate_query(query: &str) -> String {
    let stripped = query.trim();
    if stripped.len() <= MAX_QUERY_LENGTH {
        return stripped.to_string();
    }
    let mut cut = MAX_QUERY_LENGTH;
    while cut > 0 && !stripped.is_char_boundary(cut) {
        cut -= 1;
    }
    stripped[..cut].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit_bounds() {
        assert_eq!(clamp_limit(0, 100), 1);
        assert_eq!(clamp_limit(50, 100), 50);
        assert_eq!(clamp_limit(500, 100), 100);
    }

    #[test]
    fn test_clamp_hops() {
        assert_eq!(clamp_hops(0), 1);
        assert_eq!(clamp_hops(2), 2);
        assert_eq!(clamp_hops(99), MAX_EXPANSION_HOPS);
    }

    #[test]
    fn test_truncate_query_short() {
        assert_eq!(truncate_query("  hello  "), "hello");
    }

    #[test]
    fn test_truncate_query_long() {
        let long = "x".repeat(2 * MAX_QUERY_LENGTH);
        assert_eq!(truncate_query(&long).len(), MAX_QUERY_LENGTH);
    }

    #[test]
    fn test_truncate_query_multibyte_boundary() {
        let long = "é".repeat(MAX_QUERY_LENGTH);
        let truncated = truncate_query(&long);
        assert!(truncated.len() <= MAX_QUERY_LENGTH);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
