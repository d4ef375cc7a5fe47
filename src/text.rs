//! Shared text normalization helpers.

/// Collapse all whitespace runs to single spaces and trim the ends.
pub fn clean(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_collapses_whitespace() {
        assert_eq!(clean("  a \t b\n c  "), "a b c");
        assert_eq!(clean(""), "");
        assert_eq!(clean("\n\t "), "");
    }
}
