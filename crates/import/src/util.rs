/// Case-fold, trim, and collapse internal whitespace to single spaces.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `needle` occurs in `haystack` bounded on both sides by a
/// non-alphanumeric character or a string edge. Both inputs must already be
/// normalized.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(offset) = haystack[from..].find(needle) {
        let start = from + offset;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        // Advance one character so overlapping occurrences are still tried.
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  WOOLWORTHS   123\tCAPE Town "), "woolworths 123 cape town");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn word_boundaries_are_respected() {
        assert!(!contains_word("city parking garage", "park"));
        assert!(contains_word("city parking garage", "parking"));
        assert!(contains_word("park", "park"));
        assert!(contains_word("pos*spar-4421", "spar"));
    }

    #[test]
    fn multi_word_needles() {
        assert!(contains_word("pick n pay hyper", "pick n pay"));
        assert!(!contains_word("pick n payroll", "pick n pay"));
    }

    #[test]
    fn later_occurrence_can_match() {
        assert!(contains_word("sparkle spar", "spar"));
        assert!(!contains_word("sparkle", "spar"));
    }

    #[test]
    fn empty_needle_never_matches() {
        assert!(!contains_word("anything", ""));
    }
}
