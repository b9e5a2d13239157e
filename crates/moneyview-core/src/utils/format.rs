use std::cmp::Ordering;

/// Case-insensitive substring test. An empty needle always matches.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Case-insensitive ordering, falling back to the exact ordering on ties
/// so that "a" and "A" still compare deterministically.
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Leading whitespace for a tree row at `depth`.
pub fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
