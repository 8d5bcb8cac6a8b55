use regex::Regex;
use std::sync::LazyLock;

// ASCII digits only: `\d` would also match other scripts' digits, which
// `u64::from_str` rejects.
static FIRST_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

/// Sort key for an episode name: the first run of decimal digits, or zero.
///
/// Runs too long for a `u64` saturate, so they still sort after every
/// representable number.
///
/// ```
/// use toonshelf_library::extract_number;
///
/// assert_eq!(extract_number("Episode 12 - Finale"), 12);
/// assert_eq!(extract_number("Prologue"), 0);
/// ```
pub fn extract_number(name: &str) -> u64 {
    FIRST_NUMBER.find(name).map_or(0, |found| found.as_str().parse().unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Episode 1", 1)]
    #[case("Episode 10", 10)]
    #[case("Ch.003", 3)]
    #[case("v2 ch15", 2)]
    #[case("Prologue", 0)]
    #[case("", 0)]
    #[case("007.cbz", 7)]
    #[case("Episode ٣", 0)]
    #[case("99999999999999999999999", u64::MAX)]
    fn test_extract_number(#[case] name: &str, #[case] expected: u64) {
        assert_eq!(extract_number(name), expected);
    }

    #[test]
    fn test_sorts_numerically() {
        let mut names = vec!["Episode 10", "Episode 2", "Episode 1"];
        names.sort_by_key(|name| extract_number(name));
        assert_eq!(names, ["Episode 1", "Episode 2", "Episode 10"]);
    }
}
