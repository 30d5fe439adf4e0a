//! Breadcrumb query parsing: browse, enter a folder, or back out

/// Parsed form of one raw query string.
///
/// At most one of `folder_selector` being set or `backed_up` being true
/// holds per parse; both absent means a flat browse/filter of the folder
/// list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigatorResult {
    pub folder_selector: Option<String>,
    pub residual_query: String,
    pub backed_up: bool,
}

/// Split a raw query on the navigation delimiter.
///
/// A delimiter at the very end of the raw (untrimmed) input means "back out
/// one level" and takes precedence over any interior delimiter. Otherwise
/// the first interior delimiter splits the query into folder selector and
/// residual query; without a delimiter the whole trimmed query filters the
/// folder list.
///
/// Any string is valid input. The delimiter is reserved; a folder name that
/// contains it is an accepted limitation, not handled defensively.
pub fn parse(raw_query: &str, delimiter: char) -> NavigatorResult {
    if raw_query.ends_with(delimiter) {
        return NavigatorResult {
            folder_selector: None,
            residual_query: String::new(),
            backed_up: true,
        };
    }

    match raw_query.find(delimiter) {
        Some(i) => NavigatorResult {
            folder_selector: Some(raw_query[..i].trim().to_string()),
            residual_query: raw_query[i + delimiter.len_utf8()..].trim().to_string(),
            backed_up: false,
        },
        None => NavigatorResult {
            folder_selector: None,
            residual_query: raw_query.trim().to_string(),
            backed_up: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELIM: char = '⟩';

    #[test]
    fn trailing_delimiter_backs_up() {
        let result = parse("Projects ⟩ invoice ⟩", DELIM);
        assert!(result.backed_up);
        assert_eq!(result.folder_selector, None);
        assert_eq!(result.residual_query, "");
    }

    #[test]
    fn bare_delimiter_backs_up() {
        assert!(parse("⟩", DELIM).backed_up);
    }

    #[test]
    fn trailing_delimiter_wins_over_interior_delimiter() {
        // The back-out rule applies regardless of any other content.
        assert!(parse("a ⟩ b ⟩", DELIM).backed_up);
    }

    #[test]
    fn delimiter_with_trailing_space_selects_folder() {
        let result = parse("Projects ⟩ ", DELIM);
        assert!(!result.backed_up);
        assert_eq!(result.folder_selector.as_deref(), Some("Projects"));
        assert_eq!(result.residual_query, "");
    }

    #[test]
    fn interior_delimiter_splits_selector_and_residual() {
        let result = parse("Projects ⟩ invoice", DELIM);
        assert_eq!(result.folder_selector.as_deref(), Some("Projects"));
        assert_eq!(result.residual_query, "invoice");
        assert!(!result.backed_up);
    }

    #[test]
    fn first_delimiter_splits_when_several_are_interior() {
        let result = parse("a ⟩ b ⟩ c", DELIM);
        assert_eq!(result.folder_selector.as_deref(), Some("a"));
        assert_eq!(result.residual_query, "b ⟩ c");
    }

    #[test]
    fn no_delimiter_is_flat_query() {
        let result = parse("  Proj  ", DELIM);
        assert_eq!(result.folder_selector, None);
        assert_eq!(result.residual_query, "Proj");
        assert!(!result.backed_up);
    }

    #[test]
    fn empty_query_is_flat_and_empty() {
        let result = parse("", DELIM);
        assert_eq!(result.folder_selector, None);
        assert_eq!(result.residual_query, "");
        assert!(!result.backed_up);
    }

    #[test]
    fn selector_and_residual_are_trimmed() {
        let result = parse("  Projects  ⟩   tax return ", DELIM);
        assert_eq!(result.folder_selector.as_deref(), Some("Projects"));
        assert_eq!(result.residual_query, "tax return");
    }

    #[test]
    fn ascii_delimiter_also_works() {
        let result = parse("Projects > invoice", '>');
        assert_eq!(result.folder_selector.as_deref(), Some("Projects"));
        assert_eq!(result.residual_query, "invoice");
    }
}
