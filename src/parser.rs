//! Tabular line parser for SMILES batch input.
//!
//! Each line of the input blob is one record. Whitespace runs collapse to a
//! single space, which then acts as the field delimiter; double-quoted tokens
//! may contain spaces.

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

/// Lazily split `text` into token lists, one per non-empty line
pub fn parse_lines(text: &str) -> impl Iterator<Item = Vec<String>> + '_ {
    text.lines()
        .map(normalize_whitespace)
        .map(|line| split_record(&line))
        .filter(|tokens| !tokens.is_empty())
}

/// Collapse whitespace runs to single spaces and trim the ends
pub fn normalize_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split one normalized line on spaces, honoring double quotes.
///
/// Malformed quoting is passed through as the csv reader leaves it.
pub fn split_record(line: &str) -> Vec<String> {
    if line.is_empty() {
        return Vec::new();
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(b' ')
        .quote(b'"')
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(str::to_string).collect(),
        Ok(false) => Vec::new(),
        Err(e) => {
            debug!(error = %e, line = %line, "Unreadable record, splitting on spaces");
            line.split(' ').map(str::to_string).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_is_normalized() {
        let lines: Vec<_> = parse_lines("CCO\t 35.2\n  c1ccccc1   water   1.0  ").collect();
        assert_eq!(lines, vec![vec!["CCO", "35.2"], vec!["c1ccccc1", "water", "1.0"]]);
    }

    #[test]
    fn test_quoted_fields_keep_spaces() {
        let lines: Vec<_> = parse_lines(r#""CCO" "35.2""#).collect();
        assert_eq!(lines, vec![vec!["CCO", "35.2"]]);

        let lines: Vec<_> = parse_lines(r#"CCO "diethyl ether" 4.5"#).collect();
        assert_eq!(lines, vec![vec!["CCO", "diethyl ether", "4.5"]]);
    }

    #[test]
    fn test_empty_lines_are_skipped() {
        let text = "CCO\n\n   \n\t\nCC\r\n";
        let lines: Vec<_> = parse_lines(text).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], vec!["CC"]);
    }

    #[test]
    fn test_parsing_is_lazy() {
        let mut lines = parse_lines("C\nCC\nCCC");
        assert_eq!(lines.next(), Some(vec!["C".to_string()]));
        assert_eq!(lines.next(), Some(vec!["CC".to_string()]));
    }

    #[test]
    fn test_malformed_quotes_pass_through() {
        let tokens = split_record(r#""CCO water"#);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].starts_with("CCO"));
    }
}
