//! Front-matter extraction.
//!
//! Front matter is a block of flat `key: value` lines at the very start
//! of a markup file, delimited by `---` lines:
//!
//! ```text
//! ---
//! title: Managed Services Proposal
//! client_name: Acme Corp
//! ---
//!
//! # Managed Services Proposal
//! ```
//!
//! Nested YAML structures are not supported; such lines are ignored.

use crate::error::{Error, Result};
use crate::model::Metadata;

const DELIMITER: &str = "---";

/// Split a source into front-matter metadata and body text.
///
/// A source that does not start with `---` has no front matter and is
/// returned whole. A source that opens front matter but never closes it
/// is a [`Error::Parse`].
pub fn split_front_matter(source: &str) -> Result<(Metadata, &str)> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);

    let Some(first_end) = line_end(source, 0) else {
        if source.trim_end() == DELIMITER {
            return Err(unterminated());
        }
        return Ok((Metadata::new(), source));
    };
    if source[..first_end].trim_end() != DELIMITER {
        return Ok((Metadata::new(), source));
    }

    let mut metadata = Metadata::new();
    let mut pos = next_line_start(source, first_end);
    while pos < source.len() {
        let end = line_end(source, pos).unwrap_or(source.len());
        let line = &source[pos..end];
        if line.trim_end() == DELIMITER {
            let body_start = next_line_start(source, end);
            return Ok((metadata, &source[body_start.min(source.len())..]));
        }
        parse_line(line, &mut metadata);
        pos = next_line_start(source, end);
    }

    Err(unterminated())
}

fn unterminated() -> Error {
    Error::Parse("unterminated front matter: missing closing `---`".to_string())
}

/// Byte index of the end of the line starting at `start` (excluding the newline).
fn line_end(source: &str, start: usize) -> Option<usize> {
    source[start..].find('\n').map(|i| {
        let end = start + i;
        if end > start && source.as_bytes()[end - 1] == b'\r' {
            end - 1
        } else {
            end
        }
    })
}

fn next_line_start(source: &str, line_end: usize) -> usize {
    match source[line_end..].find('\n') {
        Some(i) => line_end + i + 1,
        None => source.len(),
    }
}

fn parse_line(line: &str, metadata: &mut Metadata) {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return;
    }
    if line.starts_with(char::is_whitespace) || trimmed.starts_with("- ") {
        log::warn!("Ignoring nested front-matter line: {}", trimmed);
        return;
    }

    match trimmed.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            metadata.insert(key.trim(), unquote(value.trim()));
        }
        _ => log::warn!("Ignoring front-matter line without `key: value`: {}", trimmed),
    }
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_front_matter() {
        let (metadata, body) = split_front_matter("# Title\n\nBody").unwrap();
        assert!(metadata.is_empty());
        assert_eq!(body, "# Title\n\nBody");
    }

    #[test]
    fn test_flat_pairs() {
        let source = "---\ntitle: \"Cloud Migration\"\nclient_name: Acme: EMEA\nlogo: assets/logo.png\n---\n# Heading\n";
        let (metadata, body) = split_front_matter(source).unwrap();
        assert_eq!(metadata.get("title"), Some("Cloud Migration"));
        assert_eq!(metadata.get("client_name"), Some("Acme: EMEA"));
        assert_eq!(metadata.logo(), Some("assets/logo.png"));
        assert_eq!(body, "# Heading\n");
    }

    #[test]
    fn test_crlf_line_endings() {
        let source = "---\r\ntitle: X\r\n---\r\nBody\r\n";
        let (metadata, body) = split_front_matter(source).unwrap();
        assert_eq!(metadata.get("title"), Some("X"));
        assert_eq!(body, "Body\r\n");
    }

    #[test]
    fn test_nested_lines_ignored() {
        let source = "---\ntitle: X\ntags:\n  - a\n  - b\n---\n";
        let (metadata, body) = split_front_matter(source).unwrap();
        assert_eq!(metadata.get("title"), Some("X"));
        assert_eq!(metadata.get("tags"), Some(""));
        assert_eq!(metadata.len(), 2);
        assert_eq!(body, "");
    }

    #[test]
    fn test_unterminated_is_error() {
        let err = split_front_matter("---\ntitle: X\n# Heading\n").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let err = split_front_matter("---").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_bom_stripped() {
        let (metadata, _) = split_front_matter("\u{feff}---\na: b\n---\n").unwrap();
        assert_eq!(metadata.get("a"), Some("b"));
    }
}
