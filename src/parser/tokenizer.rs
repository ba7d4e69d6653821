//! Markup tokenizer.
//!
//! Turns body text into a flat stream of line tokens. Tokenizing never
//! fails: anything that is not recognized becomes [`Token::Text`].

use crate::model::CaptionLabel;

/// A single line-level token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `#`..`######` heading
    Heading {
        /// Number of `#` characters (1-6)
        level: u8,
        /// Heading text
        text: String,
    },

    /// `- ` or `* ` list item
    Bullet {
        /// Indent level, `floor(leading_whitespace / 2)`
        indent: u8,
        /// Item text
        text: String,
    },

    /// `|`-delimited table row
    TableRow(Vec<String>),

    /// `|---|:---:|` separator row
    TableSeparator,

    /// Line consisting only of `![alt](path)`
    Image {
        /// Alternative text
        alt: String,
        /// Image path
        path: String,
    },

    /// `Table: description` or `Figure: description`
    Caption {
        /// Caption label
        label: CaptionLabel,
        /// Description text
        text: String,
    },

    /// Paragraph text
    Text {
        /// Trimmed line text
        text: String,
        /// Leading whitespace count
        indent: usize,
        /// Line must not be merged with its neighbours (e.g. `1. item`)
        standalone: bool,
    },

    /// Empty line
    Blank,
}

/// Tokenize a markup body.
pub fn tokenize(body: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut in_fence = false;

    for raw in body.lines() {
        let line = raw.trim_end();
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            tokens.push(Token::Text {
                text: trimmed.to_string(),
                indent: leading_whitespace(line),
                standalone: true,
            });
            continue;
        }

        tokens.push(tokenize_line(line));
    }

    tokens
}

fn tokenize_line(line: &str) -> Token {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || is_rule(trimmed) || is_comment(trimmed) {
        return Token::Blank;
    }

    if let Some(token) = heading(trimmed) {
        return token;
    }

    if is_table_line(trimmed) {
        let cells = split_row(trimmed);
        if is_separator(&cells) {
            return Token::TableSeparator;
        }
        return Token::TableRow(cells);
    }

    if let Some(text) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    {
        let indent = (leading_whitespace(line) / 2).min(u8::MAX as usize) as u8;
        return Token::Bullet {
            indent,
            text: text.trim().to_string(),
        };
    }

    if let Some((alt, path)) = image(trimmed) {
        return Token::Image { alt, path };
    }

    if let Some(token) = caption(trimmed) {
        return token;
    }

    Token::Text {
        text: trimmed.to_string(),
        indent: leading_whitespace(line),
        standalone: is_ordered_item(trimmed),
    }
}

/// Count leading whitespace, with a tab counting as two spaces.
fn leading_whitespace(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 2 } else { 1 })
        .sum()
}

fn heading(trimmed: &str) -> Option<Token> {
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim_end();
    Some(Token::Heading {
        level: hashes as u8,
        text: text.to_string(),
    })
}

fn is_rule(trimmed: &str) -> bool {
    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && (compact.chars().all(|c| c == '-')
            || compact.chars().all(|c| c == '*')
            || compact.chars().all(|c| c == '_'))
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with("<!--") && trimmed.ends_with("-->")
}

fn is_table_line(trimmed: &str) -> bool {
    trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|')
}

fn split_row(trimmed: &str) -> Vec<String> {
    let inner = &trimmed[1..trimmed.len() - 1];
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn is_separator(cells: &[String]) -> bool {
    cells.iter().any(|c| c.contains('-'))
        && cells
            .iter()
            .all(|c| c.chars().all(|ch| ch == '-' || ch == ':' || ch == ' '))
}

fn image(trimmed: &str) -> Option<(String, String)> {
    let rest = trimmed.strip_prefix("![")?;
    let (alt, rest) = rest.split_once("](")?;
    let target = rest.strip_suffix(')')?;
    if target.contains(')') {
        return None;
    }
    // Drop an optional title: ![alt](path "title")
    let path = match target.find(" \"") {
        Some(i) => &target[..i],
        None => target,
    };
    let path = path.trim().trim_start_matches('<').trim_end_matches('>');
    if path.is_empty() {
        return None;
    }
    Some((alt.trim().to_string(), path.to_string()))
}

fn caption(trimmed: &str) -> Option<Token> {
    let (label, rest) = if let Some(rest) = trimmed.strip_prefix("Table:") {
        (CaptionLabel::Table, rest)
    } else if let Some(rest) = trimmed.strip_prefix("Figure:") {
        (CaptionLabel::Figure, rest)
    } else {
        return None;
    };
    Some(Token::Caption {
        label,
        text: rest.trim().to_string(),
    })
}

fn is_ordered_item(trimmed: &str) -> bool {
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && trimmed[digits..].starts_with(". ")
}
