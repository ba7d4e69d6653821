//! Table types.

use serde::{Deserialize, Serialize};

/// A rectangular table of cell strings.
///
/// Every row has the same number of cells as the first row; rows that
/// do not are dropped when the table is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Vec<String>>,

    /// Whether the first row is a header row
    pub has_header: bool,
}

impl Table {
    /// Build a table, dropping rows whose width differs from the first row.
    pub fn from_rows(rows: Vec<Vec<String>>, has_header: bool) -> Self {
        let mut iter = rows.into_iter();
        let Some(first) = iter.next() else {
            return Self {
                rows: Vec::new(),
                has_header,
            };
        };

        let width = first.len();
        let mut kept = vec![first];
        for (i, row) in iter.enumerate() {
            if row.len() == width {
                kept.push(row);
            } else {
                log::debug!(
                    "Dropping table row {} with {} cells (expected {})",
                    i + 2,
                    row.len(),
                    width
                );
            }
        }

        Self {
            rows: kept,
            has_header,
        }
    }

    /// Create a table with a header row.
    pub fn with_header<S: Into<String>>(
        header: impl IntoIterator<Item = S>,
        body: Vec<Vec<String>>,
    ) -> Self {
        let mut rows = vec![header.into_iter().map(Into::into).collect()];
        rows.extend(body);
        Self::from_rows(rows, true)
    }

    /// All rows, header first.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.column_count() == 0
    }

    /// Header row, if the table has one.
    pub fn header(&self) -> Option<&[String]> {
        if self.has_header {
            self.rows.first().map(Vec::as_slice)
        } else {
            None
        }
    }

    /// Body rows (non-header).
    pub fn body(&self) -> &[Vec<String>] {
        if self.has_header && !self.rows.is_empty() {
            &self.rows[1..]
        } else {
            &self.rows
        }
    }

    /// Get plain text representation of the table.
    pub fn plain_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
