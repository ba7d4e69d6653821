//! Section numbering.
//!
//! One counter per heading level. A heading at level `L` increments
//! `counter[L]`, zeroes every deeper counter, and takes
//! `counter[1..=L]` as its number. Missing intermediate levels are not
//! filled in: a level-3 heading with no level-1 or level-2 heading before
//! it numbers as `0.0.1`.

use crate::model::{Document, Section, SectionNumber};

const MAX_LEVEL: usize = 6;

/// Hierarchical heading counter.
#[derive(Debug, Clone, Default)]
pub struct SectionNumberer {
    counters: [u32; MAX_LEVEL],
}

impl SectionNumberer {
    /// Create a numberer with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number the next heading at `level` (clamped to 1-6).
    pub fn next(&mut self, level: u8) -> SectionNumber {
        let level = (level as usize).clamp(1, MAX_LEVEL);
        self.counters[level - 1] += 1;
        for counter in &mut self.counters[level..] {
            *counter = 0;
        }
        SectionNumber::from(self.counters[..level].to_vec())
    }

    /// Reset all counters.
    pub fn reset(&mut self) {
        self.counters = [0; MAX_LEVEL];
    }
}

/// Recompute every section number of a document in document order.
pub fn renumber(doc: &mut Document) {
    let mut numberer = SectionNumberer::new();
    for section in &mut doc.sections {
        renumber_section(section, &mut numberer);
    }
}

fn renumber_section(section: &mut Section, numberer: &mut SectionNumberer) {
    section.number = numberer.next(section.level);
    for child in &mut section.children {
        renumber_section(child, numberer);
    }
}
