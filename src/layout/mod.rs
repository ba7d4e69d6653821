//! Layout decisions shared by the renderers.
//!
//! - [`columns`]: table column widths from a weighted character score
//! - [`slide`]: slide layout classification from section titles

pub mod columns;
pub mod slide;

pub use columns::{
    cell_score, widths, widths_with, ColumnConstraints, ColumnWidthPlan, PlanKind,
    DEFAULT_PAGE_WIDTH, EMU_PER_INCH, TWIPS_PER_INCH,
};
pub use slide::{assign_hints, classify, strip_slide_prefix};
