//! Document model types.
//!
//! This module defines the intermediate representation that bridges
//! source parsing and format rendering. The model is format-agnostic:
//! one [`Document`] can be rendered to a word-processing document or a
//! slide deck, and a [`TabularSource`] feeds the spreadsheet renderer.

mod block;
mod document;
mod resource;
mod section;
mod table;
mod tabular;

pub use block::{plain_text, Caption, CaptionCounters, CaptionLabel, ContentBlock, TextRun};
pub use document::{Document, Metadata, SectionIter};
pub use resource::{image_dimensions, ImageResource};
pub use section::{Section, SectionNumber, SlideLayoutHint};
pub use table::Table;
pub use tabular::{TabularSection, TabularSource};

