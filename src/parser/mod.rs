//! Source parsing module.
//!
//! Markup sources go through [`tokenize`] and the semantic model
//! builder to become a [`Document`](crate::model::Document); delimited
//! tabular sources become a [`TabularSource`](crate::model::TabularSource).

mod builder;
mod frontmatter;
mod inline;
mod numbering;
mod options;
mod tabular;
mod tokenizer;

pub use builder::{parse_markup, parse_markup_file, parse_markup_with_options, SemanticModelBuilder};
pub use frontmatter::split_front_matter;
pub use inline::{parse_inline, strip_markers};
pub use numbering::{renumber, SectionNumberer};
pub use options::ParseOptions;
pub use tabular::{parse_tabular, parse_tabular_file};
pub use tokenizer::{tokenize, Token};
