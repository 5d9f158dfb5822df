//! Extraction of ranged rows from the source database.

mod base;
pub mod sql;

pub use base::{ExtractionResult, ExtractionWindow, Extractor, render_query};
