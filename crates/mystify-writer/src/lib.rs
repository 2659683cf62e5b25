//! MyST Markdown translation for mystify document trees.
//!
//! A [`Translator`] turns one parsed document into the complete text of its
//! output file. [`MystTranslator`] targets MyST, the Markdown dialect read by
//! Sphinx through `myst_parser`.

pub mod myst;
pub mod traits;

pub use myst::MystTranslator;
pub use traits::{TranslateError, Translator};
