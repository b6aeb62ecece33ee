//! PPTX (Office Open XML) content extraction.
//!
//! Parses .pptx packages into per-slide text, speaker notes, embedded
//! images and package metadata.

pub mod images;
pub mod metadata;
pub mod notes;
pub mod parser;
pub mod slide;

pub use parser::PptxExtractor;
