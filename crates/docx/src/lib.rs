//! Word-processing templates: `{field}` placeholder scanning, rendering and a
//! small template library with a filesystem store.

pub mod library;
pub mod placeholder;
pub mod render;
pub mod store;

pub use library::{GeneratedDocument, TemplateLibrary, TemplateStore};
pub use render::TemplateRenderer;
pub use store::FsTemplateStore;
