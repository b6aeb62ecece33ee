//! Core types, zip package access, XML tree parsing and relationship
//! resolution for Office Open XML packages.

pub mod archive;
pub mod error;
pub mod rels;
pub mod types;
pub mod xml;

pub use archive::{EntryInfo, Package};
pub use error::{Error, RenderFailure, RenderFailureKind, RenderFailures, Result};
pub use rels::RelationshipMap;
pub use types::{
    DocumentKind, FieldMapping, Metadata, PresentationContent, Slide, TemplateDescriptor,
};
pub use xml::{Child, Node};
