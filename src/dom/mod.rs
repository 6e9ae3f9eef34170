//! Document model for captures, built on `kuchiki`

pub mod clone;
pub mod document;
pub mod node;
pub mod selection;

pub use clone::RefTable;
pub use document::{FrameContent, ReadyState, SourceDocument};
pub use selection::{Boundary, Range, Selection};
