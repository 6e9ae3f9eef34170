//! Per-session naming tables
//!
//! Both tables are plain data structures; the owning
//! [`CaptureSession`](crate::session::CaptureSession) serializes access with
//! one lock per table so every reservation is a single read-modify-write.

pub mod documents;
pub mod filenames;

pub use documents::DocumentNameTable;
pub use filenames::{FilenameRegistry, FilenameToken, Reservation};
