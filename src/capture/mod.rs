//! Document capture
//!
//! A capture clones a live document, rewrites every resource reference
//! according to [`CaptureOptions`](crate::config::CaptureOptions), waits for
//! the fetches it started and stores the serialized result. Child frames are
//! captured as documents of their own, directly or through the
//! [`FrameCoordinator`].

mod audit;
mod capturer;
mod counter;
mod elements;
mod errors;
pub mod frames;
mod settings;
mod srcset;
mod walker;

pub use audit::DomRewriter;
pub use capturer::Capturer;
pub use counter::TaskCounter;
pub use errors::CaptureError;
pub use frames::{FrameAddress, FrameCommand, FrameCoordinator, FrameHandle, FrameInstanceId, TabId};
pub use settings::{CaptureSettings, CaptureType, SavedDocument};
pub use srcset::{rewrite_srcset, srcset_urls};
