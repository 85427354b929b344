//! Utility modules.
//!
//! Provides:
//! - [`frame`] - frame futures, frame loops and the first-wins race
//! - [`url`] - query string and component percent-encoding

pub mod frame;
pub mod url;

pub use frame::{FrameLoop, RaceResult, race_event};
