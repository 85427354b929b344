//! Core engine logic.
//!
//! This module provides:
//! - [`lifecycle`] - the mount sequence shared by screens, overlays and chrome
//! - [`router`] - route resolution and the screen instance cache
//! - [`modal`] - fragment-driven overlays
//! - [`fixed`] - fixed-region measurement and inset publishing
//! - [`layout`] - per-type layout cache

pub mod error;
pub mod fixed;
pub mod layout;
pub mod lifecycle;
pub mod modal;
pub mod router;

pub use error::{ErrorChannel, Result, ShellError};
pub use lifecycle::{Lifecycle, SetupContext, Unit};
pub use modal::{ModalOutcome, ModalRequest};
pub use router::{RouterPhase, ScreenRecord, Transition};
