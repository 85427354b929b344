//! Client-side application shell.
//!
//! Maps URL routes to long-lived screen instances, runs the mount lifecycle
//! of isolated components, layers fragment-driven overlays over the active
//! screen and publishes the space taken by fixed regions.
//!
//! The engine talks to the document only through [`Host`]: [`MemoryHost`]
//! runs it headless and deterministic, `WebHost` (wasm32) drives a browser.

pub mod app;
pub mod components;
pub mod config;
pub mod core;
pub mod host;
pub mod models;
pub mod utils;

pub use app::{AppContext, AppShell, ShellState};
pub use components::{Component, OverlayRegistry, Screen, Setup, ready};
pub use config::ShellConfig;
pub use crate::core::{ModalOutcome, Result, RouterPhase, SetupContext, ShellError, Transition};
pub use host::{AttachPoint, Host, MemoryHost};
#[cfg(target_arch = "wasm32")]
pub use host::WebHost;
pub use models::{Anchor, Fragment, NavArgs, Node, RouteTable, Theme, UnitId};
