//! The boundary between the engine and the document it drives.
//!
//! - [`MemoryHost`] - deterministic in-memory host (tests, headless simulation)
//! - `WebHost` - `web-sys` backend, compiled for `wasm32` only

use futures::future::LocalBoxFuture;

use crate::models::{Fragment, IsolationMode, Location, Rect, UnitId};

pub mod memory;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use memory::MemoryHost;
#[cfg(target_arch = "wasm32")]
pub use web::WebHost;

/// Where a unit's root is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachPoint {
    /// The activity container; sibling order is attach order.
    Screens,
    /// Overlay container of a screen.
    Overlays(UnitId),
    /// Document-level chrome (fixed regions).
    Chrome,
}

/// Handle for a pending frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Document, history and scheduler operations the engine needs.
///
/// Everything is called from the single UI thread. Implementations must not
/// call back into the shell synchronously from these methods, except where a
/// callback is handed over explicitly (frames, spawned tasks).
pub trait Host {
    // --- location & history ---

    fn location(&self) -> Location;

    /// Pushes a new history entry without triggering navigation.
    fn push_url(&self, url: &str);

    /// Replaces the current history entry without triggering navigation.
    fn replace_url(&self, url: &str);

    /// Whether going back stays inside this application's history.
    fn history_has_state(&self) -> bool;

    /// Steps back; the host reports the result through a pop-state event.
    fn history_back(&self);

    // --- document ---

    fn set_title(&self, title: &str);

    /// Writes a custom property on the shared layout root.
    fn set_layout_var(&self, name: &str, value: &str);

    /// Sets or clears an attribute on the document root.
    fn set_document_attribute(&self, name: &str, value: Option<&str>);

    // --- units ---

    /// Creates an empty root for `unit` under `point`.
    fn attach(&self, unit: UnitId, point: AttachPoint, isolation: IsolationMode);

    /// Replaces the content of the unit's root with `fragment`.
    fn render(&self, unit: UnitId, fragment: &Fragment);

    fn detach(&self, unit: UnitId);

    /// Sets or clears an attribute on a unit root.
    fn set_attribute(&self, unit: UnitId, name: &str, value: Option<&str>);

    /// Injects a stylesheet into `unit`'s scope, or into the document when
    /// `unit` is `None`. Resolves once the sheet has loaded (or failed).
    fn inject_stylesheet(&self, unit: Option<UnitId>, href: &str) -> LocalBoxFuture<'static, ()>;

    /// Bounding box of a visible unit; `None` when hidden or not attached.
    fn measure(&self, unit: UnitId) -> Option<Rect>;

    /// Resolves when an animation starts on the unit root.
    fn animation_started(&self, unit: UnitId) -> LocalBoxFuture<'static, ()>;

    /// Resolves when the running animation on the unit root ends.
    fn animation_finished(&self, unit: UnitId) -> LocalBoxFuture<'static, ()>;

    /// Resolves once the preload container reports every child ready.
    fn preload_ready(&self) -> LocalBoxFuture<'static, ()>;

    // --- scheduling ---

    /// Runs `callback` before the next rendered frame.
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameHandle;

    fn cancel_frame(&self, handle: FrameHandle);

    /// Runs a task on the UI thread's executor.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}
