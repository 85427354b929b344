//! Frame scheduling helpers built on [`Host::request_frame`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{self, Either};

use crate::host::{FrameHandle, Host};

// =============================================================================
// Frame Futures
// =============================================================================

/// Resolves before the next rendered frame.
pub fn next_frame(host: &dyn Host) -> impl Future<Output = ()> + 'static {
    let (tx, rx) = oneshot::channel();
    host.request_frame(Box::new(move || {
        let _ = tx.send(());
    }));
    async move {
        let _ = rx.await;
    }
}

/// Resolves after `count` rendered frames.
pub async fn frames(host: Rc<dyn Host>, count: u32) {
    for _ in 0..count {
        next_frame(host.as_ref()).await;
    }
}

/// Outcome of [`race_event`].
#[derive(Debug, PartialEq, Eq)]
pub enum RaceResult {
    /// The event fired first.
    Event,
    /// The timeout elapsed first.
    TimedOut,
}

/// Waits for `event` or `timeout`, whichever completes first. The loser is dropped.
pub async fn race_event<E, T>(event: E, timeout: T) -> RaceResult
where
    E: Future<Output = ()>,
    T: Future<Output = ()>,
{
    match future::select(Box::pin(event), Box::pin(timeout)).await {
        Either::Left(_) => RaceResult::Event,
        Either::Right(_) => RaceResult::TimedOut,
    }
}

// =============================================================================
// Frame Loop
// =============================================================================

struct LoopState {
    alive: Cell<bool>,
    pending: Cell<Option<FrameHandle>>,
    tick: RefCell<Box<dyn FnMut()>>,
}

/// A callback run every frame until stopped.
///
/// Stopping flips a kill switch checked at the top of each frame and cancels
/// the pending frame request; a frame already executing still finishes.
pub struct FrameLoop {
    state: Rc<LoopState>,
    host: Rc<dyn Host>,
}

impl fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLoop")
            .field("running", &self.is_running())
            .finish()
    }
}

impl FrameLoop {
    pub fn start(host: Rc<dyn Host>, tick: impl FnMut() + 'static) -> Self {
        let state = Rc::new(LoopState {
            alive: Cell::new(true),
            pending: Cell::new(None),
            tick: RefCell::new(Box::new(tick)),
        });
        schedule(&host, &state);
        Self { state, host }
    }

    pub fn stop(&self) {
        self.state.alive.set(false);
        if let Some(handle) = self.state.pending.take() {
            self.host.cancel_frame(handle);
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.alive.get()
    }
}

fn schedule(host: &Rc<dyn Host>, state: &Rc<LoopState>) {
    let next_host = host.clone();
    let next_state = state.clone();
    let handle = host.request_frame(Box::new(move || {
        next_state.pending.set(None);
        if !next_state.alive.get() {
            return;
        }
        // A tick that re-enters its own loop is skipped rather than panicking.
        if let Ok(mut tick) = next_state.tick.try_borrow_mut() {
            tick();
        }
        if next_state.alive.get() {
            schedule(&next_host, &next_state);
        }
    }));
    state.pending.set(Some(handle));
}
