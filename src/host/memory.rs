//! In-memory host.
//!
//! Keeps a flat model of the document (attached unit roots with attributes),
//! a history stack, a manual frame clock and a local executor. Nothing runs
//! until the caller drives it with [`MemoryHost::run_until_stalled`] or
//! [`MemoryHost::advance_frames`], which makes every interleaving reproducible.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{self, FutureExt, LocalBoxFuture};
use futures::task::LocalSpawnExt;

use super::{AttachPoint, FrameHandle, Host};
use crate::models::{Fragment, IsolationMode, Location, Rect, UnitId};

/// A unit root as the memory host sees it.
#[derive(Clone, Debug)]
pub struct MemoryNode {
    pub point: AttachPoint,
    pub isolation: IsolationMode,
    pub fragment: Fragment,
    pub attributes: BTreeMap<String, String>,
}

type FrameCallback = Box<dyn FnOnce()>;

struct State {
    history: Vec<String>,
    index: usize,
    title: String,
    layout_vars: HashMap<String, String>,
    layout_writes: usize,
    document_attributes: HashMap<String, String>,
    nodes: HashMap<UnitId, MemoryNode>,
    order: Vec<UnitId>,
    stylesheets: Vec<(Option<UnitId>, String)>,
    defer_stylesheets: bool,
    pending_sheets: Vec<oneshot::Sender<()>>,
    rects: HashMap<UnitId, Rect>,
    animations: bool,
    frames: Vec<(FrameHandle, FrameCallback)>,
    next_frame: u64,
    hold_preload: bool,
    preload_waiters: Vec<oneshot::Sender<()>>,
}

/// Deterministic [`Host`] backed by plain data structures.
pub struct MemoryHost {
    state: RefCell<State>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Host positioned at `/`.
    pub fn new() -> Self {
        Self::with_url("/")
    }

    /// Host positioned at `url`, as if the tab was opened there.
    pub fn with_url(url: &str) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            state: RefCell::new(State {
                history: vec![url.to_string()],
                index: 0,
                title: String::new(),
                layout_vars: HashMap::new(),
                layout_writes: 0,
                document_attributes: HashMap::new(),
                nodes: HashMap::new(),
                order: Vec::new(),
                stylesheets: Vec::new(),
                defer_stylesheets: false,
                pending_sheets: Vec::new(),
                rects: HashMap::new(),
                animations: false,
                frames: Vec::new(),
                next_frame: 0,
                hold_preload: false,
                preload_waiters: Vec::new(),
            }),
            pool: RefCell::new(pool),
            spawner,
        }
    }

    // --- driving ---

    /// Runs spawned tasks until none can make progress.
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    /// Renders `count` frames, draining tasks after each.
    pub fn advance_frames(&self, count: u32) {
        self.run_until_stalled();
        for _ in 0..count {
            let due = std::mem::take(&mut self.state.borrow_mut().frames);
            for (_, callback) in due {
                callback();
            }
            self.run_until_stalled();
        }
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    // --- history ---

    /// Simulates the user following a link: pushes `url` as a new entry.
    pub fn visit(&self, url: &str) {
        self.push_url(url);
    }

    /// Current URL.
    pub fn url(&self) -> String {
        let state = self.state.borrow();
        state.history[state.index].clone()
    }

    /// Number of entries up to and including the current one.
    pub fn history_depth(&self) -> usize {
        self.state.borrow().index + 1
    }

    // --- document ---

    pub fn title(&self) -> String {
        self.state.borrow().title.clone()
    }

    pub fn layout_var(&self, name: &str) -> Option<String> {
        self.state.borrow().layout_vars.get(name).cloned()
    }

    /// Number of layout variable writes so far.
    pub fn layout_writes(&self) -> usize {
        self.state.borrow().layout_writes
    }

    pub fn document_attribute(&self, name: &str) -> Option<String> {
        self.state.borrow().document_attributes.get(name).cloned()
    }

    pub fn is_attached(&self, unit: UnitId) -> bool {
        self.state.borrow().nodes.contains_key(&unit)
    }

    pub fn node(&self, unit: UnitId) -> Option<MemoryNode> {
        self.state.borrow().nodes.get(&unit).cloned()
    }

    pub fn attribute(&self, unit: UnitId, name: &str) -> Option<String> {
        self.state
            .borrow()
            .nodes
            .get(&unit)
            .and_then(|node| node.attributes.get(name).cloned())
    }

    pub fn has_attribute(&self, unit: UnitId, name: &str) -> bool {
        self.attribute(unit, name).is_some()
    }

    /// Attached units under `point`, in attach order.
    pub fn children(&self, point: AttachPoint) -> Vec<UnitId> {
        let state = self.state.borrow();
        state
            .order
            .iter()
            .filter(|id| state.nodes.get(id).is_some_and(|node| node.point == point))
            .copied()
            .collect()
    }

    // --- stylesheets ---

    /// Every injected stylesheet with its scope (`None` = document).
    pub fn stylesheets(&self) -> Vec<(Option<UnitId>, String)> {
        self.state.borrow().stylesheets.clone()
    }

    /// Keep stylesheet loads pending until [`finish_stylesheets`](Self::finish_stylesheets).
    pub fn defer_stylesheets(&self, defer: bool) {
        self.state.borrow_mut().defer_stylesheets = defer;
    }

    /// Reports every pending stylesheet as loaded.
    pub fn finish_stylesheets(&self) {
        let pending = std::mem::take(&mut self.state.borrow_mut().pending_sheets);
        for sender in pending {
            let _ = sender.send(());
        }
        self.run_until_stalled();
    }

    // --- geometry & animation ---

    pub fn set_rect(&self, unit: UnitId, rect: Rect) {
        self.state.borrow_mut().rects.insert(unit, rect);
    }

    /// When enabled, exit animations start and finish immediately; otherwise
    /// they never start.
    pub fn enable_animations(&self, enabled: bool) {
        self.state.borrow_mut().animations = enabled;
    }

    // --- preload ---

    pub fn hold_preload(&self) {
        self.state.borrow_mut().hold_preload = true;
    }

    pub fn release_preload(&self) {
        let waiters = {
            let mut state = self.state.borrow_mut();
            state.hold_preload = false;
            std::mem::take(&mut state.preload_waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(());
        }
        self.run_until_stalled();
    }
}

fn wait(rx: oneshot::Receiver<()>) -> LocalBoxFuture<'static, ()> {
    rx.map(|_| ()).boxed_local()
}

impl Host for MemoryHost {
    fn location(&self) -> Location {
        Location::parse(&self.url())
    }

    fn push_url(&self, url: &str) {
        let mut state = self.state.borrow_mut();
        let next = state.index + 1;
        state.history.truncate(next);
        state.history.push(url.to_string());
        state.index = next;
    }

    fn replace_url(&self, url: &str) {
        let mut state = self.state.borrow_mut();
        let index = state.index;
        state.history[index] = url.to_string();
    }

    fn history_has_state(&self) -> bool {
        self.state.borrow().index > 0
    }

    fn history_back(&self) {
        let mut state = self.state.borrow_mut();
        state.index = state.index.saturating_sub(1);
    }

    fn set_title(&self, title: &str) {
        self.state.borrow_mut().title = title.to_string();
    }

    fn set_layout_var(&self, name: &str, value: &str) {
        let mut state = self.state.borrow_mut();
        state.layout_writes += 1;
        state.layout_vars.insert(name.to_string(), value.to_string());
    }

    fn set_document_attribute(&self, name: &str, value: Option<&str>) {
        let mut state = self.state.borrow_mut();
        match value {
            Some(value) => state.document_attributes.insert(name.to_string(), value.to_string()),
            None => state.document_attributes.remove(name),
        };
    }

    fn attach(&self, unit: UnitId, point: AttachPoint, isolation: IsolationMode) {
        let mut state = self.state.borrow_mut();
        let previous = state.nodes.insert(
            unit,
            MemoryNode {
                point,
                isolation,
                fragment: Fragment::default(),
                attributes: BTreeMap::new(),
            },
        );
        if previous.is_none() {
            state.order.push(unit);
        }
    }

    fn render(&self, unit: UnitId, fragment: &Fragment) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&unit) {
            node.fragment = fragment.clone();
        }
    }

    fn detach(&self, unit: UnitId) {
        let mut state = self.state.borrow_mut();
        state.nodes.remove(&unit);
        state.order.retain(|id| *id != unit);
    }

    fn set_attribute(&self, unit: UnitId, name: &str, value: Option<&str>) {
        let mut state = self.state.borrow_mut();
        if let Some(node) = state.nodes.get_mut(&unit) {
            match value {
                Some(value) => node.attributes.insert(name.to_string(), value.to_string()),
                None => node.attributes.remove(name),
            };
        }
    }

    fn inject_stylesheet(&self, unit: Option<UnitId>, href: &str) -> LocalBoxFuture<'static, ()> {
        let mut state = self.state.borrow_mut();
        state.stylesheets.push((unit, href.to_string()));
        if !state.defer_stylesheets {
            return future::ready(()).boxed_local();
        }
        let (tx, rx) = oneshot::channel();
        state.pending_sheets.push(tx);
        wait(rx)
    }

    fn measure(&self, unit: UnitId) -> Option<Rect> {
        let state = self.state.borrow();
        let node = state.nodes.get(&unit)?;
        if node.attributes.contains_key("hidden") {
            return None;
        }
        state.rects.get(&unit).copied()
    }

    fn animation_started(&self, _unit: UnitId) -> LocalBoxFuture<'static, ()> {
        if self.state.borrow().animations {
            future::ready(()).boxed_local()
        } else {
            future::pending().boxed_local()
        }
    }

    fn animation_finished(&self, _unit: UnitId) -> LocalBoxFuture<'static, ()> {
        future::ready(()).boxed_local()
    }

    fn preload_ready(&self) -> LocalBoxFuture<'static, ()> {
        let mut state = self.state.borrow_mut();
        if !state.hold_preload {
            return future::ready(()).boxed_local();
        }
        let (tx, rx) = oneshot::channel();
        state.preload_waiters.push(tx);
        wait(rx)
    }

    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        state.next_frame += 1;
        let handle = FrameHandle(state.next_frame);
        state.frames.push((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.state.borrow_mut().frames.retain(|(h, _)| *h != handle);
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(e) = self.spawner.spawn_local(task) {
            tracing::warn!(error = %e, "memory host executor is shut down");
        }
    }
}
