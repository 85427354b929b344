//! Mountable-unit lifecycle.
//!
//! One engine serves screens, overlays and plain components; the differences
//! live in [`Capabilities`]. A mount runs these steps in order:
//!
//! 1. tag the root so queries can find it
//! 2. apply the visibility policy (hidden / loading flag / nothing)
//! 3. inject scope and unit stylesheets, tracking each load
//! 4. render the layout, reusing the per-type cached fragment
//! 5. run setup
//! 6. once every stylesheet has loaded and setup has resolved, lift the
//!    visibility policy and mark the unit ready

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};

use crate::app::AppContext;
use crate::components::{Component, short_name};
use crate::config::attrs;
use crate::core::error::{Result, ShellError};
use crate::host::{AttachPoint, Host};
use crate::models::{Capabilities, Fragment, IsolationMode, Node, UnitId, VisibilityPolicy};
use crate::utils::frame::FrameLoop;

// =============================================================================
// Lifecycle State
// =============================================================================

/// Outcome of the run-counter guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountGuard {
    /// First mount: run the sequence.
    Proceed,
    /// Repeated mount within the retry ceiling: ignore.
    Duplicate,
}

/// Per-instance lifecycle bookkeeping, shared with in-flight mount tasks.
#[derive(Debug)]
pub struct Lifecycle {
    id: UnitId,
    type_name: &'static str,
    capabilities: Capabilities,
    isolation: IsolationMode,
    visibility: VisibilityPolicy,
    mount_runs: Cell<u32>,
    ready: Cell<bool>,
    destroyed: Cell<bool>,
    removing: Cell<bool>,
    loops: RefCell<Vec<FrameLoop>>,
}

impl Lifecycle {
    fn new<B: Component + ?Sized>(id: UnitId, body: &B, capabilities: Capabilities) -> Self {
        Self {
            id,
            type_name: body.type_name(),
            capabilities,
            isolation: body.isolation(),
            visibility: body.visibility(),
            mount_runs: Cell::new(0),
            ready: Cell::new(false),
            destroyed: Cell::new(false),
            removing: Cell::new(false),
            loops: RefCell::new(Vec::new()),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without its module path.
    pub fn name(&self) -> &'static str {
        short_name(self.type_name)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn isolation(&self) -> IsolationMode {
        self.isolation
    }

    pub fn mount_runs(&self) -> u32 {
        self.mount_runs.get()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn is_removing(&self) -> bool {
        self.removing.get()
    }

    /// Advances the run counter and decides whether this mount proceeds.
    pub fn begin_mount(&self, limit: u32) -> Result<MountGuard> {
        let runs = self.mount_runs.get() + 1;
        self.mount_runs.set(runs);
        match runs {
            1 => Ok(MountGuard::Proceed),
            _ if runs <= limit => {
                tracing::warn!(unit = %self.id, name = self.name(), runs, "duplicate mount");
                Ok(MountGuard::Duplicate)
            }
            _ => Err(ShellError::MountRetryExceeded {
                unit: self.name().to_string(),
                runs,
                limit,
            }),
        }
    }

    /// Marks the unit destroyed and stops its frame loops. Returns `false`
    /// if it already was.
    pub fn destroy(&self) -> bool {
        if self.destroyed.replace(true) {
            return false;
        }
        for frame_loop in self.loops.borrow_mut().drain(..) {
            frame_loop.stop();
        }
        true
    }

    /// Claims the removal of this unit. Returns `false` if a removal is
    /// already under way.
    pub fn begin_removal(&self) -> bool {
        !self.removing.replace(true)
    }

    fn adopt_loop(&self, frame_loop: FrameLoop) {
        if self.is_destroyed() {
            frame_loop.stop();
        } else {
            self.loops.borrow_mut().push(frame_loop);
        }
    }
}

// =============================================================================
// Unit
// =============================================================================

/// A component instance together with its lifecycle.
pub struct Unit<B: ?Sized> {
    pub lifecycle: Rc<Lifecycle>,
    pub body: Rc<RefCell<Box<B>>>,
}

impl<B: Component + ?Sized> Unit<B> {
    pub fn new(id: UnitId, body: Box<B>, capabilities: Capabilities) -> Self {
        let lifecycle = Rc::new(Lifecycle::new(id, body.as_ref(), capabilities));
        Self {
            lifecycle,
            body: Rc::new(RefCell::new(body)),
        }
    }
}

impl<B: ?Sized> Unit<B> {
    pub fn id(&self) -> UnitId {
        self.lifecycle.id
    }
}

impl<B: ?Sized> Clone for Unit<B> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: self.lifecycle.clone(),
            body: self.body.clone(),
        }
    }
}

// =============================================================================
// Setup Context
// =============================================================================

/// What a component sees while its setup runs.
pub struct SetupContext<'a> {
    lifecycle: &'a Rc<Lifecycle>,
    root: &'a Fragment,
    host: &'a Rc<dyn Host>,
}

impl<'a> SetupContext<'a> {
    pub fn unit_id(&self) -> UnitId {
        self.lifecycle.id
    }

    /// The rendered layout (empty when the component declares none).
    pub fn root(&self) -> &'a Fragment {
        self.root
    }

    pub fn host(&self) -> Rc<dyn Host> {
        self.host.clone()
    }

    /// Child that must exist. A miss is an authoring error and fails the mount.
    pub fn require(&self, selector: &str) -> Result<&'a Node> {
        self.root
            .select(selector)?
            .ok_or_else(|| ShellError::RequiredChildMissing {
                unit: self.lifecycle.name().to_string(),
                selector: selector.to_string(),
            })
    }

    /// Child that may be absent.
    pub fn find(&self, selector: &str) -> Option<&'a Node> {
        match self.root.select(selector) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(unit = %self.lifecycle.id, error = %e, "optional lookup failed");
                None
            }
        }
    }

    /// Runs `tick` every frame until the unit is destroyed.
    pub fn frame_loop(&mut self, tick: impl FnMut() + 'static) {
        let frame_loop = FrameLoop::start(self.host.clone(), tick);
        self.lifecycle.adopt_loop(frame_loop);
    }
}

// =============================================================================
// Style Scopes
// =============================================================================

type SheetLoad = Shared<LocalBoxFuture<'static, ()>>;

/// Document-level stylesheets already injected for shared-mode units. Later
/// units wait on the same load instead of injecting again.
#[derive(Default)]
pub struct StyleScopes {
    document: HashMap<String, SheetLoad>,
}

impl StyleScopes {
    pub fn new() -> Self {
        Self::default()
    }

    fn document_sheet(&mut self, host: &dyn Host, href: &str) -> LocalBoxFuture<'static, ()> {
        self.document
            .entry(href.to_string())
            .or_insert_with(|| host.inject_stylesheet(None, href).shared())
            .clone()
            .boxed_local()
    }

    pub fn injected(&self) -> usize {
        self.document.len()
    }
}

// =============================================================================
// Mount
// =============================================================================

/// Attaches the unit's root under `point` and mounts it.
pub(crate) fn attach<B: Component + ?Sized>(
    ctx: &Rc<AppContext>,
    unit: &Unit<B>,
    point: AttachPoint,
) -> Result<()> {
    ctx.host.attach(unit.id(), point, unit.lifecycle.isolation);
    mount(ctx, unit)
}

/// Runs the mount sequence. Steps 1-5 happen synchronously; completion is
/// handed to the host executor. Errors raised after this returns go to the
/// error channel.
pub(crate) fn mount<B: Component + ?Sized>(ctx: &Rc<AppContext>, unit: &Unit<B>) -> Result<()> {
    let lifecycle = &unit.lifecycle;
    if lifecycle.begin_mount(ctx.config.mount_retry_limit)? == MountGuard::Duplicate {
        return Ok(());
    }

    let host = &ctx.host;
    let id = lifecycle.id;

    // 1. discoverable
    host.set_attribute(id, attrs::UNIT, Some(lifecycle.name()));
    host.set_attribute(id, attrs::UNIT_ID, Some(id.0.to_string().as_str()));

    // 2. deferred visibility
    match lifecycle.visibility {
        VisibilityPolicy::HideUntilReady => host.set_attribute(id, attrs::HIDDEN, Some("")),
        VisibilityPolicy::LoadingFlag => host.set_attribute(id, attrs::LOADING, Some("")),
        VisibilityPolicy::Ungated => {}
    }

    // 3. stylesheets
    let unit_sheets = unit.body.borrow().stylesheets();
    let mut loads: Vec<LocalBoxFuture<'static, ()>> = Vec::new();
    match lifecycle.isolation {
        IsolationMode::Isolated => {
            for href in ctx.config.isolated_stylesheets.iter().chain(&unit_sheets) {
                loads.push(host.inject_stylesheet(Some(id), href));
            }
        }
        IsolationMode::Shared => {
            let mut styles = ctx.styles.borrow_mut();
            for href in ctx.config.shared_stylesheets.iter().chain(&unit_sheets) {
                loads.push(styles.document_sheet(host.as_ref(), href));
            }
        }
    }

    // 4. cached layout
    let fragment = {
        let body = unit.body.borrow();
        ctx.layouts
            .borrow_mut()
            .get_or_generate(lifecycle.type_name, || body.layout())
    };
    let root = fragment.unwrap_or_default();
    if !root.is_empty() {
        host.render(id, &root);
    }

    // 5. setup
    let setup = {
        let mut cx = SetupContext {
            lifecycle,
            root: &root,
            host,
        };
        unit.body.borrow_mut().setup(&mut cx)?
    };

    // 6. ready once both have completed
    let weak: Weak<AppContext> = Rc::downgrade(ctx);
    let lifecycle = lifecycle.clone();
    let host = host.clone();
    ctx.host.spawn(Box::pin(async move {
        let (_, result) = future::join(future::join_all(loads), setup).await;
        if let Err(e) = result {
            if let Some(ctx) = weak.upgrade() {
                ctx.errors.report(e);
            }
            return;
        }
        if lifecycle.is_destroyed() {
            tracing::debug!(unit = %lifecycle.id, "unit destroyed before ready");
            return;
        }
        match lifecycle.visibility {
            VisibilityPolicy::HideUntilReady => {
                host.set_attribute(lifecycle.id, attrs::HIDDEN, None)
            }
            VisibilityPolicy::LoadingFlag => host.set_attribute(lifecycle.id, attrs::LOADING, None),
            VisibilityPolicy::Ungated => {}
        }
        lifecycle.ready.set(true);
        tracing::debug!(unit = %lifecycle.id, name = lifecycle.name(), "unit ready");
    }));

    Ok(())
}

/// Detaches the unit's root after marking it destroyed.
pub(crate) fn destroy<B: ?Sized>(host: &dyn Host, unit: &Unit<B>) {
    if unit.lifecycle.destroy() {
        host.detach(unit.id());
    }
}
