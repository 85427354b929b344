//! Activity router.
//!
//! Resolves the current location to a screen type and applies the cache
//! policy: at most one live instance per screen type, reuse before creation,
//! and reusing an older instance destroys everything attached after it (that
//! forward branch of history is gone).

use std::any::TypeId;
use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;

use crate::app::AppContext;
use crate::components::{Component, OverlayRegistry, Screen};
use crate::config::{TITLE_SEPARATOR, attrs};
use crate::core::error::{Result, ShellError};
use crate::core::lifecycle::{self, Unit};
use crate::core::modal::OverlayRecord;
use crate::host::AttachPoint;
use crate::models::{Capabilities, Location, NavArgs, RouteEntry, RouteKey, UnitId};

// ============================================================================
// Screen Records
// ============================================================================

/// A live screen instance with the state the shell keeps beside it.
pub struct ScreenRecord {
    pub unit: Unit<dyn Screen>,
    pub screen_type: TypeId,
    route: RefCell<RouteKey>,
    args: RefCell<NavArgs>,
    registry: RefCell<OverlayRegistry>,
    pub(crate) overlays: RefCell<Vec<OverlayRecord>>,
}

impl ScreenRecord {
    fn new(
        unit: Unit<dyn Screen>,
        screen_type: TypeId,
        route: RouteKey,
        registry: OverlayRegistry,
    ) -> Self {
        Self {
            unit,
            screen_type,
            route: RefCell::new(route),
            args: RefCell::new(NavArgs::new()),
            registry: RefCell::new(registry),
            overlays: RefCell::new(Vec::new()),
        }
    }

    pub fn id(&self) -> UnitId {
        self.unit.id()
    }

    pub fn name(&self) -> &'static str {
        self.unit.lifecycle.name()
    }

    pub fn route(&self) -> RouteKey {
        self.route.borrow().clone()
    }

    /// Arguments most recently delivered.
    pub fn args(&self) -> NavArgs {
        self.args.borrow().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.unit.lifecycle.is_destroyed()
    }

    /// Registers an overlay factory on this screen only.
    pub fn register_overlay<F>(&self, token: impl Into<String>, factory: F)
    where
        F: Fn(&NavArgs) -> Option<Box<dyn Component>> + 'static,
    {
        self.registry.borrow_mut().register(token, factory);
    }

    pub(crate) fn registry(&self) -> std::cell::Ref<'_, OverlayRegistry> {
        self.registry.borrow()
    }

    /// Overlays attached and not being torn down.
    pub fn live_overlays(&self) -> Vec<UnitId> {
        self.overlays
            .borrow()
            .iter()
            .filter(|o| !o.unit.lifecycle.is_destroyed())
            .map(|o| o.unit.id())
            .collect()
    }

    pub(crate) fn live_overlay(&self, token: &str) -> Option<OverlayRecord> {
        self.overlays
            .borrow()
            .iter()
            .find(|o| o.token.as_deref() == Some(token) && !o.unit.lifecycle.is_destroyed())
            .cloned()
    }

    fn deliver(&self, args: &NavArgs) {
        *self.args.borrow_mut() = args.clone();
        self.unit.body.borrow_mut().on_args(args);
    }

    fn title(&self) -> Option<String> {
        self.unit.body.borrow().title()
    }
}

/// Attached screens in attach order; the last one is active.
#[derive(Default)]
pub struct ScreenCache {
    screens: Vec<Rc<ScreenRecord>>,
}

impl ScreenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<Rc<ScreenRecord>> {
        self.screens.last().cloned()
    }

    pub fn position(&self, screen_type: TypeId) -> Option<usize> {
        self.screens
            .iter()
            .position(|s| s.screen_type == screen_type && !s.is_destroyed())
    }

    pub fn get(&self, index: usize) -> Option<Rc<ScreenRecord>> {
        self.screens.get(index).cloned()
    }

    pub fn find(&self, unit: UnitId) -> Option<Rc<ScreenRecord>> {
        self.screens.iter().find(|s| s.id() == unit).cloned()
    }

    /// Live instances of `screen_type`.
    pub fn count_of(&self, screen_type: TypeId) -> usize {
        self.screens
            .iter()
            .filter(|s| s.screen_type == screen_type && !s.is_destroyed())
            .count()
    }

    pub fn all(&self) -> Vec<Rc<ScreenRecord>> {
        self.screens.clone()
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    fn push(&mut self, record: Rc<ScreenRecord>) {
        self.screens.push(record);
    }

    fn remove(&mut self, unit: UnitId) {
        self.screens.retain(|s| s.id() != unit);
    }

    /// Removes and returns every screen attached after `index`.
    fn split_after(&mut self, index: usize) -> Vec<Rc<ScreenRecord>> {
        self.screens.split_off(index + 1)
    }
}

// ============================================================================
// Router State
// ============================================================================

/// Where the router is within a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RouterPhase {
    #[default]
    Idle,
    Resolving,
    Reusing,
    Creating,
    NotFound,
    Active,
}

/// What a navigation did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Same route, same arguments.
    Unchanged,
    /// Same route, new arguments delivered to the active screen.
    Refreshed,
    /// An existing instance was brought forward.
    Reused,
    /// A new instance was created.
    Created,
    /// Requested while another transition was running; it runs right after.
    Queued,
}

struct Resolved {
    key: RouteKey,
    entry: Rc<RouteEntry>,
    args: NavArgs,
    screen: UnitId,
}

/// Router bookkeeping held by the application context.
#[derive(Default)]
pub struct RouterState {
    phase: RouterPhase,
    last: Option<Resolved>,
    navigating: bool,
    queued: bool,
    transitions: u64,
}

impl RouterState {
    pub fn phase(&self) -> RouterPhase {
        self.phase
    }

    /// Completed transitions.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn current_key(&self) -> Option<RouteKey> {
        self.last.as_ref().map(|r| r.key.clone())
    }
}

fn set_phase(ctx: &AppContext, phase: RouterPhase) {
    ctx.router.borrow_mut().phase = phase;
    tracing::trace!(?phase, "router phase");
}

// ============================================================================
// Navigation
// ============================================================================

/// Transitions to the screen for the host's current location.
///
/// Transitions never interleave: a navigation requested while one is running
/// (a screen calling `goto` from `on_args`, say) is coalesced and replayed
/// against the location as it stands once the running one finishes.
pub(crate) fn navigate(ctx: &Rc<AppContext>, animate: bool) -> Result<Transition> {
    {
        let mut router = ctx.router.borrow_mut();
        if router.navigating {
            router.queued = true;
            tracing::debug!("navigation queued behind running transition");
            return Ok(Transition::Queued);
        }
        router.navigating = true;
    }

    let mut result = transition(ctx, animate);
    loop {
        let rerun = {
            let mut router = ctx.router.borrow_mut();
            let rerun = router.queued && result.is_ok();
            router.queued = false;
            if !rerun {
                router.navigating = false;
            }
            rerun
        };
        if !rerun {
            return result;
        }
        result = transition(ctx, animate);
    }
}

fn transition(ctx: &Rc<AppContext>, animate: bool) -> Result<Transition> {
    let location = ctx.host.location();
    let key = RouteKey::from_path(&location.path, &ctx.config.base_path);
    let args = NavArgs::from_query(&location.query);
    set_phase(ctx, RouterPhase::Resolving);

    let entry = match ctx.routes.resolve(&key) {
        Some(entry) => entry,
        None => {
            set_phase(ctx, RouterPhase::NotFound);
            match ctx.routes.not_found_entry() {
                Some(entry) => entry,
                None => {
                    set_phase(ctx, RouterPhase::Idle);
                    return Err(ShellError::NoRouteMatched(key.to_string()));
                }
            }
        }
    };

    let active = ctx.screens.borrow().active();
    let refresh = ctx
        .router
        .borrow()
        .last
        .as_ref()
        .filter(|last| last.key == key && Rc::ptr_eq(&last.entry, &entry))
        .filter(|last| {
            active
                .as_ref()
                .is_some_and(|a| a.id() == last.screen && !a.is_destroyed())
        })
        .map(|last| last.args == args);

    let (record, outcome) = match (refresh, active) {
        (Some(true), Some(active)) => {
            tracing::debug!(route = %key, "already active");
            (active, Transition::Unchanged)
        }
        (Some(false), Some(active)) => {
            active.deliver(&args);
            (active, Transition::Refreshed)
        }
        _ => {
            let cached = {
                let screens = ctx.screens.borrow();
                screens
                    .position(entry.screen_type)
                    .and_then(|index| screens.get(index).map(|record| (index, record)))
            };
            match cached {
                Some((index, record)) => {
                    reuse(ctx, index, &record, &key, &args);
                    (record, Transition::Reused)
                }
                None => (create(ctx, &entry, &key, &args, animate)?, Transition::Created),
            }
        }
    };

    finish(ctx, &record, key, entry, args);
    Ok(outcome)
}

fn reuse(
    ctx: &Rc<AppContext>,
    index: usize,
    record: &ScreenRecord,
    key: &RouteKey,
    args: &NavArgs,
) {
    set_phase(ctx, RouterPhase::Reusing);
    let stale = ctx.screens.borrow_mut().split_after(index);
    for screen in &stale {
        destroy_screen(ctx, screen);
    }
    *record.route.borrow_mut() = key.clone();
    record.deliver(args);
}

fn create(
    ctx: &Rc<AppContext>,
    entry: &RouteEntry,
    key: &RouteKey,
    args: &NavArgs,
    animate: bool,
) -> Result<Rc<ScreenRecord>> {
    set_phase(ctx, RouterPhase::Creating);
    let body = entry.construct();
    let mut registry = OverlayRegistry::new();
    body.overlays(&mut registry);

    let unit = Unit::new(ctx.next_id(), body, Capabilities::SCREEN);
    let record = Rc::new(ScreenRecord::new(unit, entry.screen_type, key.clone(), registry));
    ctx.screens.borrow_mut().push(record.clone());

    let id = record.id();
    ctx.host
        .attach(id, AttachPoint::Screens, record.unit.lifecycle.isolation());
    if animate {
        ctx.host.set_attribute(id, attrs::ENTER, Some(""));
    }
    if let Err(e) = lifecycle::mount(ctx, &record.unit) {
        ctx.screens.borrow_mut().remove(id);
        lifecycle::destroy(ctx.host.as_ref(), &record.unit);
        set_phase(ctx, RouterPhase::Idle);
        tracing::warn!(screen = record.name(), unit = %id, error = %e, "screen mount failed");
        return Err(e);
    }
    record.deliver(args);
    Ok(record)
}

fn finish(
    ctx: &AppContext,
    record: &ScreenRecord,
    key: RouteKey,
    entry: Rc<RouteEntry>,
    args: NavArgs,
) {
    let title = match record.title() {
        Some(title) => format!("{}{}{}", title, TITLE_SEPARATOR, ctx.config.app_name),
        None => ctx.config.app_name.clone(),
    };
    ctx.host.set_title(&title);
    ctx.state.title.set(title);
    ctx.state.route.set(key.to_string());

    let mut router = ctx.router.borrow_mut();
    router.phase = RouterPhase::Active;
    router.transitions += 1;
    tracing::debug!(route = %key, screen = record.name(), "transition complete");
    router.last = Some(Resolved {
        key,
        entry,
        args,
        screen: record.id(),
    });
}

/// Destroys a screen together with its overlays.
pub(crate) fn destroy_screen(ctx: &AppContext, record: &ScreenRecord) {
    let overlays = std::mem::take(&mut *record.overlays.borrow_mut());
    for overlay in &overlays {
        lifecycle::destroy(ctx.host.as_ref(), &overlay.unit);
    }
    lifecycle::destroy(ctx.host.as_ref(), &record.unit);
    tracing::debug!(screen = record.name(), unit = %record.id(), "screen destroyed");
}

/// Updates the location for `path` (relative to the base path) and navigates.
///
/// `path` may carry its own query and fragment; explicit `args` replace the
/// query.
pub(crate) fn goto(
    ctx: &Rc<AppContext>,
    path: &str,
    args: Option<&NavArgs>,
    replace: bool,
) -> Result<Transition> {
    let target = Location::parse(path);
    let location = Location {
        path: RouteKey::new(&target.path).to_path(&ctx.config.base_path),
        query: args.map_or(target.query, NavArgs::to_query),
        fragment: target.fragment,
    };
    let url = location.to_url();
    if replace {
        ctx.host.replace_url(&url);
    } else {
        ctx.host.push_url(&url);
    }
    navigate(ctx, true)
}

/// Goes back in history, or to the parent route when there is no history.
///
/// With history the host reports the result through a pop-state event and
/// `None` is returned.
pub(crate) fn back(ctx: &Rc<AppContext>) -> Result<Option<Transition>> {
    if ctx.host.history_has_state() {
        ctx.host.history_back();
        return Ok(None);
    }
    let current = RouteKey::from_path(&ctx.host.location().path, &ctx.config.base_path);
    match current.parent() {
        Some(parent) => {
            tracing::debug!(from = %current, to = %parent, "no history, going to parent route");
            goto(ctx, parent.as_str(), None, true).map(Some)
        }
        None => Ok(None),
    }
}
