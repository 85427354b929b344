//! Root application module.
//!
//! Contains [`AppContext`] (every piece of process-wide shell state),
//! the reactive [`ShellState`] façade and [`AppShell`], the handle
//! applications and hosts drive the engine through.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;

use crate::components::Component;
use crate::config::{ShellConfig, attrs};
use crate::core::error::{ErrorChannel, Result, ShellError};
use crate::core::fixed::{self, FixedRegions};
use crate::core::layout::LayoutCache;
use crate::core::lifecycle::{self, StyleScopes, Unit};
use crate::core::modal::{self, ModalOutcome, ModalState};
use crate::core::router::{self, RouterPhase, RouterState, ScreenCache, ScreenRecord, Transition};
use crate::host::{AttachPoint, Host};
use crate::models::{Anchor, Capabilities, Insets, NavArgs, RouteTable, Theme, UnitId};

// ============================================================================
// ShellState
// ============================================================================

/// Shell state exposed as Leptos signals.
///
/// # Note
///
/// This struct is `Copy` because all fields are Leptos signals, which are
/// cheap to copy.
#[derive(Clone, Copy)]
pub struct ShellState {
    /// Document title, including the application name.
    pub title: RwSignal<String>,
    /// Current color scheme.
    pub theme: RwSignal<Theme>,
    /// Insets most recently published by the fixed-region tracker.
    pub insets: RwSignal<Insets>,
    /// Canonical key of the active route (`/` for the default).
    pub route: RwSignal<String>,
}

impl ShellState {
    pub fn new(app_name: &str) -> Self {
        Self {
            title: RwSignal::new(app_name.to_string()),
            theme: RwSignal::new(Theme::default()),
            insets: RwSignal::new(Insets::ZERO),
            route: RwSignal::new(String::new()),
        }
    }
}

// ============================================================================
// AppContext
// ============================================================================

/// Process-wide shell state.
///
/// # Architecture
///
/// Each engine module owns one slice and receives the whole context:
/// - **Router**: route table, router state, screen cache
/// - **Modal**: fragment bookkeeping (open overlays live on their screen)
/// - **Fixed regions**: registered regions and the measuring loop
/// - **Lifecycle**: layout cache, document stylesheet scopes, unit ids
///
/// Borrows of the cells are never held across application callbacks.
pub struct AppContext {
    pub(crate) host: Rc<dyn Host>,
    pub(crate) config: ShellConfig,
    pub(crate) routes: RouteTable,
    pub(crate) router: RefCell<RouterState>,
    pub(crate) screens: RefCell<ScreenCache>,
    pub(crate) modal: RefCell<ModalState>,
    pub(crate) fixed: RefCell<FixedRegions>,
    pub(crate) layouts: RefCell<LayoutCache>,
    pub(crate) styles: RefCell<StyleScopes>,
    pub(crate) chrome: RefCell<Vec<Unit<dyn Component>>>,
    pub(crate) errors: ErrorChannel,
    pub(crate) state: ShellState,
    next_id: Cell<u64>,
}

impl AppContext {
    /// Validates `config` and `routes` and creates the context.
    pub fn new(host: Rc<dyn Host>, config: ShellConfig, routes: RouteTable) -> Result<Rc<Self>> {
        Self::build(host, config, routes).map(Rc::new)
    }

    pub(crate) fn build(
        host: Rc<dyn Host>,
        config: ShellConfig,
        routes: RouteTable,
    ) -> Result<Self> {
        config.validate()?;
        routes.validate()?;
        let state = ShellState::new(&config.app_name);
        Ok(Self {
            host,
            config,
            routes,
            router: RefCell::new(RouterState::default()),
            screens: RefCell::new(ScreenCache::new()),
            modal: RefCell::new(ModalState::default()),
            fixed: RefCell::new(FixedRegions::new()),
            layouts: RefCell::new(LayoutCache::new()),
            styles: RefCell::new(StyleScopes::new()),
            chrome: RefCell::new(Vec::new()),
            errors: ErrorChannel::new(),
            state,
            next_id: Cell::new(0),
        })
    }

    /// Allocates the next unit id.
    pub(crate) fn next_id(&self) -> UnitId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        UnitId(id)
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn state(&self) -> ShellState {
        self.state
    }
}

// ============================================================================
// AppShell
// ============================================================================

/// Handle to a running shell. Cheap to clone; every clone drives the same
/// context.
#[derive(Clone)]
pub struct AppShell {
    ctx: Rc<AppContext>,
}

impl AppShell {
    /// Creates a shell. Configuration and route table errors surface here.
    pub fn new(host: Rc<dyn Host>, config: ShellConfig, routes: RouteTable) -> Result<Self> {
        Ok(Self {
            ctx: AppContext::new(host, config, routes)?,
        })
    }

    pub fn context(&self) -> &Rc<AppContext> {
        &self.ctx
    }

    pub fn state(&self) -> ShellState {
        self.ctx.state
    }

    pub fn phase(&self) -> RouterPhase {
        self.ctx.router.borrow().phase()
    }

    // --- startup ---

    /// Waits for the host's preload signal, then shows the first screen
    /// (without the enter animation unless configured), starts tracking
    /// fixed regions and applies the initial fragment.
    pub async fn start(&self) -> Result<Transition> {
        self.ctx.host.preload_ready().await;
        let transition = router::navigate(&self.ctx, self.ctx.config.animate_initial)?;
        fixed::start(&self.ctx);
        modal::sync(&self.ctx)?;
        tracing::debug!(app = %self.ctx.config.app_name, "shell started");
        Ok(transition)
    }

    /// Runs [`AppShell::start`] on the host executor, reporting failure to
    /// the error channel.
    pub fn launch(&self) {
        let shell = self.clone();
        self.ctx.host.spawn(Box::pin(async move {
            if let Err(e) = shell.start().await {
                shell.report(e);
            }
        }));
    }

    // --- navigation ---

    /// Navigates to `path` (relative to the base path). Explicit `args`
    /// replace any query in `path`.
    pub fn goto(&self, path: &str, args: Option<&NavArgs>, replace: bool) -> Result<Transition> {
        let transition = router::goto(&self.ctx, path, args, replace)?;
        modal::sync(&self.ctx)?;
        Ok(transition)
    }

    /// Goes back. Without history, replaces the location with the parent
    /// route; with history the host follows up with a pop-state event.
    pub fn back(&self) -> Result<Option<Transition>> {
        let transition = router::back(&self.ctx)?;
        if transition.is_some() {
            modal::sync(&self.ctx)?;
        }
        Ok(transition)
    }

    /// Browser history moved.
    pub fn handle_popstate(&self) -> Result<Transition> {
        let transition = router::navigate(&self.ctx, true)?;
        modal::sync(&self.ctx)?;
        Ok(transition)
    }

    /// The URL fragment changed.
    pub fn handle_hashchange(&self) -> Result<ModalOutcome> {
        modal::sync(&self.ctx)
    }

    pub fn active_screen(&self) -> Option<Rc<ScreenRecord>> {
        self.ctx.screens.borrow().active()
    }

    /// Attached screens, oldest first.
    pub fn screens(&self) -> Vec<Rc<ScreenRecord>> {
        self.ctx.screens.borrow().all()
    }

    // --- overlays ---

    /// Registers an overlay factory on the active screen. Returns `false`
    /// when no screen is active yet.
    pub fn register_overlay<F>(&self, token: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&NavArgs) -> Option<Box<dyn Component>> + 'static,
    {
        match self.active_screen() {
            Some(screen) => {
                screen.register_overlay(token, factory);
                true
            }
            None => false,
        }
    }

    /// Opens an overlay on the active screen without touching the fragment.
    pub fn open_overlay(&self, overlay: impl Component) -> Result<UnitId> {
        modal::open_overlay(&self.ctx, Box::new(overlay))
    }

    /// Tears an overlay down. Calling it again for the same overlay does
    /// nothing and returns `false`.
    pub fn remove_overlay(&self, overlay: UnitId) -> bool {
        modal::remove_overlay(&self.ctx, overlay)
    }

    // --- fixed regions ---

    /// Attaches `component` as shell chrome docked to `anchor` and tracks it
    /// as a fixed region.
    pub fn attach_fixed(
        &self,
        anchor: Anchor,
        component: impl Component,
        selector: Option<&str>,
    ) -> Result<UnitId> {
        let unit: Unit<dyn Component> = Unit::new(
            self.ctx.next_id(),
            Box::new(component),
            Capabilities::COMPONENT,
        );
        let id = unit.id();
        self.ctx.chrome.borrow_mut().push(unit.clone());
        lifecycle::attach(&self.ctx, &unit, AttachPoint::Chrome)?;
        self.register_fixed_region(anchor, id, selector);
        Ok(id)
    }

    /// Tracks an already attached unit as a fixed region.
    pub fn register_fixed_region(&self, anchor: Anchor, unit: UnitId, selector: Option<&str>) {
        self.ctx
            .fixed
            .borrow_mut()
            .register(anchor, unit, selector.map(str::to_string));
        fixed::tick(&self.ctx);
    }

    pub fn unregister_fixed_region(&self, unit: UnitId) -> bool {
        let removed = self.ctx.fixed.borrow_mut().unregister(unit);
        if removed {
            fixed::tick(&self.ctx);
        }
        removed
    }

    /// Stops tracking every region registered under `selector`.
    pub fn unregister_fixed_selector(&self, selector: &str) -> usize {
        let removed = self.ctx.fixed.borrow_mut().unregister_selector(selector);
        if removed > 0 {
            fixed::tick(&self.ctx);
        }
        removed
    }

    pub fn hide_fixed_regions(&self) {
        fixed::hide(&self.ctx);
    }

    pub fn show_fixed_regions(&self) {
        fixed::show(&self.ctx);
    }

    // --- document ---

    pub fn set_theme(&self, theme: Theme) {
        let value = match theme {
            Theme::System => None,
            other => Some(other.as_str()),
        };
        self.ctx.host.set_document_attribute(attrs::THEME, value);
        self.ctx.state.theme.set(theme);
    }

    // --- errors ---

    /// Installs the application-wide error handler.
    pub fn on_error(&self, hook: impl Fn(&ShellError) + 'static) {
        self.ctx.errors.set_hook(hook);
    }

    /// Routes an error raised outside a synchronous call to the error channel.
    pub fn report(&self, error: ShellError) {
        self.ctx.errors.report(error);
    }

    /// Errors reported so far, oldest first.
    pub fn errors(&self) -> Vec<ShellError> {
        self.ctx.errors.errors()
    }
}
