//! Fragment-driven modal overlays.
//!
//! The URL fragment names at most one overlay on the active screen:
//! `#token?key=value`, where each value is JSON-encoded. Changing the
//! fragment tears the current overlay down and builds the new one from the
//! factory the screen registered for the token.

use std::rc::{Rc, Weak};

use crate::app::AppContext;
use crate::components::Component;
use crate::config::attrs;
use crate::core::error::{Result, ShellError};
use crate::core::fixed;
use crate::core::lifecycle::{self, Unit};
use crate::core::router::ScreenRecord;
use crate::host::AttachPoint;
use crate::models::{Capabilities, FixedVisibility, NavArgs, UnitId};
use crate::utils::frame::{RaceResult, frames, race_event};
use crate::utils::url::decode_component;

/// An overlay attached to a screen.
#[derive(Clone)]
pub struct OverlayRecord {
    pub unit: Unit<dyn Component>,
    /// Fragment token it was opened for; `None` when opened directly.
    pub token: Option<String>,
}

/// Fragment bookkeeping, keyed by the screen it was processed against.
#[derive(Debug, Default)]
pub struct ModalState {
    last: Option<(UnitId, String)>,
}

impl ModalState {
    /// Fragment most recently processed.
    pub fn last_fragment(&self) -> Option<&str> {
        self.last.as_ref().map(|(_, fragment)| fragment.as_str())
    }
}

/// A parsed overlay fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalRequest {
    pub token: String,
    pub args: NavArgs,
}

impl ModalRequest {
    /// Splits `token?k=v` (leading `#` optional). Values are JSON-decoded,
    /// falling back to the raw string.
    pub fn parse(fragment: &str) -> Self {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let (token, query) = fragment.split_once('?').unwrap_or((fragment, ""));
        Self {
            token: decode_component(token),
            args: NavArgs::from_modal_query(query),
        }
    }
}

/// What a fragment sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalOutcome {
    /// Fragment already processed, or no screen is active yet.
    Unchanged,
    /// An overlay for this token is already open.
    AlreadyOpen,
    /// Empty token: overlays closed.
    Closed,
    /// The active screen has no factory for the token.
    Unregistered,
    /// The factory declined to build an overlay.
    Declined,
    Opened(UnitId),
}

/// Brings the overlay stack in line with the current fragment.
pub(crate) fn sync(ctx: &Rc<AppContext>) -> Result<ModalOutcome> {
    let Some(screen) = ctx.screens.borrow().active() else {
        return Ok(ModalOutcome::Unchanged);
    };
    let fragment = ctx.host.location().fragment;
    let fragment = {
        let mut modal = ctx.modal.borrow_mut();
        let current = (screen.id(), fragment);
        if modal.last.as_ref() == Some(&current) {
            return Ok(ModalOutcome::Unchanged);
        }
        modal.last = Some(current.clone());
        current.1
    };
    let request = ModalRequest::parse(&fragment);

    if !request.token.is_empty() && screen.live_overlay(&request.token).is_some() {
        fixed::hide(ctx);
        return Ok(ModalOutcome::AlreadyOpen);
    }

    let open: Vec<OverlayRecord> = screen.overlays.borrow().clone();
    for overlay in &open {
        teardown(ctx, &screen, overlay);
    }

    if request.token.is_empty() {
        fixed::show(ctx);
        return Ok(ModalOutcome::Closed);
    }

    let factory = screen.registry().get(&request.token);
    let Some(factory) = factory else {
        tracing::debug!(token = %request.token, screen = screen.name(), "no overlay registered");
        settle_fixed(ctx, &screen);
        return Ok(ModalOutcome::Unregistered);
    };
    let Some(body) = factory(&request.args) else {
        if ctx.config.strict_modal_factories {
            settle_fixed(ctx, &screen);
            return Err(ShellError::NullOverlay(request.token));
        }
        tracing::debug!(token = %request.token, "overlay factory declined");
        settle_fixed(ctx, &screen);
        return Ok(ModalOutcome::Declined);
    };

    let opened = attach(ctx, &screen, body, Some(request.token));
    if opened.is_err() {
        ctx.modal.borrow_mut().last = None;
    }
    opened.map(ModalOutcome::Opened)
}

/// Attaches an overlay under the active screen without fragment bookkeeping.
pub(crate) fn open_overlay(ctx: &Rc<AppContext>, body: Box<dyn Component>) -> Result<UnitId> {
    let screen = ctx.screens.borrow().active().ok_or(ShellError::NoActiveScreen)?;
    attach(ctx, &screen, body, None)
}

/// Starts tearing the overlay down. Returns `false` if it is unknown or
/// already on its way out.
pub(crate) fn remove_overlay(ctx: &Rc<AppContext>, unit: UnitId) -> bool {
    let found = ctx.screens.borrow().all().into_iter().find_map(|screen| {
        let overlay = screen
            .overlays
            .borrow()
            .iter()
            .find(|o| o.unit.id() == unit)
            .cloned();
        overlay.map(|o| (screen, o))
    });
    let Some((screen, overlay)) = found else {
        return false;
    };
    let started = teardown(ctx, &screen, &overlay);
    if started {
        settle_fixed(ctx, &screen);
    }
    started
}

fn attach(
    ctx: &Rc<AppContext>,
    screen: &Rc<ScreenRecord>,
    body: Box<dyn Component>,
    token: Option<String>,
) -> Result<UnitId> {
    let unit: Unit<dyn Component> = Unit::new(ctx.next_id(), body, Capabilities::OVERLAY);
    let id = unit.id();
    if unit.lifecycle.capabilities().fixed_visibility == FixedVisibility::HideWhileOpen {
        fixed::hide(ctx);
    }

    ctx.host
        .attach(id, AttachPoint::Overlays(screen.id()), unit.lifecycle.isolation());
    if let Some(token) = &token {
        ctx.host.set_attribute(id, attrs::MODAL_TOKEN, Some(token));
    }
    ctx.host
        .set_attribute(id, attrs::MODAL_TYPE, Some(unit.lifecycle.name()));
    screen.overlays.borrow_mut().push(OverlayRecord {
        unit: unit.clone(),
        token,
    });
    tracing::debug!(
        overlay = unit.lifecycle.name(),
        unit = %id,
        screen = screen.name(),
        "overlay opened"
    );

    if let Err(e) = lifecycle::mount(ctx, &unit) {
        screen.overlays.borrow_mut().retain(|o| o.unit.id() != id);
        lifecycle::destroy(ctx.host.as_ref(), &unit);
        settle_fixed(ctx, screen);
        tracing::warn!(unit = %id, error = %e, "overlay mount failed");
        return Err(e);
    }
    Ok(id)
}

/// Marks the overlay destroyed and removes its root once its exit animation
/// has run, or after a short frame timeout if none starts.
fn teardown(ctx: &Rc<AppContext>, screen: &Rc<ScreenRecord>, overlay: &OverlayRecord) -> bool {
    let lifecycle = overlay.unit.lifecycle.clone();
    if !lifecycle.begin_removal() {
        return false;
    }
    lifecycle.destroy();
    let id = overlay.unit.id();
    ctx.host.set_attribute(id, attrs::DESTROYED, Some(""));

    let host = ctx.host.clone();
    let timeout = ctx.config.destroy_timeout_frames;
    let screen: Weak<ScreenRecord> = Rc::downgrade(screen);
    ctx.host.spawn(Box::pin(async move {
        let started = host.animation_started(id);
        if race_event(started, frames(host.clone(), timeout)).await == RaceResult::Event {
            host.animation_finished(id).await;
        }
        host.detach(id);
        if let Some(screen) = screen.upgrade() {
            screen.overlays.borrow_mut().retain(|o| o.unit.id() != id);
        }
        tracing::debug!(unit = %id, "overlay removed");
    }));
    true
}

/// Shows fixed regions again once no overlay is left open on `screen`.
fn settle_fixed(ctx: &Rc<AppContext>, screen: &ScreenRecord) {
    if screen.live_overlays().is_empty() && ctx.fixed.borrow().is_hidden() {
        fixed::show(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{OverlayRegistry, Screen, Setup, ready};
    use crate::config::ShellConfig;
    use crate::core::{SetupContext, router};
    use crate::host::{Host, MemoryHost};
    use crate::models::{Anchor, Rect, RouteTable};
    use serde_json::json;
    use std::cell::RefCell;

    struct Cart;
    impl Component for Cart {}

    struct Shop(Rc<RefCell<Vec<NavArgs>>>);
    impl Component for Shop {}
    impl Screen for Shop {
        fn overlays(&self, registry: &mut OverlayRegistry) {
            let seen = self.0.clone();
            registry.register("checkout", move |args| {
                seen.borrow_mut().push(args.clone());
                Some(Box::new(Cart) as Box<dyn Component>)
            });
            registry.register("declined", |_| None);
            registry.register("broken", |_| Some(Box::new(BrokenPanel) as Box<dyn Component>));
        }
    }

    struct BrokenPanel;
    impl Component for BrokenPanel {
        fn setup(&mut self, cx: &mut SetupContext<'_>) -> Result<Setup> {
            cx.require("#panel")?;
            Ok(ready())
        }
    }

    fn context(
        host: &Rc<MemoryHost>,
        config: ShellConfig,
    ) -> (Rc<AppContext>, Rc<RefCell<Vec<NavArgs>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let shared = seen.clone();
        let mut routes = RouteTable::new();
        routes.route("/", move || Shop(shared.clone())).unwrap();
        let ctx = AppContext::new(host.clone(), config, routes).unwrap();
        router::navigate(&ctx, false).unwrap();
        (ctx, seen)
    }

    fn active(ctx: &AppContext) -> Rc<ScreenRecord> {
        ctx.screens.borrow().active().unwrap()
    }

    #[test]
    fn test_parse_fragment() {
        let request = ModalRequest::parse("#checkout?qty=2&note=%22gift%22&raw=abc");
        assert_eq!(request.token, "checkout");
        assert_eq!(request.args.get("qty"), Some(&json!(2)));
        assert_eq!(request.args.get_str("note"), Some("gift"));
        assert_eq!(request.args.get_str("raw"), Some("abc"));

        assert_eq!(ModalRequest::parse("").token, "");
    }

    #[test]
    fn test_fragment_opens_overlay_with_args() {
        let host = Rc::new(MemoryHost::new());
        let (ctx, seen) = context(&host, ShellConfig::default());

        host.visit("/#checkout?qty=2");
        let outcome = sync(&ctx).unwrap();
        let ModalOutcome::Opened(id) = outcome else {
            panic!("expected an overlay, got {outcome:?}");
        };
        assert_eq!(seen.borrow()[0].get_i64("qty"), Some(2));
        assert_eq!(host.attribute(id, attrs::MODAL_TOKEN).as_deref(), Some("checkout"));
        assert_eq!(host.attribute(id, attrs::MODAL_TYPE).as_deref(), Some("Cart"));
        assert_eq!(host.children(AttachPoint::Overlays(active(&ctx).id())), vec![id]);
        assert!(ctx.fixed.borrow().is_hidden());

        // Same fragment again is ignored
        assert_eq!(sync(&ctx), Ok(ModalOutcome::Unchanged));
    }

    #[test]
    fn test_reopening_open_token_keeps_overlay() {
        let host = Rc::new(MemoryHost::new());
        let (ctx, seen) = context(&host, ShellConfig::default());
        host.visit("/#checkout?qty=1");
        sync(&ctx).unwrap();
        host.visit("/#checkout?qty=3");
        assert_eq!(sync(&ctx), Ok(ModalOutcome::AlreadyOpen));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(active(&ctx).live_overlays().len(), 1);
    }

    #[test]
    fn test_empty_fragment_closes_after_timeout() {
        let host = Rc::new(MemoryHost::new());
        let (ctx, _) = context(&host, ShellConfig::default());
        host.visit("/#checkout");
        let Ok(ModalOutcome::Opened(id)) = sync(&ctx) else {
            panic!("overlay not opened");
        };

        host.visit("/");
        assert_eq!(sync(&ctx), Ok(ModalOutcome::Closed));
        assert!(host.has_attribute(id, attrs::DESTROYED));
        assert!(host.is_attached(id));
        assert!(!ctx.fixed.borrow().is_hidden());

        host.advance_frames(2);
        assert!(!host.is_attached(id));
        assert!(active(&ctx).overlays.borrow().is_empty());
    }

    #[test]
    fn test_animated_teardown_waits_for_animation_end() {
        let host = Rc::new(MemoryHost::new());
        host.enable_animations(true);
        let (ctx, _) = context(&host, ShellConfig::default());
        host.visit("/#checkout");
        let Ok(ModalOutcome::Opened(id)) = sync(&ctx) else {
            panic!("overlay not opened");
        };
        host.visit("/");
        sync(&ctx).unwrap();
        host.run_until_stalled();
        assert!(!host.is_attached(id));
    }

    #[test]
    fn test_unregistered_and_declined_tokens() {
        let host = Rc::new(MemoryHost::new());
        let (ctx, _) = context(&host, ShellConfig::default());
        host.visit("/#section-2");
        assert_eq!(sync(&ctx), Ok(ModalOutcome::Unregistered));
        host.visit("/#declined");
        assert_eq!(sync(&ctx), Ok(ModalOutcome::Declined));
        assert!(active(&ctx).live_overlays().is_empty());

        let host = Rc::new(MemoryHost::new());
        let config = ShellConfig {
            strict_modal_factories: true,
            ..ShellConfig::default()
        };
        let (ctx, _) = context(&host, config);
        host.visit("/#declined");
        assert_eq!(sync(&ctx), Err(ShellError::NullOverlay("declined".into())));
    }

    #[test]
    fn test_remove_overlay_is_idempotent() {
        let host = Rc::new(MemoryHost::new());
        let (ctx, _) = context(&host, ShellConfig::default());
        let bar = UnitId(999);
        host.attach(bar, AttachPoint::Chrome, Default::default());
        host.set_rect(bar, Rect::new(320.0, 40.0));
        ctx.fixed.borrow_mut().register(Anchor::Bottom, bar, None);
        fixed::start(&ctx);
        host.advance_frames(1);
        assert_eq!(host.layout_var("--fixed-inset-bottom").as_deref(), Some("40px"));

        let id = open_overlay(&ctx, Box::new(Cart)).unwrap();
        assert_eq!(host.layout_var("--fixed-inset-bottom").as_deref(), Some("0px"));
        assert!(host.attribute(id, attrs::MODAL_TOKEN).is_none());

        assert!(remove_overlay(&ctx, id));
        assert!(!remove_overlay(&ctx, id));
        assert_eq!(host.layout_var("--fixed-inset-bottom").as_deref(), Some("40px"));
        host.advance_frames(2);
        assert!(!host.is_attached(id));
        assert!(!remove_overlay(&ctx, id));
    }

    #[test]
    fn test_open_overlay_needs_active_screen() {
        let host = Rc::new(MemoryHost::new());
        let mut routes = RouteTable::new();
        routes.route("/", || Shop(Rc::default())).unwrap();
        let ctx = AppContext::new(host.clone(), ShellConfig::default(), routes).unwrap();
        assert_eq!(open_overlay(&ctx, Box::new(Cart)).err(), Some(ShellError::NoActiveScreen));
    }

    #[test]
    fn test_failed_overlay_mount_is_unwound() {
        let host = Rc::new(MemoryHost::new());
        let (ctx, _) = context(&host, ShellConfig::default());
        let bar = UnitId(999);
        host.attach(bar, AttachPoint::Chrome, Default::default());
        host.set_rect(bar, Rect::new(320.0, 40.0));
        ctx.fixed.borrow_mut().register(Anchor::Bottom, bar, None);
        fixed::start(&ctx);
        host.advance_frames(1);

        let result = open_overlay(&ctx, Box::new(BrokenPanel));
        assert!(matches!(result, Err(ShellError::RequiredChildMissing { .. })));
        let screen = active(&ctx);
        assert!(screen.overlays.borrow().is_empty());
        assert!(host.children(AttachPoint::Overlays(screen.id())).is_empty());
        assert!(!ctx.fixed.borrow().is_hidden());
        assert_eq!(host.layout_var("--fixed-inset-bottom").as_deref(), Some("40px"));

        // The fragment is not remembered, so the same fragment is retried
        host.visit("/#broken");
        assert!(sync(&ctx).is_err());
        assert!(sync(&ctx).is_err());
        assert!(screen.overlays.borrow().is_empty());
    }
}
