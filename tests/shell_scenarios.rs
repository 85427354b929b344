//! End-to-end shell scenarios driven through the in-memory host.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use appshell::config::INSET_VARS;
use appshell::core::lifecycle::MountGuard;
use appshell::{
    Anchor, AppShell, AttachPoint, Component, Host, MemoryHost, ModalOutcome, NavArgs,
    OverlayRegistry, RouteTable, Screen, SetupContext, ShellConfig, ShellError, Transition,
};
use leptos::prelude::GetUntracked;
use serde_json::json;

type Log = Rc<RefCell<Vec<NavArgs>>>;

struct Home;
impl Component for Home {}
impl Screen for Home {
    fn title(&self) -> Option<String> {
        Some("Home".into())
    }
}

/// Records every argument delivery.
struct Catalog(Log);
impl Component for Catalog {}
impl Screen for Catalog {
    fn on_args(&mut self, args: &NavArgs) {
        self.0.borrow_mut().push(args.clone());
    }
}

/// Offers a checkout overlay and records the modal arguments it was built with.
struct Shop(Log);
impl Component for Shop {}
impl Screen for Shop {
    fn overlays(&self, registry: &mut OverlayRegistry) {
        let seen = self.0.clone();
        registry.register("checkout", move |args| {
            seen.borrow_mut().push(args.clone());
            Some(Box::new(Checkout) as Box<dyn Component>)
        });
    }
}

struct Checkout;
impl Component for Checkout {}

struct TabBar;
impl Component for TabBar {}

struct Filters;
impl Component for Filters {}

/// Setup fails: the required child is never rendered.
struct Broken;
impl Component for Broken {
    fn setup(&mut self, cx: &mut SetupContext<'_>) -> appshell::Result<appshell::Setup> {
        cx.require("#content")?;
        Ok(appshell::ready())
    }
}
impl Screen for Broken {}

struct Fixture {
    host: Rc<MemoryHost>,
    shell: AppShell,
    deliveries: Log,
    checkouts: Log,
}

fn fixture(url: &str) -> Fixture {
    let host = Rc::new(MemoryHost::with_url(url));
    let deliveries: Log = Rc::default();
    let checkouts: Log = Rc::default();

    let mut routes = RouteTable::new();
    let catalog_log = deliveries.clone();
    let shop_log = checkouts.clone();
    routes
        .route("/", || Home)
        .unwrap()
        .route("/catalog", move || Catalog(catalog_log.clone()))
        .unwrap()
        .route("/shop", move || Shop(shop_log.clone()))
        .unwrap();

    let shell = AppShell::new(host.clone(), ShellConfig::named("Store"), routes).unwrap();
    Fixture {
        host,
        shell,
        deliveries,
        checkouts,
    }
}

fn live_counts(shell: &AppShell) -> HashMap<TypeId, usize> {
    let mut counts = HashMap::new();
    for screen in shell.screens().iter().filter(|s| !s.is_destroyed()) {
        *counts.entry(screen.screen_type).or_insert(0) += 1;
    }
    counts
}

#[tokio::test]
async fn test_screen_types_stay_unique_under_interleaved_navigation() {
    let f = fixture("/");
    f.shell.start().await.unwrap();

    let steps = [
        "/catalog",
        "/shop",
        "/",
        "/shop?x=1",
        "/catalog",
        "/shop",
        "/catalog?page=2",
        "/",
    ];
    for step in steps {
        f.shell.goto(step, None, false).unwrap();
        f.host.run_until_stalled();
        assert!(live_counts(&f.shell).values().all(|&n| n == 1), "after {step}");
    }

    // History replays interleave with pushes
    f.shell.back().unwrap();
    f.shell.handle_popstate().unwrap();
    f.shell.back().unwrap();
    f.shell.handle_popstate().unwrap();
    f.shell.goto("/shop", None, false).unwrap();
    assert!(live_counts(&f.shell).values().all(|&n| n == 1));
    assert!(f.shell.screens().len() <= 3);
}

#[tokio::test]
async fn test_same_route_same_args_keeps_identity() {
    let f = fixture("/catalog?page=1");
    assert_eq!(f.shell.start().await, Ok(Transition::Created));
    let first = f.shell.active_screen().unwrap();

    assert_eq!(f.shell.goto("/catalog?page=1", None, false), Ok(Transition::Unchanged));
    let second = f.shell.active_screen().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(f.deliveries.borrow().len(), 1);
}

#[tokio::test]
async fn test_same_route_new_args_redelivers() {
    let f = fixture("/catalog?page=1");
    f.shell.start().await.unwrap();
    let first = f.shell.active_screen().unwrap();

    let args = NavArgs::new().with("page", "2");
    assert_eq!(f.shell.goto("/catalog", Some(&args), false), Ok(Transition::Refreshed));
    assert!(Rc::ptr_eq(&first, &f.shell.active_screen().unwrap()));

    let deliveries = f.deliveries.borrow();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[1].get_str("page"), Some("2"));
    assert_eq!(first.args().get_i64("page"), Some(2));
}

#[tokio::test]
async fn test_fragment_opens_overlay_with_decoded_args() {
    let f = fixture("/shop");
    f.shell.start().await.unwrap();

    f.host.visit("/shop#checkout?qty=2");
    let outcome = f.shell.handle_hashchange().unwrap();
    assert!(matches!(outcome, ModalOutcome::Opened(_)));
    assert_eq!(f.checkouts.borrow()[0].get("qty"), Some(&json!(2)));

    let screen = f.shell.active_screen().unwrap();
    assert_eq!(screen.live_overlays().len(), 1);
    assert_eq!(f.host.layout_var("--fixed-inset-bottom").as_deref(), Some("0px"));
}

#[tokio::test]
async fn test_missing_route_without_handler_is_fatal() {
    let f = fixture("/missing");
    assert_eq!(
        f.shell.start().await,
        Err(ShellError::NoRouteMatched("/missing".into()))
    );
    assert!(f.shell.active_screen().is_none());
}

#[tokio::test]
async fn test_missing_route_with_handler_shows_not_found() {
    struct NotFound;
    impl Component for NotFound {}
    impl Screen for NotFound {
        fn title(&self) -> Option<String> {
            Some("Not found".into())
        }
    }

    let host = Rc::new(MemoryHost::with_url("/missing"));
    let mut routes = RouteTable::new();
    routes.route("/", || Home).unwrap();
    routes.not_found(|| NotFound).unwrap();
    let shell = AppShell::new(host.clone(), ShellConfig::named("Store"), routes).unwrap();

    assert_eq!(shell.start().await, Ok(Transition::Created));
    assert_eq!(host.title(), "Not found — Store");
    assert_eq!(
        shell.active_screen().unwrap().screen_type,
        TypeId::of::<NotFound>()
    );
}

#[tokio::test]
async fn test_fixed_region_insets_follow_visibility() {
    let f = fixture("/");
    f.shell.start().await.unwrap();

    let bar = f.shell.attach_fixed(Anchor::Bottom, TabBar, Some("tab-bar")).unwrap();
    f.host.set_rect(bar, appshell::models::Rect::new(320.0, 40.0));
    f.host.advance_frames(1);

    let read = |host: &MemoryHost| -> Vec<String> {
        INSET_VARS
            .iter()
            .map(|name| host.layout_var(name).unwrap_or_default())
            .collect()
    };
    assert_eq!(read(&f.host), ["0px", "0px", "40px", "0px"]);
    assert_eq!(f.shell.state().insets.get_untracked().bottom, 40.0);

    f.shell.hide_fixed_regions();
    assert_eq!(read(&f.host), ["0px", "0px", "0px", "0px"]);
    f.host.advance_frames(3);
    assert_eq!(read(&f.host), ["0px", "0px", "0px", "0px"]);

    f.shell.show_fixed_regions();
    assert_eq!(read(&f.host), ["0px", "0px", "40px", "0px"]);

    // Unchanged measurements are not rewritten
    let writes = f.host.layout_writes();
    f.host.advance_frames(5);
    assert_eq!(f.host.layout_writes(), writes);

    assert_eq!(f.shell.unregister_fixed_selector("tab-bar"), 1);
    assert_eq!(read(&f.host)[2], "0px");
}

#[tokio::test]
async fn test_remove_overlay_twice_is_a_noop() {
    let f = fixture("/");
    f.shell.start().await.unwrap();

    let overlay = f.shell.open_overlay(Checkout).unwrap();
    assert!(f.shell.remove_overlay(overlay));
    assert!(!f.shell.remove_overlay(overlay));

    f.host.advance_frames(2);
    assert!(!f.host.is_attached(overlay));
    assert!(!f.shell.remove_overlay(overlay));
    assert!(f.shell.errors().is_empty());
}

#[tokio::test]
async fn test_mount_run_counter_warns_then_fails() {
    let f = fixture("/");
    f.shell.start().await.unwrap();
    let screen = f.shell.active_screen().unwrap();
    let lifecycle = &screen.unit.lifecycle;
    let limit = f.shell.context().config().mount_retry_limit;

    assert_eq!(lifecycle.mount_runs(), 1);
    for _ in 2..=limit {
        assert_eq!(lifecycle.begin_mount(limit), Ok(MountGuard::Duplicate));
    }
    assert!(matches!(
        lifecycle.begin_mount(limit),
        Err(ShellError::MountRetryExceeded { runs: 7, limit: 6, .. })
    ));
}

#[tokio::test]
async fn test_back_without_history_uses_parent_route() {
    let host = Rc::new(MemoryHost::with_url("/catalog/shoes"));
    let deliveries: Log = Rc::default();
    let log = deliveries.clone();
    let mut routes = RouteTable::new();
    routes
        .route("/", || Home)
        .unwrap()
        .route("/catalog/*", move || Catalog(log.clone()))
        .unwrap();
    let shell = AppShell::new(host.clone(), ShellConfig::default(), routes).unwrap();
    shell.start().await.unwrap();
    assert!(!host.history_has_state());

    // "/catalog" itself has no exact route, but the wildcard covers it
    assert_eq!(shell.back(), Ok(Some(Transition::Reused)));
    assert_eq!(host.url(), "/catalog");
    assert_eq!(shell.back(), Ok(Some(Transition::Created)));
    assert_eq!(host.url(), "/");
    assert_eq!(host.title(), "Home — app");
}

#[tokio::test]
async fn test_url_in_query_does_not_change_route() {
    let f = fixture("/");
    f.shell.start().await.unwrap();

    let result = f
        .shell
        .goto("/catalog?next=https://example.com/elsewhere", None, false);
    assert_eq!(result, Ok(Transition::Created));
    assert_eq!(f.host.url(), "/catalog?next=https://example.com/elsewhere");
    assert_eq!(
        f.deliveries.borrow()[0].get_str("next"),
        Some("https://example.com/elsewhere")
    );
}

#[tokio::test]
async fn test_failed_screen_mount_keeps_previous_screen() {
    let host = Rc::new(MemoryHost::new());
    let mut routes = RouteTable::new();
    routes
        .route("/", || Home)
        .unwrap()
        .route("/broken", || Broken)
        .unwrap();
    let shell = AppShell::new(host.clone(), ShellConfig::named("Store"), routes).unwrap();
    shell.start().await.unwrap();
    let home = shell.active_screen().unwrap();

    assert!(matches!(
        shell.goto("/broken", None, false),
        Err(ShellError::RequiredChildMissing { .. })
    ));
    assert_eq!(shell.screens().len(), 1);
    assert!(Rc::ptr_eq(&shell.active_screen().unwrap(), &home));

    assert_eq!(shell.goto("/", None, false), Ok(Transition::Unchanged));
    assert!(Rc::ptr_eq(&shell.active_screen().unwrap(), &home));
    assert_eq!(shell.screens().len(), 1);
    assert_eq!(host.url(), "/");
    assert_eq!(host.title(), "Home — Store");
}

#[tokio::test]
async fn test_overlay_tokens_are_scoped_to_their_screen() {
    let f = fixture("/shop");
    f.shell.start().await.unwrap();

    f.host.visit("/shop#checkout");
    assert!(matches!(f.shell.handle_hashchange(), Ok(ModalOutcome::Opened(_))));

    assert_eq!(f.shell.goto("/catalog", None, false), Ok(Transition::Created));
    let catalog = f.shell.active_screen().unwrap();
    f.host.visit("/catalog#checkout");
    assert_eq!(f.shell.handle_hashchange(), Ok(ModalOutcome::Unregistered));
    assert!(catalog.live_overlays().is_empty());
    let overlays = f.host.children(AttachPoint::Overlays(catalog.id()));
    assert!(overlays.is_empty());
    assert_eq!(f.checkouts.borrow().len(), 1);
}

#[tokio::test]
async fn test_register_overlay_targets_active_screen_only() {
    let f = fixture("/catalog");
    f.shell.start().await.unwrap();
    let registered = f.shell.register_overlay("filters", |_| {
        Some(Box::new(Filters) as Box<dyn Component>)
    });
    assert!(registered);

    f.host.visit("/catalog#filters");
    let catalog = f.shell.active_screen().unwrap();
    let Ok(ModalOutcome::Opened(id)) = f.shell.handle_hashchange() else {
        panic!("filters overlay not opened on the catalog screen");
    };
    assert_eq!(catalog.live_overlays(), vec![id]);

    assert_eq!(f.shell.goto("/shop", None, false), Ok(Transition::Created));
    let shop = f.shell.active_screen().unwrap();
    f.host.visit("/shop#filters");
    assert_eq!(f.shell.handle_hashchange(), Ok(ModalOutcome::Unregistered));
    assert!(shop.live_overlays().is_empty());
    let overlays = f.host.children(AttachPoint::Overlays(shop.id()));
    assert!(overlays.is_empty());
    // The catalog screen still owns its overlay
    assert_eq!(catalog.live_overlays(), vec![id]);
}
