//! Property-based invariant tests for the router's screen cache.
//!
//! Random interleavings of `goto`, `back` and pop-state over three screen
//! types must keep:
//!
//! 1. At most one live instance per screen type.
//! 2. An active screen that is not destroyed.
//! 3. The active screen matching the screen type routed from the location.

use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

use appshell::models::Location;
use appshell::{AppShell, Component, MemoryHost, NavArgs, RouteTable, Screen, ShellConfig};
use futures::executor::block_on;
use proptest::prelude::*;

struct Home;
impl Component for Home {}
impl Screen for Home {}

struct Catalog;
impl Component for Catalog {}
impl Screen for Catalog {}

struct Shop;
impl Component for Shop {}
impl Screen for Shop {}

const PATHS: [&str; 3] = ["/", "/catalog", "/shop"];

#[derive(Clone, Debug)]
enum Op {
    Goto {
        route: usize,
        page: Option<u8>,
        replace: bool,
    },
    /// Back, followed by the pop-state the browser would fire.
    Back,
    /// Pop-state without a location change.
    Popstate,
    /// Let spawned mount completions run.
    Settle,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..PATHS.len(), proptest::option::of(0u8..4), any::<bool>())
            .prop_map(|(route, page, replace)| Op::Goto { route, page, replace }),
        2 => Just(Op::Back),
        1 => Just(Op::Popstate),
        1 => Just(Op::Settle),
    ]
}

fn shell(host: &Rc<MemoryHost>) -> AppShell {
    let mut routes = RouteTable::new();
    routes
        .route("/", || Home)
        .unwrap()
        .route("/catalog", || Catalog)
        .unwrap()
        .route("/shop", || Shop)
        .unwrap();
    AppShell::new(host.clone(), ShellConfig::default(), routes).unwrap()
}

fn expected_type(url: &str) -> TypeId {
    match Location::parse(url).path.as_str() {
        "/catalog" => TypeId::of::<Catalog>(),
        "/shop" => TypeId::of::<Shop>(),
        _ => TypeId::of::<Home>(),
    }
}

fn apply(shell: &AppShell, host: &MemoryHost, op: &Op) -> Result<(), TestCaseError> {
    match op {
        Op::Goto { route, page, replace } => {
            let args = page.map(|p| NavArgs::new().with("page", p.to_string()));
            prop_assert!(shell.goto(PATHS[*route], args.as_ref(), *replace).is_ok());
        }
        Op::Back => {
            let result = shell.back();
            prop_assert!(result.is_ok());
            if let Ok(None) = result {
                prop_assert!(shell.handle_popstate().is_ok());
            }
        }
        Op::Popstate => {
            prop_assert!(shell.handle_popstate().is_ok());
        }
        Op::Settle => host.run_until_stalled(),
    }
    Ok(())
}

proptest! {
    #[test]
    fn screen_cache_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let host = Rc::new(MemoryHost::new());
        let shell = shell(&host);
        prop_assert!(block_on(shell.start()).is_ok());

        for op in &ops {
            apply(&shell, &host, op)?;

            let mut live: HashMap<TypeId, usize> = HashMap::new();
            for screen in shell.screens().iter().filter(|s| !s.is_destroyed()) {
                *live.entry(screen.screen_type).or_insert(0) += 1;
            }
            prop_assert!(
                live.values().all(|&n| n == 1),
                "duplicate live screen after {:?}: {:?}",
                op, live
            );

            let active = shell.active_screen();
            prop_assert!(active.is_some(), "no active screen after {:?}", op);
            let active = active.unwrap();
            prop_assert!(!active.is_destroyed(), "active screen destroyed after {:?}", op);
            prop_assert_eq!(active.screen_type, expected_type(&host.url()));
            prop_assert!(shell.screens().len() <= PATHS.len());
        }
    }
}
