//! Authoring traits for the units an application builds.
//!
//! - [`Component`] - any mountable unit (fixed bars, overlays, widgets)
//! - [`Screen`] - a route-addressable component (activity)
//! - [`OverlayRegistry`] - per-screen fragment-token to overlay factories

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures::future::{self, LocalBoxFuture};

use crate::core::SetupContext;
use crate::core::error::Result;
use crate::models::{Fragment, IsolationMode, NavArgs, VisibilityPolicy};

/// Asynchronous part of a unit's setup. Runs after the synchronous part has
/// returned, so it must own what it touches.
pub type Setup = LocalBoxFuture<'static, Result<()>>;

/// Setup with nothing left to wait for.
pub fn ready() -> Setup {
    Box::pin(future::ready(Ok(())))
}

/// A mountable unit.
///
/// Every method has a default, so the smallest component is an empty impl.
pub trait Component: 'static {
    /// Type name; keys the layout cache and tags the unit root.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn isolation(&self) -> IsolationMode {
        IsolationMode::default()
    }

    fn visibility(&self) -> VisibilityPolicy {
        VisibilityPolicy::default()
    }

    /// Unit-specific stylesheets, injected on mount.
    fn stylesheets(&self) -> Vec<String> {
        Vec::new()
    }

    /// Cached-layout generator. Runs at most once per component type.
    fn layout(&self) -> Option<Fragment> {
        None
    }

    /// Called once per mount, after the layout is in place.
    ///
    /// Errors returned here, or from the returned future, go to the shell's
    /// error channel.
    fn setup(&mut self, cx: &mut SetupContext<'_>) -> Result<Setup> {
        let _ = cx;
        Ok(ready())
    }
}

/// A route-addressable component.
pub trait Screen: Component {
    /// Shown in the document title while this screen is active.
    fn title(&self) -> Option<String> {
        None
    }

    /// Registers overlay factories when the instance is created.
    fn overlays(&self, registry: &mut OverlayRegistry) {
        let _ = registry;
    }

    /// Receives navigation arguments on every activation and argument change.
    fn on_args(&mut self, args: &NavArgs) {
        let _ = args;
    }
}

/// Builds an overlay from modal arguments, or declines with `None`.
pub type OverlayFactory = Rc<dyn Fn(&NavArgs) -> Option<Box<dyn Component>>>;

/// Overlay factories registered by one screen instance. Other screens never
/// see them.
#[derive(Default, Clone)]
pub struct OverlayRegistry {
    factories: HashMap<String, OverlayFactory>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `token`, replacing any earlier one.
    pub fn register<F>(&mut self, token: impl Into<String>, factory: F)
    where
        F: Fn(&NavArgs) -> Option<Box<dyn Component>> + 'static,
    {
        self.factories.insert(token.into(), Rc::new(factory));
    }

    pub fn get(&self, token: &str) -> Option<OverlayFactory> {
        self.factories.get(token).cloned()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.factories.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for OverlayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// Short display name of a component type (`app::screens::Home` becomes `Home`).
pub fn short_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    impl Component for Plain {}

    #[test]
    fn test_defaults() {
        let plain = Plain;
        assert_eq!(short_name(plain.type_name()), "Plain");
        assert_eq!(plain.isolation(), IsolationMode::Isolated);
        assert!(plain.layout().is_none());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("app::screens::Home"), "Home");
        assert_eq!(short_name("app::List<app::Item>"), "List");
        assert_eq!(short_name("Bare"), "Bare");
    }

    #[test]
    fn test_registry() {
        let mut registry = OverlayRegistry::new();
        registry.register("cart", |_| Some(Box::new(Plain) as Box<dyn Component>));
        registry.register("none", |_| None);

        assert!(registry.contains("cart"));
        assert_eq!(registry.len(), 2);
        let factory = registry.get("cart").unwrap();
        assert!(factory(&NavArgs::new()).is_some());
        assert!(registry.get("none").unwrap()(&NavArgs::new()).is_none());
        assert!(registry.get("other").is_none());
    }
}
