//! Browser host built on `web-sys`.
//!
//! Layout under the application root element:
//!
//! ```text
//! <div id="app">
//!   <div data-screens>   screen roots, attach order
//!   <div data-chrome>    fixed regions and other chrome
//! </div>
//! ```
//!
//! Every unit root is a wrapper `div` carrying the unit attributes. Its
//! content lives in a shadow root (isolated units) or an inner `div`
//! (shared units); screens get an extra overlay container beside it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, HtmlAnchorElement, HtmlElement, HtmlLinkElement, MouseEvent, ShadowRoot,
    ShadowRootInit, ShadowRootMode, Window,
};

use super::{AttachPoint, FrameHandle, Host};
use crate::app::AppShell;
use crate::core::error::{Result, ShellError};
use crate::models::{Fragment, IsolationMode, Location, Rect, UnitId};

/// Window event fired by the preloader once every preloaded child is ready.
pub const PRELOAD_EVENT: &str = "preload-ready";
/// Attribute the preloader sets on its container when it is done.
pub const PRELOAD_DONE: &str = "data-preload-done";

type Listener = Closure<dyn FnMut()>;

enum Content {
    Shadow(ShadowRoot),
    Light(HtmlElement),
}

impl Content {
    fn node(&self) -> &web_sys::Node {
        match self {
            Self::Shadow(root) => root.as_ref(),
            Self::Light(element) => element.as_ref(),
        }
    }

    fn clear(&self) {
        self.node().set_text_content(None);
    }
}

/// Builds the element tree for one layout node.
fn build_element(
    document: &Document,
    node: &crate::models::Node,
) -> std::result::Result<Element, JsValue> {
    let element = document.create_element(&node.tag)?;
    if let Some(id) = &node.id {
        element.set_id(id);
    }
    if !node.classes.is_empty() {
        element.set_class_name(&node.classes.join(" "));
    }
    if let Some(text) = &node.text {
        element.set_text_content(Some(text));
    }
    for child in &node.children {
        element.append_child(&build_element(document, child)?)?;
    }
    Ok(element)
}

struct UnitRoot {
    wrapper: HtmlElement,
    content: Content,
    overlays: Option<HtmlElement>,
    listeners: Vec<Listener>,
}

/// [`Host`] backed by the browser document.
pub struct WebHost {
    window: Window,
    document: Document,
    screens: HtmlElement,
    chrome: HtmlElement,
    roots: RefCell<HashMap<UnitId, UnitRoot>>,
    frames: Rc<RefCell<HashMap<u64, i32>>>,
    next_frame: Cell<u64>,
    listeners: RefCell<Vec<Listener>>,
}

fn js_warn<T>(operation: &str, result: std::result::Result<T, JsValue>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(operation, error = ?e, "DOM operation failed");
            None
        }
    }
}

fn missing(what: &str) -> ShellError {
    ShellError::InvalidConfig(format!("{} is not available", what))
}

impl WebHost {
    /// Builds the container layout inside the element with id `root_id`.
    pub fn new(root_id: &str) -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| missing("window"))?;
        let document = window.document().ok_or_else(|| missing("document"))?;
        let root = document
            .get_element_by_id(root_id)
            .ok_or_else(|| missing(&format!("element '#{}'", root_id)))?;

        let screens = Self::container(&document, &root, "data-screens")?;
        let chrome = Self::container(&document, &root, "data-chrome")?;
        Ok(Self {
            window,
            document,
            screens,
            chrome,
            roots: RefCell::new(HashMap::new()),
            frames: Rc::new(RefCell::new(HashMap::new())),
            next_frame: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        })
    }

    fn container(document: &Document, parent: &Element, marker: &str) -> Result<HtmlElement> {
        let element = document
            .create_element("div")
            .ok()
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
            .ok_or_else(|| missing("div element"))?;
        let _ = element.set_attribute(marker, "");
        parent
            .append_child(&element)
            .map_err(|_| missing("application root"))?;
        Ok(element)
    }

    fn div(&self) -> Option<HtmlElement> {
        js_warn("create div", self.document.create_element("div"))?
            .dyn_into::<HtmlElement>()
            .ok()
    }

    fn history(&self) -> Option<web_sys::History> {
        js_warn("history", self.window.history())
    }

    fn history_depth(&self) -> f64 {
        self.history()
            .and_then(|h| h.state().ok())
            .and_then(|state| state.as_f64())
            .unwrap_or(0.0)
    }

    fn layout_root(&self) -> Option<HtmlElement> {
        self.document
            .document_element()
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
    }

    /// One-shot signal fired by a DOM event on `target`. The listener lives
    /// as long as `keep` holds it.
    fn event_future(
        target: &web_sys::EventTarget,
        event: &str,
        keep: &mut Vec<Listener>,
    ) -> LocalBoxFuture<'static, ()> {
        let (tx, rx) = oneshot::channel::<()>();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let listener = Closure::wrap(Box::new(move || {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(());
            }
        }) as Box<dyn FnMut()>);
        if js_warn(
            "add event listener",
            target.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref()),
        )
        .is_none()
        {
            return future::ready(()).boxed_local();
        }
        keep.push(listener);
        rx.map(|_| ()).boxed_local()
    }

    /// Wires browser events to `shell` and launches it.
    ///
    /// Handles pop-state, hash changes and same-origin link clicks.
    pub fn install(shell: &AppShell) {
        console_error_panic_hook::set_once();
        let Some(window) = web_sys::window() else {
            return;
        };

        let on_popstate = {
            let shell = shell.clone();
            Closure::wrap(Box::new(move || {
                if let Err(e) = shell.handle_popstate() {
                    shell.report(e);
                }
            }) as Box<dyn Fn()>)
        };
        let on_hashchange = {
            let shell = shell.clone();
            Closure::wrap(Box::new(move || {
                if let Err(e) = shell.handle_hashchange() {
                    shell.report(e);
                }
            }) as Box<dyn Fn()>)
        };
        let on_click = {
            let shell = shell.clone();
            let base = shell.context().config().base_path.trim_end_matches('/').to_string();
            Closure::wrap(Box::new(move |event: MouseEvent| {
                if let Some(href) = internal_link(&event) {
                    event.prevent_default();
                    let relative = match href.strip_prefix(base.as_str()) {
                        Some(rest) if !base.is_empty() => rest,
                        _ => href.as_str(),
                    };
                    if let Err(e) = shell.goto(relative, None, false) {
                        shell.report(e);
                    }
                }
            }) as Box<dyn Fn(MouseEvent)>)
        };

        let _ = window
            .add_event_listener_with_callback("popstate", on_popstate.as_ref().unchecked_ref());
        let _ = window
            .add_event_listener_with_callback("hashchange", on_hashchange.as_ref().unchecked_ref());
        if let Some(document) = window.document() {
            let _ = document
                .add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref());
        }

        // Keep the closures alive for the lifetime of the app
        on_popstate.forget();
        on_hashchange.forget();
        on_click.forget();

        shell.launch();
    }
}

/// Path of a plain left-click on a same-origin link, relative to the origin.
fn internal_link(event: &MouseEvent) -> Option<String> {
    if event.default_prevented()
        || event.button() != 0
        || event.ctrl_key()
        || event.meta_key()
        || event.shift_key()
        || event.alt_key()
    {
        return None;
    }
    let target = event.target()?.dyn_into::<Element>().ok()?;
    let anchor = target
        .closest("a[href]")
        .ok()
        .flatten()?
        .dyn_into::<HtmlAnchorElement>()
        .ok()?;
    if !anchor.target().is_empty() || anchor.has_attribute("download") {
        return None;
    }
    let origin = web_sys::window()?.location().origin().ok()?;
    if anchor.origin() != origin {
        return None;
    }
    // same page, fragment only: leave it to hashchange
    let location = web_sys::window()?.location();
    if anchor.pathname() == location.pathname().ok()?
        && anchor.search() == location.search().ok()?
    {
        return None;
    }
    Some(format!("{}{}{}", anchor.pathname(), anchor.search(), anchor.hash()))
}

impl Host for WebHost {
    fn location(&self) -> Location {
        let location = self.window.location();
        let path = location.pathname().unwrap_or_else(|_| "/".to_string());
        let search = location.search().unwrap_or_default();
        let hash = location.hash().unwrap_or_default();
        Location {
            path,
            query: search.trim_start_matches('?').to_string(),
            fragment: hash.trim_start_matches('#').to_string(),
        }
    }

    fn push_url(&self, url: &str) {
        let depth = self.history_depth() + 1.0;
        if let Some(history) = self.history() {
            js_warn(
                "push state",
                history.push_state_with_url(&JsValue::from_f64(depth), "", Some(url)),
            );
        }
    }

    fn replace_url(&self, url: &str) {
        let depth = self.history_depth();
        if let Some(history) = self.history() {
            js_warn(
                "replace state",
                history.replace_state_with_url(&JsValue::from_f64(depth), "", Some(url)),
            );
        }
    }

    fn history_has_state(&self) -> bool {
        self.history_depth() > 0.0
    }

    fn history_back(&self) {
        if let Some(history) = self.history() {
            js_warn("history back", history.back());
        }
    }

    fn set_title(&self, title: &str) {
        self.document.set_title(title);
    }

    fn set_layout_var(&self, name: &str, value: &str) {
        if let Some(root) = self.layout_root() {
            js_warn("set layout var", root.style().set_property(name, value));
        }
    }

    fn set_document_attribute(&self, name: &str, value: Option<&str>) {
        let Some(root) = self.document.document_element() else {
            return;
        };
        match value {
            Some(value) => {
                js_warn("set document attribute", root.set_attribute(name, value));
            }
            None => {
                js_warn("remove document attribute", root.remove_attribute(name));
            }
        }
    }

    fn attach(&self, unit: UnitId, point: AttachPoint, isolation: IsolationMode) {
        let parent = match point {
            AttachPoint::Screens => Some(self.screens.clone()),
            AttachPoint::Chrome => Some(self.chrome.clone()),
            AttachPoint::Overlays(screen) => self.overlay_container(screen),
        };
        let (Some(parent), Some(wrapper), Some(inner)) = (parent, self.div(), self.div()) else {
            return;
        };
        if js_warn("append unit root", wrapper.append_child(&inner)).is_none() {
            return;
        }
        let content = match isolation {
            IsolationMode::Isolated => {
                let init = ShadowRootInit::new(ShadowRootMode::Open);
                match js_warn("attach shadow", inner.attach_shadow(&init)) {
                    Some(root) => Content::Shadow(root),
                    None => Content::Light(inner),
                }
            }
            IsolationMode::Shared => Content::Light(inner),
        };
        js_warn("attach unit", parent.append_child(&wrapper));
        self.roots.borrow_mut().insert(
            unit,
            UnitRoot {
                wrapper,
                content,
                overlays: None,
                listeners: Vec::new(),
            },
        );
    }

    fn render(&self, unit: UnitId, fragment: &Fragment) {
        let roots = self.roots.borrow();
        let Some(root) = roots.get(&unit) else {
            return;
        };
        root.content.clear();
        for node in &fragment.nodes {
            let built = js_warn("render layout", build_element(&self.document, node));
            if let Some(element) = built {
                js_warn("render layout", root.content.node().append_child(&element));
            }
        }
    }

    fn detach(&self, unit: UnitId) {
        if let Some(root) = self.roots.borrow_mut().remove(&unit) {
            root.wrapper.remove();
        }
    }

    fn set_attribute(&self, unit: UnitId, name: &str, value: Option<&str>) {
        let roots = self.roots.borrow();
        let Some(root) = roots.get(&unit) else {
            return;
        };
        match value {
            Some(value) => {
                js_warn("set attribute", root.wrapper.set_attribute(name, value));
            }
            None => {
                js_warn("remove attribute", root.wrapper.remove_attribute(name));
            }
        }
    }

    fn inject_stylesheet(&self, unit: Option<UnitId>, href: &str) -> LocalBoxFuture<'static, ()> {
        let Some(link) = js_warn("create link", self.document.create_element("link"))
            .and_then(|e| e.dyn_into::<HtmlLinkElement>().ok())
        else {
            return future::ready(()).boxed_local();
        };
        link.set_rel("stylesheet");
        link.set_href(href);

        let (tx, rx) = oneshot::channel::<()>();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let settle = move || {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(());
            }
        };
        let on_error = settle.clone();
        link.set_onload(Some(Closure::once_into_js(settle).unchecked_ref()));
        link.set_onerror(Some(Closure::once_into_js(on_error).unchecked_ref()));

        let appended = match unit {
            Some(unit) => self
                .roots
                .borrow()
                .get(&unit)
                .and_then(|root| {
                    js_warn("append stylesheet", root.content.node().append_child(&link))
                }),
            None => self
                .document
                .head()
                .and_then(|head| js_warn("append stylesheet", head.append_child(&link))),
        };
        if appended.is_none() {
            return future::ready(()).boxed_local();
        }
        rx.map(|_| ()).boxed_local()
    }

    fn measure(&self, unit: UnitId) -> Option<Rect> {
        let roots = self.roots.borrow();
        let root = roots.get(&unit)?;
        if root.wrapper.has_attribute("hidden") {
            return None;
        }
        let bounds = root.wrapper.get_bounding_client_rect();
        Some(Rect::new(bounds.width(), bounds.height()))
    }

    fn animation_started(&self, unit: UnitId) -> LocalBoxFuture<'static, ()> {
        self.unit_event(unit, "animationstart")
    }

    fn animation_finished(&self, unit: UnitId) -> LocalBoxFuture<'static, ()> {
        self.unit_event(unit, "animationend")
    }

    fn preload_ready(&self) -> LocalBoxFuture<'static, ()> {
        let pending = self
            .document
            .query_selector("[data-preload]")
            .ok()
            .flatten()
            .is_some_and(|e| !e.has_attribute(PRELOAD_DONE));
        if !pending {
            return future::ready(()).boxed_local();
        }
        Self::event_future(&self.window, PRELOAD_EVENT, &mut self.listeners.borrow_mut())
    }

    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> FrameHandle {
        let handle = self.next_frame.get() + 1;
        self.next_frame.set(handle);
        let frames = self.frames.clone();
        let js = Closure::once_into_js(move || {
            frames.borrow_mut().remove(&handle);
            callback();
        });
        if let Some(id) = js_warn(
            "request animation frame",
            self.window.request_animation_frame(js.unchecked_ref()),
        ) {
            self.frames.borrow_mut().insert(handle, id);
        }
        FrameHandle(handle)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if let Some(id) = self.frames.borrow_mut().remove(&handle.0) {
            js_warn("cancel animation frame", self.window.cancel_animation_frame(id));
        }
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

impl WebHost {
    fn overlay_container(&self, screen: UnitId) -> Option<HtmlElement> {
        let mut roots = self.roots.borrow_mut();
        let root = roots.get_mut(&screen)?;
        if root.overlays.is_none() {
            let container = self.div()?;
            let _ = container.set_attribute("data-overlays", "");
            js_warn("append overlay container", root.wrapper.append_child(&container))?;
            root.overlays = Some(container);
        }
        root.overlays.clone()
    }

    fn unit_event(&self, unit: UnitId, event: &str) -> LocalBoxFuture<'static, ()> {
        let mut roots = self.roots.borrow_mut();
        match roots.get_mut(&unit) {
            Some(root) => {
                let target: web_sys::EventTarget = root.wrapper.clone().into();
                Self::event_future(&target, event, &mut root.listeners)
            }
            // A detached root never animates
            None => future::pending().boxed_local(),
        }
    }
}
