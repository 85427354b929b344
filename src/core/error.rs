//! Error types for the shell engine.
//!
//! Errors fall into three groups:
//!
//! - configuration errors (routes, config values), fatal at startup or first navigation
//! - runtime contract violations (missing required child, runaway mounts, null overlays)
//! - failures raised by application setup code
//!
//! Soft conditions (unregistered modal token, re-opening an open overlay, navigating
//! to the active screen) are not errors; they log a diagnostic and return.
//!
//! Errors raised outside a synchronous call (inside a spawned mount or teardown)
//! are delivered to the [`ErrorChannel`].

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::config::MAX_ERROR_HISTORY;

/// Shell engine errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShellError {
    /// Configuration could not be parsed or holds an unusable value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The same route path was registered twice.
    #[error("route '{0}' is already registered")]
    DuplicateRoute(String),
    /// A second default (empty-path) route was registered.
    #[error("a default route is already registered")]
    DuplicateDefaultRoute,
    /// A not-found handler was registered twice.
    #[error("a not-found handler is already registered")]
    DuplicateNotFound,
    /// No default (empty-path) route was registered.
    #[error("no default route registered")]
    MissingDefaultRoute,
    /// Navigation reached a path with no route and no not-found handler.
    #[error("no route matches '{0}' and no not-found handler is registered")]
    NoRouteMatched(String),
    /// A required child lookup found nothing.
    #[error("required element '{selector}' not found in {unit}")]
    RequiredChildMissing { unit: String, selector: String },
    /// A selector outside the supported `tag#id.class` grammar.
    #[error("unsupported selector '{0}'")]
    InvalidSelector(String),
    /// A unit was mounted more often than the retry ceiling allows.
    #[error("{unit} mounted {runs} times (limit {limit})")]
    MountRetryExceeded { unit: String, runs: u32, limit: u32 },
    /// An overlay was opened before any screen was active.
    #[error("no active screen to host an overlay")]
    NoActiveScreen,
    /// Strict mode: an overlay factory returned nothing.
    #[error("overlay factory for '{0}' returned no overlay")]
    NullOverlay(String),
    /// Application setup code failed.
    #[error("setup failed for {unit}: {message}")]
    Setup { unit: String, message: String },
}

impl ShellError {
    /// Builds a setup failure for the given unit.
    pub fn setup(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Setup {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// True for misconfiguration of the application itself.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::DuplicateRoute(_)
                | Self::DuplicateDefaultRoute
                | Self::DuplicateNotFound
                | Self::MissingDefaultRoute
                | Self::NoRouteMatched(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ShellError>;

// =============================================================================
// Error Channel
// =============================================================================

type ErrorHook = Box<dyn Fn(&ShellError)>;

/// Application-wide sink for errors raised by asynchronous work.
///
/// An error screen hooks in through [`ErrorChannel::set_hook`]; the channel
/// itself only logs and remembers the most recent errors.
#[derive(Default)]
pub struct ErrorChannel {
    history: RefCell<VecDeque<ShellError>>,
    hook: RefCell<Option<ErrorHook>>,
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports an error: logs it, records it and forwards it to the hook.
    pub fn report(&self, error: ShellError) {
        tracing::error!(%error, "shell error");
        {
            let mut history = self.history.borrow_mut();
            if history.len() == MAX_ERROR_HISTORY {
                history.pop_front();
            }
            history.push_back(error.clone());
        }
        // Hook runs without any borrow held so it may report again.
        let hook = self.hook.borrow_mut().take();
        if let Some(hook) = hook {
            hook(&error);
            let mut slot = self.hook.borrow_mut();
            if slot.is_none() {
                *slot = Some(hook);
            }
        }
    }

    /// Installs the handler invoked for every reported error.
    pub fn set_hook(&self, hook: impl Fn(&ShellError) + 'static) {
        *self.hook.borrow_mut() = Some(Box::new(hook));
    }

    /// Recorded errors, oldest first.
    pub fn errors(&self) -> Vec<ShellError> {
        self.history.borrow().iter().cloned().collect()
    }

    /// Drains recorded errors.
    pub fn take(&self) -> Vec<ShellError> {
        self.history.borrow_mut().drain(..).collect()
    }
}
