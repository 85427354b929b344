//! Locations, route keys and the route table.
//!
//! URL format handled by the shell: `{base}/{route}?{route args}#{token}?{modal args}`.
//! The path selects a screen, the fragment selects an overlay.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::components::Screen;
use crate::core::error::{Result, ShellError};

// ============================================================================
// Location
// ============================================================================

/// Current location split into the parts the shell reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// Path, always starting with `/`.
    pub path: String,
    /// Query string without `?`.
    pub query: String,
    /// Fragment without `#`.
    pub fragment: String,
}

impl Location {
    /// Parse a path-relative URL (`/a/b?x=1#modal`). Scheme and host, if
    /// present, are dropped.
    pub fn parse(url: &str) -> Self {
        let owned;
        let url = match strip_origin(url) {
            Some(rest) if rest.starts_with('/') => rest,
            Some(rest) => {
                owned = format!("/{}", rest);
                owned.as_str()
            }
            None => url,
        };

        let (rest, fragment) = url.split_once('#').unwrap_or((url, ""));
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        Self {
            path,
            query: query.to_string(),
            fragment: fragment.to_string(),
        }
    }

    /// Reassemble into a path-relative URL.
    pub fn to_url(&self) -> String {
        let mut url = self.path.clone();
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&self.query);
        }
        if !self.fragment.is_empty() {
            url.push('#');
            url.push_str(&self.fragment);
        }
        url
    }
}

/// Everything after `scheme://host`, or `None` when `url` has no leading
/// scheme. A `://` inside the query or fragment is not a scheme.
fn strip_origin(url: &str) -> Option<&str> {
    let (scheme, rest) = url.split_once("://")?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return None;
    }
    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&rest[host_end..])
}

// ============================================================================
// RouteKey
// ============================================================================

/// Canonical route string: base path removed, no leading or trailing slash,
/// empty for the default route.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RouteKey(String);

impl RouteKey {
    /// The default (empty-path) key.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Canonicalize a location path relative to `base`.
    pub fn from_path(path: &str, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let relative = match path.strip_prefix(base) {
            Some(rest) if !base.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
            _ => path,
        };
        Self::new(relative)
    }

    /// Canonicalize a route pattern or relative path.
    pub fn new(path: &str) -> Self {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.last() == Some(&"index.html") {
            segments.pop();
        }
        Self(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent route used when there is no history to go back to. The default
    /// route has no parent.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rsplit_once('/') {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::root(),
        })
    }

    /// Absolute path under `base`.
    pub fn to_path(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

// ============================================================================
// RouteTable
// ============================================================================

/// Constructs a fresh screen instance.
pub type ScreenCtor = Rc<dyn Fn() -> Box<dyn Screen>>;

/// A registered route.
pub struct RouteEntry {
    /// Pattern key; a trailing `*` segment matches any deeper path.
    pub key: RouteKey,
    /// Screen type the constructor produces; screens are deduplicated by it.
    pub screen_type: TypeId,
    pub screen_name: &'static str,
    ctor: ScreenCtor,
}

impl RouteEntry {
    fn new<S, F>(key: RouteKey, ctor: F) -> Rc<Self>
    where
        S: Screen + 'static,
        F: Fn() -> S + 'static,
    {
        Rc::new(Self {
            key,
            screen_type: TypeId::of::<S>(),
            screen_name: type_name::<S>(),
            ctor: Rc::new(move || Box::new(ctor()) as Box<dyn Screen>),
        })
    }

    /// Builds a new screen instance.
    pub fn construct(&self) -> Box<dyn Screen> {
        (self.ctor)()
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("key", &self.key)
            .field("screen", &self.screen_name)
            .finish()
    }
}

/// Path patterns mapped to screen constructors. Built once at startup.
#[derive(Default)]
pub struct RouteTable {
    entries: HashMap<RouteKey, Rc<RouteEntry>>,
    not_found: Option<Rc<RouteEntry>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path` (`""` or `"/"` for the default route).
    pub fn route<S, F>(&mut self, path: &str, ctor: F) -> Result<&mut Self>
    where
        S: Screen + 'static,
        F: Fn() -> S + 'static,
    {
        let key = RouteKey::new(path);
        if self.entries.contains_key(&key) {
            return Err(if key.is_root() {
                ShellError::DuplicateDefaultRoute
            } else {
                ShellError::DuplicateRoute(path.to_string())
            });
        }
        self.entries.insert(key.clone(), RouteEntry::new(key, ctor));
        Ok(self)
    }

    /// Registers the screen shown when nothing else matches.
    pub fn not_found<S, F>(&mut self, ctor: F) -> Result<&mut Self>
    where
        S: Screen + 'static,
        F: Fn() -> S + 'static,
    {
        if self.not_found.is_some() {
            return Err(ShellError::DuplicateNotFound);
        }
        self.not_found = Some(RouteEntry::new(RouteKey::new("*"), ctor));
        Ok(self)
    }

    /// Checks table-wide invariants.
    pub fn validate(&self) -> Result<()> {
        if !self.entries.contains_key(&RouteKey::root()) {
            return Err(ShellError::MissingDefaultRoute);
        }
        Ok(())
    }

    /// Entry for `key`: exact match first, then the longest matching wildcard.
    pub fn resolve(&self, key: &RouteKey) -> Option<Rc<RouteEntry>> {
        if let Some(entry) = self.entries.get(key) {
            return Some(entry.clone());
        }
        self.entries
            .values()
            .filter_map(|entry| {
                let prefix = entry.key.as_str().strip_suffix('*')?.trim_end_matches('/');
                let matches = prefix.is_empty()
                    || key.as_str() == prefix
                    || key.as_str().starts_with(&format!("{}/", prefix));
                matches.then_some((prefix.len(), entry))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, entry)| entry.clone())
    }

    pub fn not_found_entry(&self) -> Option<Rc<RouteEntry>> {
        self.not_found.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
