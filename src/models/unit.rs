//! Descriptors shared by every mountable unit.

use std::fmt;

/// Identity of a unit within one shell. Doubles as the element identity the
/// host uses to find the unit's root node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Whether a unit's markup and styles are scoped away from the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// Own style scope (shadow root on the web).
    #[default]
    Isolated,
    /// Shares the document's styles.
    Shared,
}

/// How a unit is presented before it is ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VisibilityPolicy {
    /// Hidden until ready.
    #[default]
    HideUntilReady,
    /// Visible, carrying a loading flag.
    LoadingFlag,
    /// The unit manages its own visibility.
    Ungated,
}

/// Effect an open unit has on fixed regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FixedVisibility {
    #[default]
    Unaffected,
    /// Fixed regions are hidden while the unit is open (overlays).
    HideWhileOpen,
}

/// Capabilities that replace a subclass chain: one lifecycle engine, configured
/// per role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Route-addressable screen.
    pub is_activity: bool,
    /// Owns a container overlays attach under.
    pub has_overlay_container: bool,
    pub fixed_visibility: FixedVisibility,
}

impl Capabilities {
    /// Plain component.
    pub const COMPONENT: Self = Self {
        is_activity: false,
        has_overlay_container: false,
        fixed_visibility: FixedVisibility::Unaffected,
    };

    /// Screen (activity).
    pub const SCREEN: Self = Self {
        is_activity: true,
        has_overlay_container: true,
        fixed_visibility: FixedVisibility::Unaffected,
    };

    /// Modal overlay.
    pub const OVERLAY: Self = Self {
        is_activity: false,
        has_overlay_container: false,
        fixed_visibility: FixedVisibility::HideWhileOpen,
    };
}

/// Edge of the viewport a fixed region is docked to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Anchor {
    Top,
    Right,
    Bottom,
    Left,
}

/// Bounding box reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Content-safe-area insets published for screens and overlays.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Insets {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Insets {
    pub const ZERO: Self = Self {
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
        left: 0.0,
    };

    /// Adds a measured region to the inset of its anchor.
    pub fn accumulate(&mut self, anchor: Anchor, rect: Rect) {
        match anchor {
            Anchor::Top => self.top += rect.height,
            Anchor::Bottom => self.bottom += rect.height,
            Anchor::Left => self.left += rect.width,
            Anchor::Right => self.right += rect.width,
        }
    }

    /// Values in top/right/bottom/left order, matching
    /// [`INSET_VARS`](crate::config::INSET_VARS).
    pub fn values(&self) -> [f64; 4] {
        [self.top, self.right, self.bottom, self.left]
    }
}

/// Document color scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// Formats a length for a layout variable.
pub fn px(value: f64) -> String {
    format!("{}px", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_by_anchor() {
        let mut insets = Insets::ZERO;
        insets.accumulate(Anchor::Bottom, Rect::new(320.0, 40.0));
        insets.accumulate(Anchor::Bottom, Rect::new(320.0, 8.0));
        insets.accumulate(Anchor::Left, Rect::new(64.0, 900.0));

        assert_eq!(insets.values(), [0.0, 0.0, 48.0, 64.0]);
    }

    #[test]
    fn test_px() {
        assert_eq!(px(0.0), "0px");
        assert_eq!(px(40.0), "40px");
        assert_eq!(px(12.5), "12.5px");
    }
}
