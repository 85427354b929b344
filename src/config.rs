//! Shell configuration.
//!
//! Centralizes the constants the engine relies on and the runtime-tunable
//! [`ShellConfig`], which applications either build in code or load from TOML.

use serde::Deserialize;

use crate::core::error::{Result, ShellError};

// =============================================================================
// Application Metadata
// =============================================================================

/// Application name used when no configuration overrides it.
pub const DEFAULT_APP_NAME: &str = "app";

/// Separator between the screen title and the application name.
pub const TITLE_SEPARATOR: &str = " — ";

// =============================================================================
// Lifecycle Configuration
// =============================================================================

/// Number of duplicate mount invocations tolerated before the engine treats the
/// host as looping and fails.
pub const MOUNT_RETRY_LIMIT: u32 = 6;

/// Attribute names written on unit roots.
pub mod attrs {
    /// Type name of the unit; makes it discoverable by ancestor/descendant queries.
    pub const UNIT: &str = "data-unit";
    /// Engine-assigned unit id.
    pub const UNIT_ID: &str = "data-unit-id";
    /// Hidden until ready.
    pub const HIDDEN: &str = "hidden";
    /// Loading flag consumers can style against.
    pub const LOADING: &str = "data-loading";
    /// Screen should play its enter animation.
    pub const ENTER: &str = "data-enter";
    /// Unit is being torn down.
    pub const DESTROYED: &str = "data-destroyed";
    /// Fragment token that opened an overlay.
    pub const MODAL_TOKEN: &str = "data-modal-token";
    /// Component type of an overlay.
    pub const MODAL_TYPE: &str = "data-modal-type";
    /// Color scheme on the document root.
    pub const THEME: &str = "data-theme";
}

// =============================================================================
// Modal Configuration
// =============================================================================

/// Frames to wait for an exit animation to start before removing an overlay.
pub const DESTROY_TIMEOUT_FRAMES: u32 = 2;

// =============================================================================
// Fixed Region Configuration
// =============================================================================

/// Layout variables published on the shared layout root, in
/// top/right/bottom/left order.
pub const INSET_VARS: [&str; 4] = [
    "--fixed-inset-top",
    "--fixed-inset-right",
    "--fixed-inset-bottom",
    "--fixed-inset-left",
];

// =============================================================================
// Error Channel
// =============================================================================

/// Maximum number of reported errors kept for inspection.
pub const MAX_ERROR_HISTORY: usize = 64;

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Runtime configuration for an [`AppShell`](crate::AppShell).
///
/// Every field has a default, so a TOML document only needs to name what it
/// changes:
///
/// ```toml
/// app_name = "Storefront"
/// base_path = "/shop"
/// strict_modal_factories = true
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Name shown in the document title.
    pub app_name: String,
    /// Path prefix stripped before route resolution.
    pub base_path: String,
    /// Fail when a registered overlay factory returns nothing.
    pub strict_modal_factories: bool,
    /// Play the enter animation on the very first navigation too.
    pub animate_initial: bool,
    /// Duplicate mounts tolerated per unit.
    pub mount_retry_limit: u32,
    /// Frames an overlay waits for its exit animation to start.
    pub destroy_timeout_frames: u32,
    /// Stylesheets injected into every isolated unit.
    pub isolated_stylesheets: Vec<String>,
    /// Stylesheets injected once into the document for shared units.
    pub shared_stylesheets: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            base_path: String::new(),
            strict_modal_factories: false,
            animate_initial: false,
            mount_retry_limit: MOUNT_RETRY_LIMIT,
            destroy_timeout_frames: DESTROY_TIMEOUT_FRAMES,
            isolated_stylesheets: Vec::new(),
            shared_stylesheets: Vec::new(),
        }
    }
}

impl ShellConfig {
    /// Creates a default configuration with the given application name.
    pub fn named(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from TOML.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| ShellError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.destroy_timeout_frames == 0 {
            return Err(ShellError::InvalidConfig(
                "destroy_timeout_frames must be at least 1".to_string(),
            ));
        }
        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            return Err(ShellError::InvalidConfig(format!(
                "base_path '{}' must start with '/'",
                self.base_path
            )));
        }
        Ok(())
    }
}
