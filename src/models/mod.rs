//! Data models and types for the shell.
//!
//! Contains:
//! - [`Location`], [`RouteKey`], [`RouteTable`] - URL and route resolution
//! - [`NavArgs`] - navigation and modal arguments
//! - [`Fragment`], [`Node`], [`Selector`] - unit layout trees and lookups
//! - [`UnitId`], [`Capabilities`] and friends - unit descriptors

mod args;
mod fragment;
mod route;
mod unit;

pub use args::NavArgs;
pub use fragment::{Fragment, Node, Selector};
pub use route::{Location, RouteEntry, RouteKey, RouteTable, ScreenCtor};
pub use unit::{
    Anchor, Capabilities, FixedVisibility, Insets, IsolationMode, Rect, Theme, UnitId,
    VisibilityPolicy, px,
};
