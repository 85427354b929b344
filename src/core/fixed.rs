//! Fixed-region tracking.
//!
//! Docked units (top bars, bottom navigation, side rails) change size as
//! their stylesheets and content load, and no single event reports that.
//! The tracker therefore measures every frame and republishes the remaining
//! safe area as four layout variables, writing only when a value changed.

use std::rc::Rc;

use leptos::prelude::*;

use crate::app::AppContext;
use crate::config::INSET_VARS;
use crate::host::Host;
use crate::models::{Anchor, Insets, UnitId, px};
use crate::utils::frame::FrameLoop;

/// A registered docked unit.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedRegion {
    pub anchor: Anchor,
    pub unit: UnitId,
    /// Optional label for selector-based unregistration.
    pub selector: Option<String>,
}

/// The process-wide fixed-region set and its publishing state.
#[derive(Debug, Default)]
pub struct FixedRegions {
    regions: Vec<FixedRegion>,
    hidden: bool,
    started: bool,
    last_written: Option<Insets>,
    frame_loop: Option<FrameLoop>,
}

impl FixedRegions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a region; registering the same unit again moves it to `anchor`.
    pub fn register(&mut self, anchor: Anchor, unit: UnitId, selector: Option<String>) {
        match self.regions.iter_mut().find(|r| r.unit == unit) {
            Some(region) => {
                region.anchor = anchor;
                region.selector = selector;
            }
            None => self.regions.push(FixedRegion {
                anchor,
                unit,
                selector,
            }),
        }
    }

    pub fn unregister(&mut self, unit: UnitId) -> bool {
        let before = self.regions.len();
        self.regions.retain(|r| r.unit != unit);
        self.regions.len() != before
    }

    /// Removes every region labelled `selector`; returns how many.
    pub fn unregister_selector(&mut self, selector: &str) -> usize {
        let before = self.regions.len();
        self.regions.retain(|r| r.selector.as_deref() != Some(selector));
        before - self.regions.len()
    }

    pub fn regions(&self) -> &[FixedRegion] {
        &self.regions
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_running(&self) -> bool {
        self.frame_loop.as_ref().is_some_and(FrameLoop::is_running)
    }

    /// Sum of the visible regions' extents per anchor.
    pub fn measure(&self, host: &dyn Host) -> Insets {
        let mut insets = Insets::ZERO;
        for region in &self.regions {
            if let Some(rect) = host.measure(region.unit) {
                insets.accumulate(region.anchor, rect);
            }
        }
        insets
    }
}

/// One measurement pass. Hidden regions publish zero without measuring.
pub(crate) fn tick(ctx: &AppContext) {
    let target = {
        let fixed = ctx.fixed.borrow();
        if fixed.hidden {
            Insets::ZERO
        } else {
            fixed.measure(ctx.host.as_ref())
        }
    };
    publish(ctx, target);
}

fn publish(ctx: &AppContext, insets: Insets) {
    {
        let mut fixed = ctx.fixed.borrow_mut();
        if fixed.last_written == Some(insets) {
            return;
        }
        fixed.last_written = Some(insets);
    }
    for (name, value) in INSET_VARS.iter().zip(insets.values()) {
        ctx.host.set_layout_var(name, &px(value));
    }
    ctx.state.insets.set(insets);
    tracing::trace!(?insets, "fixed insets published");
}

/// Starts the per-frame loop (once the shell has started).
pub(crate) fn start(ctx: &Rc<AppContext>) {
    ctx.fixed.borrow_mut().started = true;
    resume(ctx);
}

fn resume(ctx: &Rc<AppContext>) {
    {
        let fixed = ctx.fixed.borrow();
        if !fixed.started
            || fixed.hidden
            || fixed.frame_loop.as_ref().is_some_and(FrameLoop::is_running)
        {
            return;
        }
    }
    let weak = Rc::downgrade(ctx);
    let frame_loop = FrameLoop::start(ctx.host.clone(), move || {
        if let Some(ctx) = weak.upgrade() {
            tick(&ctx);
        }
    });
    ctx.fixed.borrow_mut().frame_loop = Some(frame_loop);
}

fn suspend(ctx: &AppContext) {
    let frame_loop = ctx.fixed.borrow_mut().frame_loop.take();
    if let Some(frame_loop) = frame_loop {
        frame_loop.stop();
    }
}

/// Hides every fixed region: the loop stops and all insets collapse to zero.
pub(crate) fn hide(ctx: &Rc<AppContext>) {
    ctx.fixed.borrow_mut().hidden = true;
    suspend(ctx);
    tick(ctx);
}

/// Shows fixed regions again: re-measures now and resumes the loop.
pub(crate) fn show(ctx: &Rc<AppContext>) {
    ctx.fixed.borrow_mut().hidden = false;
    tick(ctx);
    resume(ctx);
}
