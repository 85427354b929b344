//! Per-type memoization of generated layouts.

use std::collections::HashMap;

use crate::models::Fragment;

/// Generated layout per component type. A type whose generator returned
/// nothing is remembered too, so the generator never runs twice.
#[derive(Debug, Default)]
pub struct LayoutCache {
    fragments: HashMap<&'static str, Option<Fragment>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached fragment for `type_name`, running `generate` only on first use.
    /// Returns a clone; the cached original is never handed out.
    pub fn get_or_generate(
        &mut self,
        type_name: &'static str,
        generate: impl FnOnce() -> Option<Fragment>,
    ) -> Option<Fragment> {
        self.fragments.entry(type_name).or_insert_with(generate).clone()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.fragments.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
