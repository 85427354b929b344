//! Layout fragments: the subtree a unit generates once per type and the shell
//! clones for every instance.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::error::{Result, ShellError};

/// `tag#id.class.class`, every part optional but at least one present.
static SELECTOR: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9-]*)?(?:#([A-Za-z0-9_-]+))?((?:\.[A-Za-z0-9_-]+)*)$")
});

/// One element of a layout fragment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        selector.tag.as_ref().is_none_or(|t| t.eq_ignore_ascii_case(&self.tag))
            && selector.id.as_ref().is_none_or(|id| self.id.as_ref() == Some(id))
            && selector.classes.iter().all(|c| self.classes.contains(c))
    }

    fn find(&self, selector: &Selector) -> Option<&Node> {
        if self.matches(selector) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(selector))
    }
}

/// Parsed simple selector.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let pattern = SELECTOR
            .as_ref()
            .map_err(|_| ShellError::InvalidSelector(input.to_string()))?;
        let caps = pattern
            .captures(input)
            .filter(|_| !input.is_empty())
            .ok_or_else(|| ShellError::InvalidSelector(input.to_string()))?;

        Ok(Self {
            tag: caps.get(1).map(|m| m.as_str().to_string()),
            id: caps.get(2).map(|m| m.as_str().to_string()),
            classes: caps
                .get(3)
                .map(|m| {
                    m.as_str()
                        .split('.')
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

/// A generated subtree attached under a unit's root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fragment {
    pub nodes: Vec<Node>,
}

impl Fragment {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node (depth-first) matching `selector`.
    pub fn select(&self, selector: &str) -> Result<Option<&Node>> {
        let selector = Selector::parse(selector)?;
        Ok(self.nodes.iter().find_map(|node| node.find(&selector)))
    }
}
