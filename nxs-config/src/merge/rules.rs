//! Tag tables consulted by the merge engine.

use rustc_hash::{FxHashMap, FxHashSet};

/// Tags whose siblings must collapse into one; a conflict between two of
/// them is an error rather than a reason to keep both.
const NEXUS_SINGLES: &[&str] = &[
    "datasource",
    "strategy",
    "dimensions",
    "definition",
    "record",
    "device",
    "query",
    "database",
    "door",
];

/// Permitted child tags per parent tag.
const NEXUS_CHILDREN: &[(&str, &[&str])] = &[
    (
        "datasource",
        &["record", "doc", "device", "database", "query", "door", "result"],
    ),
    (
        "attribute",
        &["datasource", "strategy", "enumeration", "doc", "dimensions"],
    ),
    (
        "definition",
        &["group", "field", "attribute", "link", "component", "doc", "symbols"],
    ),
    ("dimensions", &["dim", "doc"]),
    (
        "field",
        &["attribute", "datasource", "doc", "dimensions", "enumeration", "strategy"],
    ),
    (
        "group",
        &["group", "field", "attribute", "link", "component", "doc"],
    ),
    ("link", &["doc", "datasource", "strategy"]),
    ("dim", &["datasource", "strategy", "doc"]),
];

/// The `singles` set and the one-level `allowed_children` grammar.
///
/// A parent tag without an entry in the grammar accepts any children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRules {
    singles: FxHashSet<String>,
    allowed_children: FxHashMap<String, FxHashSet<String>>,
}

impl MergeRules {
    /// Rules that merge freely and never reject a child.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules for NeXus component definitions.
    pub fn nexus() -> Self {
        let rules = NEXUS_SINGLES
            .iter()
            .fold(Self::empty(), |rules, tag| rules.with_single(*tag));
        NEXUS_CHILDREN
            .iter()
            .fold(rules, |rules, (parent, children)| {
                rules.allow(*parent, children.iter().copied())
            })
    }

    /// Adds a tag to the singles set.
    pub fn with_single(mut self, tag: impl Into<String>) -> Self {
        self.singles.insert(tag.into());
        self
    }

    /// Permits `children` under `parent`, extending any existing entry.
    pub fn allow<I, S>(mut self, parent: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_children
            .entry(parent.into())
            .or_default()
            .extend(children.into_iter().map(Into::into));
        self
    }

    /// Drops the child grammar, keeping the singles set.
    pub fn without_grammar(mut self) -> Self {
        self.allowed_children.clear();
        self
    }

    pub fn is_single(&self, tag: &str) -> bool {
        self.singles.contains(tag)
    }

    /// Permitted children of `parent`, `None` if unrestricted.
    pub fn allowed_children(&self, parent: &str) -> Option<&FxHashSet<String>> {
        self.allowed_children.get(parent)
    }

    /// Returns true if `child` may appear under `parent`.
    pub fn allows(&self, parent: &str, child: &str) -> bool {
        self.allowed_children(parent)
            .is_none_or(|allowed| allowed.contains(child))
    }
}
