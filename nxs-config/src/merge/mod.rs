//! Structural merge of duplicate sibling subtrees.
//!
//! Importing several component definitions into one document produces
//! sibling subtrees that describe the same thing (two `datasource` elements
//! named `motor`, two `field` elements named `distance`, ...). The merger
//! folds such siblings together and reports genuine conflicts.
//!
//! # Algorithm Overview
//!
//! Nodes are processed from an explicit work list, parents before children:
//! 1. Merge the node's element children to a fixed point: find the first
//!    mergeable pair, merge it, and rescan from the start, since a merge can
//!    make a third sibling compatible with the result.
//! 2. Check every element child against the parent's allowed child tags.
//! 3. Queue the remaining element children.
//!
//! Two elements are merge candidates when their tags and `name` attributes
//! are equal. An attribute carried by both with different values keeps them
//! apart, or is an error for tags in the singles set. `field` elements must
//! also agree on their text. On error the document is left partially merged.

mod rules;

pub use rules::MergeRules;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::constants::{FIELD_TAG, NAME_ATTRIBUTE};
use crate::error::{Error, IncompatibleNodeError, Result};
use crate::node::{Document, NodeId};

/// Counters reported by a successful merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Number of sibling pairs folded together.
    pub merged: usize,
    /// Number of nodes whose children were processed.
    pub visited: usize,
}

/// The merge engine.
#[derive(Debug, Clone)]
pub struct Merger {
    rules: MergeRules,
}

impl Default for Merger {
    fn default() -> Self {
        Merger::new(MergeRules::nexus())
    }
}

impl Merger {
    /// Creates a merger using the given tag tables.
    pub fn new(rules: MergeRules) -> Self {
        Merger { rules }
    }

    pub fn rules(&self) -> &MergeRules {
        &self.rules
    }

    /// Merges the whole document in place.
    pub fn merge(&self, document: &mut Document) -> Result<MergeStats> {
        self.merge_node(document, document.root())
    }

    /// Merges the subtree below `node` in place.
    pub fn merge_node(&self, document: &mut Document, node: NodeId) -> Result<MergeStats> {
        let mut stats = MergeStats::default();
        let mut pending = vec![node];

        while let Some(current) = pending.pop() {
            stats.visited += 1;
            stats.merged += self.merge_children(document, current)?;
            self.check_children(document, current)?;

            let children: Vec<NodeId> = document
                .children(current)
                .filter(|&c| document.element(c).is_some())
                .collect();
            pending.extend(children.into_iter().rev());
        }

        debug!(
            merged = stats.merged,
            visited = stats.visited,
            "merge finished"
        );
        Ok(stats)
    }

    /// Merges the direct element children of `node` until no mergeable pair
    /// remains. Returns the number of merges performed.
    pub fn merge_children(&self, document: &mut Document, node: NodeId) -> Result<usize> {
        let mut merged = 0;
        while let Some((first, second)) = self.find_mergeable(document, node)? {
            trace!(
                path = %document.ancestor_path(first),
                "merging duplicate sibling"
            );
            self.merge_nodes(document, first, second)?;
            merged += 1;
        }
        Ok(merged)
    }

    /// Decides whether two elements can be folded into one.
    ///
    /// Fails when they are same-named siblings that must not coexist: an
    /// attribute mismatch on a singles tag, differing `name` values on a
    /// singles tag, or differing text on a `field`.
    ///
    /// Two differently named singles are rejected rather than kept apart,
    /// since a singles tag may occur only once under its parent.
    pub fn are_mergeable(&self, document: &Document, e1: NodeId, e2: NodeId) -> Result<bool> {
        let (Some(a), Some(b)) = (document.element(e1), document.element(e2)) else {
            return Ok(false);
        };
        if a.tag() != b.tag() {
            return Ok(false);
        }
        let tag = a.tag();
        let single = self.rules.is_single(tag);

        if a.name() != b.name() {
            if single && !a.name().is_empty() && !b.name().is_empty() {
                return Err(Self::attribute_conflict(
                    document,
                    e1,
                    NAME_ATTRIBUTE,
                    a.name(),
                    b.name(),
                ));
            }
            return Ok(false);
        }

        let mismatch = a.attributes().iter().find_map(|(name, first)| {
            b.attribute(name)
                .filter(|second| *second != first.as_str())
                .map(|second| (name, first, second))
        });
        if let Some((name, first, second)) = mismatch {
            if single {
                return Err(Self::attribute_conflict(document, e1, name, first, second));
            }
        }

        if tag == FIELD_TAG {
            let text1 = document.direct_text(e1);
            let text2 = document.direct_text(e2);
            let (text1, text2) = (text1.trim(), text2.trim());
            if !text1.is_empty() && !text2.is_empty() && text1 != text2 {
                return Err(IncompatibleNodeError::Values {
                    path: document.ancestor_path(e1),
                    first: text1.to_string(),
                    second: text2.to_string(),
                }
                .into());
            }
        }

        Ok(mismatch.is_none())
    }

    /// Folds `e2` into `e1` and removes `e2` from the document.
    ///
    /// Attributes of `e1` take precedence. Children of `e2` are appended to
    /// `e1` in order, except text whose trimmed value `e1` already has.
    pub fn merge_nodes(&self, document: &mut Document, e1: NodeId, e2: NodeId) -> Result<()> {
        let attributes: Vec<(String, String)> = document
            .element(e2)
            .ok_or_else(|| Error::Node(format!("{:?} is not an element", e2)))?
            .attributes()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let target = document
            .element_mut(e1)
            .ok_or_else(|| Error::Node(format!("{:?} is not an element", e1)))?;
        for (name, value) in attributes {
            target.attributes_mut().entry(name).or_insert(value);
        }

        let mut texts: FxHashSet<String> = document
            .children(e1)
            .filter_map(|c| document.text(c))
            .map(|t| t.trim().to_string())
            .collect();
        let moved: Vec<NodeId> = document.children(e2).collect();
        for child in moved {
            if let Some(text) = document.text(child) {
                if !texts.insert(text.trim().to_string()) {
                    continue;
                }
            }
            document.append(e1, child)?;
        }

        document.discard(e2)
    }

    /// Rejects element children that the grammar does not permit under
    /// `node`.
    pub fn check_children(&self, document: &Document, node: NodeId) -> Result<()> {
        let Some(allowed) = document
            .tag(node)
            .and_then(|tag| self.rules.allowed_children(tag))
        else {
            return Ok(());
        };
        for child in document.children(node) {
            if let Some(tag) = document.tag(child) {
                if !allowed.contains(tag) {
                    return Err(IncompatibleNodeError::NotAllowed {
                        path: document.ancestor_path(node),
                        child: tag.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn find_mergeable(
        &self,
        document: &Document,
        node: NodeId,
    ) -> Result<Option<(NodeId, NodeId)>> {
        let elements: Vec<NodeId> = document
            .children(node)
            .filter(|&c| document.element(c).is_some())
            .collect();
        for (i, &first) in elements.iter().enumerate() {
            for &second in &elements[i + 1..] {
                if self.are_mergeable(document, first, second)? {
                    return Ok(Some((first, second)));
                }
            }
        }
        Ok(None)
    }

    fn attribute_conflict(
        document: &Document,
        node: NodeId,
        attribute: &str,
        first: &str,
        second: &str,
    ) -> Error {
        IncompatibleNodeError::Attributes {
            path: document.ancestor_path(node),
            attribute: attribute.to_string(),
            first: first.to_string(),
            second: second.to_string(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{parse_str, print_to_string};

    fn merged(xml: &str) -> Result<Document> {
        let mut doc = parse_str(xml)?;
        Merger::default().merge(&mut doc)?;
        Ok(doc)
    }

    fn conflict(xml: &str) -> IncompatibleNodeError {
        match merged(xml) {
            Err(Error::Incompatible(e)) => e,
            other => panic!("expected a merge conflict, got {:?}", other.map(|_| ())),
        }
    }

    fn top(doc: &Document) -> NodeId {
        doc.document_element().unwrap()
    }

    #[test]
    fn test_datasources_with_same_name_merge() {
        let doc = merged(
            r#"<definition><group name="entry" type="NXentry"><field name="x">
                <datasource name="motor" type="TANGO"/>
                <datasource name="motor"/>
            </field></group></definition>"#,
        )
        .unwrap();
        let group = doc.child(top(&doc), 0).unwrap();
        let field = doc.child(group, 0).unwrap();
        assert_eq!(doc.child_count(field), 1);
        let ds = doc.child(field, 0).unwrap();
        assert_eq!(doc.attribute(ds, "name"), Some("motor"));
        assert_eq!(doc.attribute(ds, "type"), Some("TANGO"));
    }

    #[test]
    fn test_field_value_conflict() {
        let err = conflict(
            r#"<definition><group name="entry">
                <field name="distance">1.2</field>
                <field name="distance">1.3</field>
            </group></definition>"#,
        );
        let message = err.to_string();
        assert!(message.contains("1.2"), "{}", message);
        assert!(message.contains("1.3"), "{}", message);
        assert_eq!(err.path(), "definition.group:entry.field:distance");
    }

    #[test]
    fn test_disallowed_child() {
        let err = conflict(
            r#"<definition><group name="entry" type="NXentry"><bogus/></group></definition>"#,
        );
        assert_eq!(
            err,
            IncompatibleNodeError::NotAllowed {
                path: "definition.group:entry".to_string(),
                child: "bogus".to_string(),
            }
        );
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_identical_attributes_collapse() {
        let doc = merged(
            r#"<definition><field name="f">
                <attribute name="units" type="NX_CHAR"/>
                <attribute name="units" type="NX_CHAR"/>
                <attribute name="units" type="NX_CHAR"/>
            </field></definition>"#,
        )
        .unwrap();
        let field = doc.child(top(&doc), 0).unwrap();
        assert_eq!(doc.child_count(field), 1);
    }

    #[test]
    fn test_non_single_mismatch_stays_apart() {
        let doc = merged(
            r#"<definition><field name="f">
                <attribute name="units" type="NX_CHAR"/>
                <attribute name="units" type="NX_INT"/>
            </field></definition>"#,
        )
        .unwrap();
        let field = doc.child(top(&doc), 0).unwrap();
        assert_eq!(doc.child_count(field), 2);
    }

    #[test]
    fn test_single_attribute_conflict() {
        let err = conflict(
            r#"<definition><field name="f">
                <strategy mode="INIT"/>
                <strategy mode="FINAL"/>
            </field></definition>"#,
        );
        assert_eq!(
            err,
            IncompatibleNodeError::Attributes {
                path: "definition.field:f.strategy".to_string(),
                attribute: "mode".to_string(),
                first: "INIT".to_string(),
                second: "FINAL".to_string(),
            }
        );
    }

    #[test]
    fn test_single_name_conflict() {
        let err = conflict(
            r#"<definition><field name="f">
                <datasource name="a"/>
                <datasource name="b"/>
            </field></definition>"#,
        );
        assert!(matches!(
            err,
            IncompatibleNodeError::Attributes { ref attribute, .. } if attribute == "name"
        ));
    }

    #[test]
    fn test_named_and_unnamed_are_not_candidates() {
        let doc = merged(
            r#"<definition><group name="g"><field name="x"/><field/></group></definition>"#,
        )
        .unwrap();
        let group = doc.child(top(&doc), 0).unwrap();
        assert_eq!(doc.child_count(group), 2);
    }

    #[test]
    fn test_field_text_deduplicated() {
        let doc = merged(
            r#"<definition><group name="g">
                <field name="x" units="mm"> 1.2 </field>
                <field name="x" type="NX_FLOAT">1.2</field>
            </group></definition>"#,
        )
        .unwrap();
        let group = doc.child(top(&doc), 0).unwrap();
        assert_eq!(doc.child_count(group), 1);
        let field = doc.child(group, 0).unwrap();
        assert_eq!(doc.child_count(field), 1);
        assert_eq!(doc.attribute(field, "units"), Some("mm"));
        assert_eq!(doc.attribute(field, "type"), Some("NX_FLOAT"));
    }

    #[test]
    fn test_children_are_merged_recursively() {
        let doc = merged(
            r#"<definition>
                <group name="entry" type="NXentry">
                    <field name="a"><datasource name="d1" type="CLIENT"/></field>
                </group>
                <group name="entry">
                    <field name="a"><datasource name="d1"><record name="r"/></datasource></field>
                    <field name="b"/>
                </group>
            </definition>"#,
        )
        .unwrap();
        let definition = top(&doc);
        assert_eq!(doc.child_count(definition), 1);
        let group = doc.child(definition, 0).unwrap();
        assert_eq!(doc.child_count(group), 2);
        let a = doc.child(group, 0).unwrap();
        let ds = doc.child(a, 0).unwrap();
        assert_eq!(doc.attribute(ds, "type"), Some("CLIENT"));
        assert_eq!(doc.child_count(ds), 1);
    }

    #[test]
    fn test_merge_can_enable_third_sibling() {
        // After absorbing the second sibling the first one equals the third.
        let mut doc = parse_str(
            r#"<root>
                <item name="i" a="1"/>
                <item name="i" b="2"/>
                <item name="i" a="1" b="2"/>
            </root>"#,
        )
        .unwrap();
        let root = top(&doc);
        let merged = Merger::new(MergeRules::empty())
            .merge_children(&mut doc, root)
            .unwrap();
        assert_eq!(merged, 2);
        assert_eq!(doc.child_count(root), 1);
    }

    #[test]
    fn test_custom_grammar_accepts_listed_children() {
        let rules = MergeRules::empty().allow("root", ["item"]);
        let mut doc = parse_str(r#"<root><item name="a"/><item name="a"/></root>"#).unwrap();
        let stats = Merger::new(rules).merge(&mut doc).unwrap();
        assert_eq!(stats.merged, 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let xml = r#"<definition>
            <group name="entry"><field name="x"><doc>a</doc></field></group>
            <group name="entry"><field name="x"><doc>a</doc></field><field name="y"/></group>
        </definition>"#;
        let mut doc = parse_str(xml).unwrap();
        let merger = Merger::default();
        merger.merge(&mut doc).unwrap();
        let once = print_to_string(&doc).unwrap();
        let stats = merger.merge(&mut doc).unwrap();
        assert_eq!(stats.merged, 0);
        assert_eq!(print_to_string(&doc).unwrap(), once);
    }

    #[test]
    fn test_discarded_node_handles_are_stale() {
        let mut doc = parse_str(r#"<definition><doc>x</doc><doc>x</doc></definition>"#).unwrap();
        let definition = top(&doc);
        let second = doc.child(definition, 1).unwrap();
        Merger::default().merge(&mut doc).unwrap();
        assert!(!doc.contains(second));
        assert_eq!(doc.child_count(definition), 1);
    }
}
