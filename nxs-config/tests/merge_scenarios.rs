//! End-to-end merge behavior on component definitions.

use nxs_config::{
    parse_str, print_to_string, Document, Error, IncompatibleNodeError, MergeRules, Merger,
    ModelIndex, NodeId, TreeModel,
};
use proptest::prelude::*;

fn top(doc: &Document) -> NodeId {
    doc.document_element().unwrap()
}

fn elements(doc: &Document, parent: NodeId) -> Vec<NodeId> {
    doc.children(parent)
        .filter(|&c| doc.element(c).is_some())
        .collect()
}

#[test]
fn test_scenario_duplicate_datasource() {
    let mut doc = parse_str(
        r#"<definition><group name="entry"><field name="pos">
            <datasource name="motor" type="TANGO"/>
            <datasource name="motor"/>
        </field></group></definition>"#,
    )
    .unwrap();
    Merger::default().merge(&mut doc).unwrap();

    let group = elements(&doc, top(&doc))[0];
    let field = elements(&doc, group)[0];
    let sources = elements(&doc, field);
    assert_eq!(sources.len(), 1);
    assert_eq!(doc.attribute(sources[0], "name"), Some("motor"));
    assert_eq!(doc.attribute(sources[0], "type"), Some("TANGO"));
}

#[test]
fn test_scenario_field_values_differ() {
    let mut doc = parse_str(
        r#"<definition><group name="entry">
            <field name="distance">1.2</field>
            <field name="distance">1.3</field>
        </group></definition>"#,
    )
    .unwrap();
    let err = Merger::default().merge(&mut doc).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("\"1.2\""), "{}", message);
    assert!(message.contains("\"1.3\""), "{}", message);
    assert!(message.contains("definition.group:entry.field:distance"));
    assert!(matches!(
        err.as_incompatible(),
        Some(IncompatibleNodeError::Values { .. })
    ));
}

#[test]
fn test_scenario_bogus_child() {
    let mut doc = parse_str(
        r#"<definition><group name="entry" type="NXentry"><bogus/></group></definition>"#,
    )
    .unwrap();
    let err = Merger::default().merge(&mut doc).unwrap_err();

    match err {
        Error::Incompatible(IncompatibleNodeError::NotAllowed { path, child }) => {
            assert_eq!(path, "definition.group:entry");
            assert_eq!(child, "bogus");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_scenario_identical_attributes() {
    let mut doc = parse_str(
        r#"<definition><group name="entry"><field name="x">
            <attribute name="units" type="NX_CHAR"/>
            <attribute name="units" type="NX_CHAR"/>
            <attribute name="units" type="NX_CHAR"/>
        </field></group></definition>"#,
    )
    .unwrap();
    let stats = Merger::default().merge(&mut doc).unwrap();

    let group = elements(&doc, top(&doc))[0];
    let field = elements(&doc, group)[0];
    assert_eq!(elements(&doc, field).len(), 1);
    assert_eq!(stats.merged, 2);
}

#[test]
fn test_grammar_can_be_disabled() {
    let mut doc = parse_str(
        r#"<definition><group name="entry"><bogus/><bogus/></group></definition>"#,
    )
    .unwrap();
    let merger = Merger::new(MergeRules::nexus().without_grammar());
    merger.merge(&mut doc).unwrap();

    let group = elements(&doc, top(&doc))[0];
    assert_eq!(elements(&doc, group).len(), 1);
}

#[test]
fn test_import_components_then_merge() {
    let first = parse_str(
        r#"<definition><group name="entry" type="NXentry">
            <field name="title">run</field>
        </group></definition>"#,
    )
    .unwrap();
    let second = parse_str(
        r#"<definition><group name="entry">
            <group name="instrument" type="NXinstrument"/>
            <field name="title">run</field>
        </group></definition>"#,
    )
    .unwrap();

    let mut doc = first;
    let target = top(&doc);
    for child in elements(&second, top(&second)) {
        doc.import(&second, child, target).unwrap();
    }
    assert_eq!(elements(&doc, target).len(), 2);

    Merger::default().merge(&mut doc).unwrap();
    let groups = elements(&doc, target);
    assert_eq!(groups.len(), 1);
    let entry = groups[0];
    assert_eq!(doc.attribute(entry, "type"), Some("NXentry"));
    let children = elements(&doc, entry);
    assert_eq!(children.len(), 2);
    assert_eq!(doc.direct_text(children[0]), "run");
}

#[test]
fn test_model_merge_resets_cache() {
    let doc = parse_str(
        r#"<definition><doc>a</doc><doc>a</doc><group name="g"/></definition>"#,
    )
    .unwrap();
    let mut model = TreeModel::new(doc);
    let definition = model.index(0, 0, ModelIndex::invalid());
    let stale = model.index(1, 0, definition);
    assert!(stale.is_valid());

    let stats = model.merge(&Merger::default()).unwrap();
    assert_eq!(stats.merged, 1);

    assert_eq!(model.data(stale), "");
    let definition = model.index(0, 0, ModelIndex::invalid());
    assert_eq!(model.row_count(definition), 2);
    let second = model.index(1, 0, definition);
    assert_eq!(model.data(second), "group: g");
}

const TAGS: &[&str] = &["group", "item"];
const NAMES: &[&str] = &["a", "b"];
const VALUES: &[&str] = &["1", "2"];

/// Node `i + 1` hangs below node `parent % (i + 1)`; optional `name` and
/// `kind` attributes come from small alphabets so duplicates are common.
fn build_document(spec: &[(usize, usize, usize, usize)]) -> Document {
    let mut doc = Document::new();
    let top = doc.create_element("root");
    doc.append(doc.root(), top).unwrap();
    let mut nodes = vec![top];
    for &(parent, tag, name, value) in spec {
        let parent = nodes[parent % nodes.len()];
        let node = doc.create_element(TAGS[tag]);
        if name > 0 {
            doc.set_attribute(node, "name", NAMES[name - 1]).unwrap();
        }
        if value > 0 {
            doc.set_attribute(node, "kind", VALUES[value - 1]).unwrap();
        }
        doc.append(parent, node).unwrap();
        nodes.push(node);
    }
    doc
}

proptest! {
    #[test]
    fn prop_merge_is_idempotent(
        spec in prop::collection::vec((any::<usize>(), 0usize..2, 0usize..3, 0usize..3), 0..30),
    ) {
        let mut doc = build_document(&spec);
        let merger = Merger::new(MergeRules::empty());

        merger.merge(&mut doc).unwrap();
        let once = print_to_string(&doc).unwrap();
        let stats = merger.merge(&mut doc).unwrap();

        prop_assert_eq!(stats.merged, 0);
        prop_assert_eq!(print_to_string(&doc).unwrap(), once);
    }

    #[test]
    fn prop_merged_siblings_are_distinct(
        spec in prop::collection::vec((any::<usize>(), 0usize..2, 0usize..3, 0usize..3), 0..30),
    ) {
        let mut doc = build_document(&spec);
        let merger = Merger::new(MergeRules::empty());
        merger.merge(&mut doc).unwrap();

        let mut stack = vec![top(&doc)];
        while let Some(node) = stack.pop() {
            let children = elements(&doc, node);
            for (i, &first) in children.iter().enumerate() {
                for &second in &children[i + 1..] {
                    prop_assert!(!merger.are_mergeable(&doc, first, second).unwrap());
                }
            }
            stack.extend(children);
        }
    }
}
