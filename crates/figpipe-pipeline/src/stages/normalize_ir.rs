use serde_json::Value;

use figpipe_types::{
    AssetIndex, BoundingBox, DesignIr, DesignTokens, EffectStyles, FlatNode, LayoutSummary,
    Padding, Snapshot, StyleSummary,
};

/// Normalize a snapshot into the design IR.
///
/// The snapshot's node subtree becomes the IR's canonical `root_node`; the
/// flattened node list and `ordering` are derived from it by [`reindex`].
pub fn normalize_ir(snapshot: &Snapshot, tokens: &DesignTokens) -> DesignIr {
    let root_node = snapshot.node.clone();
    let mut ir = DesignIr {
        meta: snapshot.meta.clone(),
        nodes: Vec::new(),
        styles: StyleSummary {
            colors: tokens.colors.clone(),
            typography: tokens.typography.clone(),
            effects: EffectStyles {
                shadows: tokens.shadows.clone(),
                blurs: tokens.blurs.clone(),
            },
        },
        layout: layout_summary(&root_node),
        tokens: tokens.clone(),
        assets: AssetIndex::default(),
        ordering: Vec::new(),
        root_node,
    };
    reindex(&mut ir);
    ir
}

/// Regenerate the flattened index (`nodes`, `ordering`) from `root_node`.
pub fn reindex(ir: &mut DesignIr) {
    let mut nodes = Vec::new();
    let mut ordering = Vec::new();
    collect_nodes(&ir.root_node, None, 0, 0, &mut nodes, &mut ordering);
    ir.nodes = nodes;
    ir.ordering = ordering;
}

/// Depth-first pre-order walk. Child order is taken verbatim from `children`.
fn collect_nodes(
    node: &Value,
    parent_id: Option<&str>,
    depth: usize,
    child_index: usize,
    nodes: &mut Vec<FlatNode>,
    ordering: &mut Vec<String>,
) {
    let node_id = str_field(node, "id");
    let children = children_of(node);
    let child_ids: Vec<String> = children.iter().map(|c| str_field(c, "id")).collect();

    nodes.push(FlatNode {
        id: node_id.clone(),
        name: str_field(node, "name"),
        node_type: str_field(node, "type"),
        parent_id: parent_id.map(str::to_string),
        depth,
        child_index,
        children_count: children.len(),
        child_ids,
        layout_mode: node.get("layoutMode").and_then(Value::as_str).map(str::to_string),
        absolute_bounding_box: bounding_box(node),
        fills: array_field(node, "fills"),
        strokes: array_field(node, "strokes"),
        effects: array_field(node, "effects"),
        visible: node.get("visible").and_then(Value::as_bool).unwrap_or(true),
    });
    ordering.push(node_id.clone());

    for (idx, child) in children.iter().enumerate() {
        collect_nodes(child, Some(&node_id), depth + 1, idx, nodes, ordering);
    }
}

fn layout_summary(root: &Value) -> LayoutSummary {
    let num = |key: &str| root.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    let text = |key: &str| root.get(key).and_then(Value::as_str).map(str::to_string);
    LayoutSummary {
        mode: text("layoutMode"),
        primary_axis_align: text("primaryAxisAlignItems"),
        counter_axis_align: text("counterAxisAlignItems"),
        padding: Padding {
            top: num("paddingTop"),
            right: num("paddingRight"),
            bottom: num("paddingBottom"),
            left: num("paddingLeft"),
        },
        gap: num("itemSpacing"),
        bounds: bounding_box(root),
    }
}

pub(crate) fn children_of(node: &Value) -> &[Value] {
    node.get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn str_field(node: &Value, key: &str) -> String {
    node.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn array_field(node: &Value, key: &str) -> Vec<Value> {
    node.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn bounding_box(node: &Value) -> Option<BoundingBox> {
    let raw = node.get("absoluteBoundingBox")?;
    if !raw.is_object() {
        return None;
    }
    let num = |key: &str| raw.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    Some(BoundingBox {
        x: num("x"),
        y: num("y"),
        width: num("width"),
        height: num("height"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figpipe_types::SnapshotMeta;
    use serde_json::json;

    fn snapshot(node: Value) -> Snapshot {
        Snapshot {
            meta: SnapshotMeta {
                file_key: "abcdefghij".into(),
                node_id: "1:1".into(),
                figma_version: "v1".into(),
                fetched_at: "t".into(),
            },
            node,
            raw: Value::Null,
        }
    }

    fn tree() -> Value {
        json!({
            "id": "1:1", "name": "Root", "type": "FRAME",
            "layoutMode": "VERTICAL", "itemSpacing": 8, "paddingTop": 16,
            "absoluteBoundingBox": {"x": 0, "y": 0, "width": 320, "height": 200},
            "children": [
                {"id": "1:2", "name": "Header", "type": "FRAME", "children": [
                    {"id": "1:4", "name": "Title", "type": "TEXT"}
                ]},
                {"id": "1:3", "name": "Body", "type": "TEXT", "visible": false}
            ]
        })
    }

    #[test]
    fn ordering_is_preorder_and_a_permutation() {
        let ir = normalize_ir(&snapshot(tree()), &DesignTokens::default());
        assert_eq!(ir.ordering, vec!["1:1", "1:2", "1:4", "1:3"]);
        let mut ids: Vec<_> = ir.nodes.iter().map(|n| n.id.clone()).collect();
        let mut ordering = ir.ordering.clone();
        ids.sort();
        ordering.sort();
        assert_eq!(ids, ordering);
    }

    #[test]
    fn annotates_parent_depth_and_index() {
        let ir = normalize_ir(&snapshot(tree()), &DesignTokens::default());
        let title = ir.node("1:4").unwrap();
        assert_eq!(title.parent_id.as_deref(), Some("1:2"));
        assert_eq!(title.depth, 2);
        let body = ir.node("1:3").unwrap();
        assert_eq!(body.child_index, 1);
        assert!(!body.visible);
        let root = ir.node("1:1").unwrap();
        assert_eq!(root.child_ids, vec!["1:2", "1:3"]);
        assert_eq!(root.children_count, 2);
    }

    #[test]
    fn layout_summary_reads_root() {
        let ir = normalize_ir(&snapshot(tree()), &DesignTokens::default());
        assert_eq!(ir.layout.mode.as_deref(), Some("VERTICAL"));
        assert_eq!(ir.layout.gap, 8.0);
        assert_eq!(ir.layout.padding.top, 16.0);
        assert_eq!(ir.viewport(), (320, 200));
    }

    #[test]
    fn output_is_reproducible() {
        let a = normalize_ir(&snapshot(tree()), &DesignTokens::default());
        let b = normalize_ir(&snapshot(tree()), &DesignTokens::default());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn styles_mirror_tokens() {
        let tokens = DesignTokens {
            colors: vec![json!({"hex": "#ff0000"})],
            shadows: vec![json!({"type": "DROP_SHADOW"})],
            ..DesignTokens::default()
        };
        let ir = normalize_ir(&snapshot(tree()), &tokens);
        assert_eq!(ir.styles.colors.len(), 1);
        assert_eq!(ir.styles.effects.shadows.len(), 1);
    }

    #[test]
    fn reindex_follows_tree_edits() {
        let mut ir = normalize_ir(&snapshot(tree()), &DesignTokens::default());
        ir.root_node["children"]
            .as_array_mut()
            .unwrap()
            .push(json!({"id": "1:9", "type": "RECTANGLE"}));
        reindex(&mut ir);
        assert_eq!(ir.ordering.last().map(String::as_str), Some("1:9"));
    }
}
