//! Snapshot, design IR, asset manifest, and component graph records.
//!
//! Raw Figma nodes stay as `serde_json::Value`: the document format is wide and
//! open-ended, and downstream generators need every field. The typed records
//! here are the pipeline's own derived views of that tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub file_key: String,
    pub node_id: String,
    /// Source `lastModified` stamp, or the fetch time when the source has none.
    /// Seeds every downstream cache key.
    pub figma_version: String,
    pub fetched_at: String,
}

/// Raw fetched node subtree plus fetch metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub node: Value,
    pub raw: Value,
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignTokens {
    #[serde(default)]
    pub colors: Vec<Value>,
    #[serde(default)]
    pub typography: Vec<Value>,
    #[serde(default)]
    pub spacing: Vec<Value>,
    #[serde(default)]
    pub shadows: Vec<Value>,
    #[serde(default)]
    pub blurs: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectStyles {
    pub shadows: Vec<Value>,
    pub blurs: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSummary {
    pub colors: Vec<Value>,
    pub typography: Vec<Value>,
    pub effects: EffectStyles,
}

// ---------------------------------------------------------------------------
// Flattened nodes and layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// One node of the depth-first pre-order flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub parent_id: Option<String>,
    pub depth: usize,
    pub child_index: usize,
    pub child_ids: Vec<String>,
    pub children_count: usize,
    pub layout_mode: Option<String>,
    pub absolute_bounding_box: Option<BoundingBox>,
    pub fills: Vec<Value>,
    pub strokes: Vec<Value>,
    pub effects: Vec<Value>,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Auto-layout summary of the root node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutSummary {
    pub mode: Option<String>,
    pub primary_axis_align: Option<String>,
    pub counter_axis_align: Option<String>,
    pub padding: Padding,
    pub gap: f64,
    pub bounds: Option<BoundingBox>,
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// One materialized binary asset, stored once per content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifestItem {
    pub asset_id: String,
    pub source_node_id: String,
    pub image_ref: String,
    pub local_path: String,
    /// `/assets/figma/<hash16>.<ext>`
    pub logical_path: String,
    pub hash: String,
    pub mime: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetIndex {
    pub manifest: Vec<AssetManifestItem>,
    pub by_image_ref: BTreeMap<String, String>,
    pub download_errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// DesignIr
// ---------------------------------------------------------------------------

/// Normalized design intermediate representation.
///
/// `root_node` is the canonical tree. `nodes` and `ordering` are an index
/// derived from it and are regenerated whenever the tree is patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignIr {
    pub meta: SnapshotMeta,
    pub nodes: Vec<FlatNode>,
    pub styles: StyleSummary,
    pub layout: LayoutSummary,
    pub tokens: DesignTokens,
    pub assets: AssetIndex,
    pub ordering: Vec<String>,
    pub root_node: Value,
}

impl DesignIr {
    pub fn node(&self, id: &str) -> Option<&FlatNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Viewport for rendering the root, falling back to 1440x900.
    pub fn viewport(&self) -> (u32, u32) {
        let bounds = self.layout.bounds.unwrap_or_default();
        let width = if bounds.width > 0.0 { bounds.width.round() as u32 } else { 1440 };
        let height = if bounds.height > 0.0 { bounds.height.round() as u32 } else { 900 };
        (width.max(1), height.max(1))
    }
}

// ---------------------------------------------------------------------------
// Component graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentGraphNode {
    pub component_id: String,
    pub deps: Vec<String>,
    pub batch: usize,
    pub priority: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentBatch {
    pub batch: usize,
    pub components: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentGraph {
    pub components: Vec<ComponentGraphNode>,
    pub batches: Vec<ComponentBatch>,
}

impl ComponentGraph {
    pub fn component(&self, id: &str) -> Option<&ComponentGraphNode> {
        self.components.iter().find(|c| c.component_id == id)
    }
}
