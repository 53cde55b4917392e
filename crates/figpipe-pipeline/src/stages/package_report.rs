use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use figpipe_types::{ComponentGraph, DesignIr, GateResult, Result, Snapshot};

use super::generate::GenerationOutput;
use super::materialize_assets::AssetMaterialization;

/// Visual gate result plus the screenshots it compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualGateArtifact {
    #[serde(flatten)]
    pub gate: GateResult,
    pub figma_screenshot_path: Option<String>,
    pub implementation_screenshot_path: Option<String>,
}

/// Everything persisted for one run.
pub struct ReportBundle<'a> {
    pub snapshot: &'a Snapshot,
    pub design_ir: &'a DesignIr,
    pub assets: &'a AssetMaterialization,
    pub component_graph: &'a ComponentGraph,
    pub generation: &'a GenerationOutput,
    pub static_gate: &'a GateResult,
    pub visual_gate: &'a VisualGateArtifact,
    pub summary: &'a Value,
}

/// Write the run's artifact files under `<output_root>/<run_id>/` and return their paths.
pub async fn package_report(
    output_root: &Path,
    run_id: &str,
    bundle: &ReportBundle<'_>,
) -> Result<BTreeMap<String, String>> {
    let run_dir = output_root.join(run_id);
    tokio::fs::create_dir_all(&run_dir).await?;

    let mut artifacts = BTreeMap::new();
    artifacts.insert("run_dir".to_string(), display(&run_dir));

    let json_files: [(&str, &str, Value); 7] = [
        ("snapshot", "snapshot.json", serde_json::to_value(bundle.snapshot)?),
        ("design_ir", "design-ir.json", serde_json::to_value(bundle.design_ir)?),
        ("asset_manifest", "asset-manifest.json", serde_json::to_value(bundle.assets)?),
        ("component_graph", "component-graph.json", serde_json::to_value(bundle.component_graph)?),
        ("static_gate", "gate-static.json", serde_json::to_value(bundle.static_gate)?),
        ("visual_gate", "gate-visual.json", serde_json::to_value(bundle.visual_gate)?),
        ("summary", "summary.json", bundle.summary.clone()),
    ];

    for (key, file_name, payload) in json_files {
        let path = run_dir.join(file_name);
        tokio::fs::write(&path, serde_json::to_string_pretty(&payload)?).await?;
        artifacts.insert(key.to_string(), display(&path));
    }

    let code_path = run_dir.join("generated.tsx");
    tokio::fs::write(&code_path, &bundle.generation.code).await?;
    artifacts.insert("generated_code".to_string(), display(&code_path));

    if let Some(path) = &bundle.visual_gate.figma_screenshot_path {
        artifacts.insert("figma_screenshot".to_string(), path.clone());
    }
    if let Some(path) = &bundle.visual_gate.implementation_screenshot_path {
        artifacts.insert("implementation_screenshot".to_string(), path.clone());
    }

    tracing::info!(run_dir = %run_dir.display(), files = artifacts.len(), "Run artifacts packaged");
    Ok(artifacts)
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figpipe_types::{
        AssetIndex, DesignTokens, Framework, GateStatus, LayoutSummary, SnapshotMeta,
        StyleSummary,
    };
    use serde_json::json;

    #[tokio::test]
    async fn writes_all_files_and_optional_screenshots() {
        let meta = SnapshotMeta {
            file_key: "abcdefghij".into(),
            node_id: "1:2".into(),
            figma_version: "v".into(),
            fetched_at: "t".into(),
        };
        let snapshot = Snapshot {
            meta: meta.clone(),
            node: json!({"id": "1:2"}),
            raw: json!({}),
        };
        let design_ir = DesignIr {
            meta,
            nodes: Vec::new(),
            styles: StyleSummary::default(),
            layout: LayoutSummary::default(),
            tokens: DesignTokens::default(),
            assets: AssetIndex::default(),
            ordering: Vec::new(),
            root_node: json!({"id": "1:2"}),
        };
        let assets = AssetMaterialization {
            design_ir: design_ir.clone(),
            manifest: Vec::new(),
            by_image_ref: BTreeMap::new(),
            download_errors: Vec::new(),
            url_to_logical_path: BTreeMap::new(),
        };
        let generation = GenerationOutput {
            component_name: "Card".into(),
            framework: Framework::ReactTailwind,
            code: "export function Card() {}".into(),
            quality_metrics: BTreeMap::new(),
        };
        let static_gate = GateResult {
            gate_name: "static".into(),
            status: GateStatus::Pass,
            score: 100.0,
            threshold: 95.0,
            evidence_paths: Vec::new(),
            issues: Vec::new(),
        };
        let visual_gate = VisualGateArtifact {
            gate: GateResult::skipped("visual", 95.0, "no reference"),
            figma_screenshot_path: Some("/tmp/figma.png".into()),
            implementation_screenshot_path: None,
        };
        let summary = json!({"status": "WARN"});
        let graph = ComponentGraph::default();

        let dir = tempfile::tempdir().unwrap();
        let bundle = ReportBundle {
            snapshot: &snapshot,
            design_ir: &design_ir,
            assets: &assets,
            component_graph: &graph,
            generation: &generation,
            static_gate: &static_gate,
            visual_gate: &visual_gate,
            summary: &summary,
        };
        let artifacts = package_report(dir.path(), "run-1", &bundle).await.unwrap();

        let run_dir = dir.path().join("run-1");
        for file in [
            "snapshot.json",
            "design-ir.json",
            "asset-manifest.json",
            "component-graph.json",
            "generated.tsx",
            "gate-static.json",
            "gate-visual.json",
            "summary.json",
        ] {
            assert!(run_dir.join(file).exists(), "missing {file}");
        }
        assert_eq!(artifacts["figma_screenshot"], "/tmp/figma.png");
        assert!(!artifacts.contains_key("implementation_screenshot"));

        let visual: Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("gate-visual.json")).unwrap())
                .unwrap();
        assert_eq!(visual["gate_name"], "visual");
        assert_eq!(visual["status"], "SKIPPED");
        assert_eq!(visual["figma_screenshot_path"], "/tmp/figma.png");
    }
}
