use chrono::Utc;
use serde_json::Value;

use figpipe_types::{FigpipeError, Result, Snapshot, SnapshotMeta};

use crate::deps::DesignSource;

/// Fetch the raw document and pull out the requested node subtree.
pub async fn fetch_snapshot(
    file_key: &str,
    node_id: &str,
    source: &dyn DesignSource,
) -> Result<Snapshot> {
    let raw = source.fetch_snapshot(file_key, node_id).await?;
    snapshot_from_document(file_key, node_id, raw)
}

/// Build a snapshot from an already fetched document.
pub fn snapshot_from_document(file_key: &str, node_id: &str, raw: Value) -> Result<Snapshot> {
    let node = raw
        .get("nodes")
        .and_then(|nodes| nodes.get(node_id))
        .and_then(|entry| entry.get("document"))
        .filter(|doc| doc.as_object().is_some_and(|map| !map.is_empty()))
        .cloned()
        .ok_or_else(|| FigpipeError::NodeNotFound {
            file_key: file_key.to_string(),
            node_id: node_id.to_string(),
        })?;

    let now = Utc::now().to_rfc3339();
    let figma_version = raw
        .get("lastModified")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| now.clone());

    Ok(Snapshot {
        meta: SnapshotMeta {
            file_key: file_key.to_string(),
            node_id: node_id.to_string(),
            figma_version,
            fetched_at: now,
        },
        node,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_node_and_version() {
        let raw = json!({
            "lastModified": "2026-03-01T10:00:00Z",
            "nodes": {"1:2": {"document": {"id": "1:2", "type": "FRAME"}}}
        });
        let snapshot = snapshot_from_document("abcdefghij", "1:2", raw).unwrap();
        assert_eq!(snapshot.meta.figma_version, "2026-03-01T10:00:00Z");
        assert_eq!(snapshot.node["type"], "FRAME");
        assert_eq!(snapshot.raw["nodes"]["1:2"]["document"]["id"], "1:2");
    }

    #[test]
    fn missing_version_falls_back_to_now() {
        let raw = json!({"nodes": {"1:2": {"document": {"id": "1:2"}}}});
        let snapshot = snapshot_from_document("abcdefghij", "1:2", raw).unwrap();
        assert!(!snapshot.meta.figma_version.is_empty());
        assert_eq!(snapshot.meta.figma_version, snapshot.meta.fetched_at);
    }

    #[test]
    fn absent_or_empty_node_is_not_found() {
        for raw in [
            json!({"nodes": {}}),
            json!({"nodes": {"1:2": {"document": {}}}}),
            json!({"nodes": {"1:2": null}}),
            json!({}),
        ] {
            let err = snapshot_from_document("abcdefghij", "1:2", raw).unwrap_err();
            assert!(matches!(err, FigpipeError::NodeNotFound { .. }));
        }
    }
}
