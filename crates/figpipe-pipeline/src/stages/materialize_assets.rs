use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use figpipe_types::{AssetIndex, AssetManifestItem, DesignIr, Result};

use crate::deps::{AssetDownloader, DesignSource};
use crate::digest::sha256_hex;
use crate::stages::normalize_ir::{children_of, reindex};

/// Output of asset materialization, including the IR with `imageUrl`s patched in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMaterialization {
    pub design_ir: DesignIr,
    pub manifest: Vec<AssetManifestItem>,
    pub by_image_ref: BTreeMap<String, String>,
    pub download_errors: Vec<String>,
    pub url_to_logical_path: BTreeMap<String, String>,
}

/// Download every visible image fill once and rewrite fills to logical paths.
///
/// Per-reference failures are collected in `download_errors`; only a failure
/// to create the asset directory or write a file aborts the stage.
pub async fn materialize_assets(
    mut design_ir: DesignIr,
    source: &dyn DesignSource,
    downloader: &dyn AssetDownloader,
    assets_root: &Path,
) -> Result<AssetMaterialization> {
    let mut ref_to_node = BTreeMap::new();
    collect_image_refs(&design_ir.root_node, &mut ref_to_node);

    let mut manifest = Vec::new();
    let mut by_image_ref = BTreeMap::new();
    let mut url_to_logical_path = BTreeMap::new();
    let mut download_errors = Vec::new();

    if !ref_to_node.is_empty() {
        tokio::fs::create_dir_all(assets_root).await?;

        let refs: Vec<String> = ref_to_node.keys().cloned().collect();
        let file_key = design_ir.meta.file_key.clone();
        let url_map = match source.resolve_image_urls(&file_key, &refs).await {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, "Image URL resolution failed");
                download_errors.push(format!("Failed to resolve image URLs: {e}"));
                BTreeMap::new()
            }
        };

        for image_ref in &refs {
            let Some(url) = url_map.get(image_ref).filter(|u| !u.is_empty()) else {
                download_errors.push(format!("Missing URL for imageRef '{image_ref}'."));
                continue;
            };

            let asset = match downloader.download(url).await {
                Ok(asset) => asset,
                Err(e) => {
                    tracing::warn!(image_ref = %image_ref, error = %e, "Asset download failed");
                    download_errors.push(format!("Failed to materialize imageRef '{image_ref}': {e}"));
                    continue;
                }
            };

            let digest = sha256_hex(&asset.bytes);
            let asset_id = digest[..16].to_string();
            let filename = format!("{asset_id}.{}", mime_to_ext(&asset.mime));
            let local_path = assets_root.join(&filename);
            if !tokio::fs::try_exists(&local_path).await.unwrap_or(false) {
                tokio::fs::write(&local_path, &asset.bytes).await?;
            }

            let logical_path = format!("/assets/figma/{filename}");
            by_image_ref.insert(image_ref.clone(), logical_path.clone());
            url_to_logical_path.insert(url.clone(), logical_path.clone());
            manifest.push(AssetManifestItem {
                asset_id,
                source_node_id: ref_to_node.get(image_ref).cloned().unwrap_or_default(),
                image_ref: image_ref.clone(),
                local_path: local_path.to_string_lossy().into_owned(),
                logical_path,
                hash: digest,
                mime: asset.mime,
            });
        }

        patch_image_urls(&mut design_ir.root_node, &by_image_ref);
        reindex(&mut design_ir);
    }

    tracing::info!(
        assets = manifest.len(),
        errors = download_errors.len(),
        "Assets materialized"
    );

    design_ir.assets = AssetIndex {
        manifest: manifest.clone(),
        by_image_ref: by_image_ref.clone(),
        download_errors: download_errors.clone(),
    };

    Ok(AssetMaterialization {
        design_ir,
        manifest,
        by_image_ref,
        download_errors,
        url_to_logical_path,
    })
}

/// Visible `IMAGE` fill references mapped to the first node (pre-order) using them.
pub fn collect_image_refs(node: &Value, ref_to_node: &mut BTreeMap<String, String>) {
    let node_id = node.get("id").and_then(Value::as_str).unwrap_or_default();
    for fill in image_fills(node) {
        if let Some(image_ref) = fill.get("imageRef").and_then(Value::as_str) {
            if !image_ref.is_empty() {
                ref_to_node
                    .entry(image_ref.to_string())
                    .or_insert_with(|| node_id.to_string());
            }
        }
    }
    for child in children_of(node) {
        collect_image_refs(child, ref_to_node);
    }
}

fn image_fills(node: &Value) -> impl Iterator<Item = &Value> {
    node.get("fills")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|fill| is_visible_image_fill(fill))
}

fn is_visible_image_fill(fill: &Value) -> bool {
    fill.get("type").and_then(Value::as_str) == Some("IMAGE")
        && fill.get("visible").and_then(Value::as_bool).unwrap_or(true)
}

fn patch_image_urls(node: &mut Value, by_image_ref: &BTreeMap<String, String>) {
    if let Some(fills) = node.get_mut("fills").and_then(Value::as_array_mut) {
        for fill in fills.iter_mut().filter(|f| is_visible_image_fill(f)) {
            let logical = fill
                .get("imageRef")
                .and_then(Value::as_str)
                .and_then(|r| by_image_ref.get(r))
                .cloned();
            if let (Some(logical), Some(map)) = (logical, fill.as_object_mut()) {
                map.insert("imageUrl".into(), Value::String(logical));
            }
        }
    }
    if let Some(children) = node.get_mut("children").and_then(Value::as_array_mut) {
        for child in children {
            patch_image_urls(child, by_image_ref);
        }
    }
}

pub fn mime_to_ext(mime: &str) -> &'static str {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/gif" => "gif",
        _ => "bin",
    }
}
