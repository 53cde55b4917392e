//! Concrete collaborators wired into the runner by the binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use figpipe_codegen::ReactGenerator;
use figpipe_figma::{extract_design_tokens, FigmaClient};
use figpipe_pipeline::{AssetDownloader, CodeGenerator, DesignSource, DownloadedAsset};
use figpipe_types::{DesignTokens, GenerationOptions, Result};

// ---------------------------------------------------------------------------
// Figma REST source
// ---------------------------------------------------------------------------

pub struct FigmaDesignSource {
    client: FigmaClient,
}

impl FigmaDesignSource {
    pub fn new(client: FigmaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DesignSource for FigmaDesignSource {
    async fn fetch_snapshot(&self, file_key: &str, node_id: &str) -> Result<Value> {
        self.client.file_nodes(file_key, node_id).await
    }

    async fn extract_tokens(
        &self,
        _file_key: &str,
        _node_id: &str,
        root_node: &Value,
    ) -> Result<DesignTokens> {
        Ok(extract_design_tokens(root_node))
    }

    async fn resolve_image_urls(
        &self,
        file_key: &str,
        image_refs: &[String],
    ) -> Result<BTreeMap<String, String>> {
        if image_refs.is_empty() {
            return Ok(BTreeMap::new());
        }
        let mut fills = self.client.image_fills(file_key).await?;
        fills.retain(|image_ref, _| image_refs.contains(image_ref));
        Ok(fills)
    }

    async fn get_screenshot(
        &self,
        file_key: &str,
        node_id: &str,
        scale: f64,
        output_path: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(url) = self.client.render_node(file_key, node_id, scale).await? else {
            tracing::warn!(node_id, "Figma returned no render for node");
            return Ok(None);
        };
        let file = self.client.download(&url).await?;
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, &file.bytes).await?;
        Ok(Some(output_path.to_path_buf()))
    }
}

// ---------------------------------------------------------------------------
// Recorded snapshot source
// ---------------------------------------------------------------------------

/// Offline source backed by a saved file-nodes response.
///
/// A bare node object (one with an `id` but no `nodes` map) is accepted too
/// and served as the document of whatever node is requested. Image references
/// never resolve and no reference screenshot is available.
pub struct FileDesignSource {
    document: Value,
}

impl FileDesignSource {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self {
            document: serde_json::from_str(&raw)?,
        })
    }

    fn document_for(&self, node_id: &str) -> Value {
        if self.document.get("nodes").is_none() && self.document.get("id").is_some() {
            let mut nodes = serde_json::Map::new();
            nodes.insert(node_id.to_string(), json!({"document": self.document}));
            return json!({"nodes": nodes});
        }
        self.document.clone()
    }
}

#[async_trait]
impl DesignSource for FileDesignSource {
    async fn fetch_snapshot(&self, _file_key: &str, node_id: &str) -> Result<Value> {
        Ok(self.document_for(node_id))
    }

    async fn extract_tokens(
        &self,
        _file_key: &str,
        _node_id: &str,
        root_node: &Value,
    ) -> Result<DesignTokens> {
        Ok(extract_design_tokens(root_node))
    }

    async fn resolve_image_urls(
        &self,
        _file_key: &str,
        _image_refs: &[String],
    ) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    async fn get_screenshot(
        &self,
        _file_key: &str,
        _node_id: &str,
        _scale: f64,
        _output_path: &Path,
    ) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Downloader and generator
// ---------------------------------------------------------------------------

pub struct HttpAssetDownloader {
    client: FigmaClient,
}

impl HttpAssetDownloader {
    pub fn new(client: FigmaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetDownloader for HttpAssetDownloader {
    async fn download(&self, url: &str) -> Result<DownloadedAsset> {
        let file = self.client.download(url).await?;
        Ok(DownloadedAsset {
            bytes: file.bytes,
            mime: file.mime,
        })
    }
}

#[derive(Default)]
pub struct ReactCodeGenerator {
    inner: ReactGenerator,
}

impl CodeGenerator for ReactCodeGenerator {
    fn generate(&self, node: &Value, component_name: &str, options: &GenerationOptions) -> String {
        self.inner.generate_react_code(node, component_name, options)
    }

    fn sanitize_component_name(&self, raw_name: &str) -> String {
        figpipe_codegen::sanitize_component_name(raw_name)
    }
}
