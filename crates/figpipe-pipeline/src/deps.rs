//! Collaborator traits the runner is wired with.
//!
//! Everything that touches the network, a browser, or a code generator sits
//! behind one of these traits so the runner itself stays deterministic and
//! testable with in-process fakes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use figpipe_types::{AssetManifestItem, DesignTokens, GenerationOptions, Result};

// ---------------------------------------------------------------------------
// DesignSource
// ---------------------------------------------------------------------------

/// Remote (or recorded) design document access.
#[async_trait]
pub trait DesignSource: Send + Sync {
    /// Raw file-nodes document. The requested node lives at `nodes[<node_id>].document`.
    async fn fetch_snapshot(&self, file_key: &str, node_id: &str) -> Result<Value>;

    async fn extract_tokens(
        &self,
        file_key: &str,
        node_id: &str,
        root_node: &Value,
    ) -> Result<DesignTokens>;

    /// Map image references to downloadable URLs. Unknown references are simply absent.
    async fn resolve_image_urls(
        &self,
        file_key: &str,
        image_refs: &[String],
    ) -> Result<BTreeMap<String, String>>;

    /// Capture a reference render of the node into `output_path`.
    ///
    /// `Ok(None)` means the source has no screenshot to offer.
    async fn get_screenshot(
        &self,
        file_key: &str,
        node_id: &str,
        scale: f64,
        output_path: &Path,
    ) -> Result<Option<PathBuf>>;
}

// ---------------------------------------------------------------------------
// AssetDownloader
// ---------------------------------------------------------------------------

/// Body and MIME type (parameters stripped) of one downloaded asset.
#[derive(Debug, Clone)]
pub struct DownloadedAsset {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[async_trait]
pub trait AssetDownloader: Send + Sync {
    async fn download(&self, url: &str) -> Result<DownloadedAsset>;
}

// ---------------------------------------------------------------------------
// CodeGenerator
// ---------------------------------------------------------------------------

/// Node tree to component source.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self, node: &Value, component_name: &str, options: &GenerationOptions) -> String;

    fn sanitize_component_name(&self, raw_name: &str) -> String;
}

// ---------------------------------------------------------------------------
// ImplementationRenderer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub code: String,
    pub component_name: String,
    pub manifest: Vec<AssetManifestItem>,
    pub width: u32,
    pub height: u32,
    pub output_path: PathBuf,
    pub use_tailwind: bool,
}

/// Screenshot path on success, or the reason the render produced nothing.
#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    pub path: Option<PathBuf>,
    pub error: Option<String>,
}

impl RenderOutcome {
    pub fn rendered(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            path: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait ImplementationRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> RenderOutcome;
}

/// Renderer for runs that never auto-render.
pub struct NoopRenderer;

#[async_trait]
impl ImplementationRenderer for NoopRenderer {
    async fn render(&self, _request: &RenderRequest) -> RenderOutcome {
        RenderOutcome::failed("Implementation rendering is not configured.")
    }
}

// ---------------------------------------------------------------------------
// PipelineDependencies
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PipelineDependencies {
    pub source: Arc<dyn DesignSource>,
    pub downloader: Arc<dyn AssetDownloader>,
    pub generator: Arc<dyn CodeGenerator>,
    pub renderer: Arc<dyn ImplementationRenderer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_renderer_reports_error() {
        let request = RenderRequest {
            code: String::new(),
            component_name: "Card".into(),
            manifest: Vec::new(),
            width: 10,
            height: 10,
            output_path: PathBuf::from("out.png"),
            use_tailwind: true,
        };
        let outcome = NoopRenderer.render(&request).await;
        assert!(outcome.path.is_none());
        assert!(outcome.error.is_some());
    }
}
