//! Shared types, errors, and status enums for the figpipe pipeline.
//!
//! This crate provides the foundational types used across all other figpipe crates:
//! - `FigpipeError`: unified error taxonomy
//! - `PipelineRunRequest` / `PipelineRunResult`: the runner's public contract
//! - `GateResult` and the closed `GateStatus` / `PipelineStatus` enums
//! - [`ir`]: snapshot, design IR, asset manifest, and component graph records

pub mod ir;

pub use ir::{
    AssetIndex, AssetManifestItem, BoundingBox, ComponentBatch, ComponentGraph,
    ComponentGraphNode, DesignIr, DesignTokens, EffectStyles, FlatNode, LayoutSummary, Padding,
    Snapshot, SnapshotMeta, StyleSummary,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unified error type for all figpipe subsystems.
#[derive(Debug, thiserror::Error)]
pub enum FigpipeError {
    // === Input Errors ===
    #[error("Node '{node_id}' not found in file '{file_key}'")]
    NodeNotFound { file_key: String, node_id: String },

    #[error("Invalid pipeline request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported framework for the React stage: {0}")]
    UnsupportedFramework(String),

    // === Remote API Errors ===
    #[error("Authentication failed for {service}")]
    AuthError { service: String },

    #[error("Rate limited by Figma, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Figma API returned HTTP {status}: {message}")]
    ApiError {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("HTTP transport error: {0}")]
    Http(String),

    // === Rendering Errors ===
    #[error("Implementation render timed out after {timeout_ms}ms")]
    RenderTimeout { timeout_ms: u64 },

    #[error("Implementation render failed: {0}")]
    RenderFailed(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FigpipeError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FigpipeError::RateLimited { .. }
                | FigpipeError::Http(_)
                | FigpipeError::ApiError {
                    retryable: true,
                    ..
                }
        )
    }

    /// Returns `true` if the error is permanent and retrying will not help.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FigpipeError::AuthError { .. }
                | FigpipeError::InvalidRequest(_)
                | FigpipeError::NodeNotFound { .. }
                | FigpipeError::UnsupportedFramework(_)
        )
    }
}

/// A convenience alias for `Result<T, FigpipeError>`.
pub type Result<T> = std::result::Result<T, FigpipeError>;

// ---------------------------------------------------------------------------
// Request enums
// ---------------------------------------------------------------------------

/// Generation mode for the React stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    #[default]
    StrictPixel,
    StrictPixelPlusResponsive,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::StrictPixel => "strict_pixel",
            PipelineMode::StrictPixelPlusResponsive => "strict_pixel_plus_responsive",
        }
    }
}

impl std::str::FromStr for PipelineMode {
    type Err = FigpipeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict_pixel" => Ok(PipelineMode::StrictPixel),
            "strict_pixel_plus_responsive" => Ok(PipelineMode::StrictPixelPlusResponsive),
            other => Err(FigpipeError::InvalidRequest(format!("unknown mode '{other}'"))),
        }
    }
}

/// Target framework of the generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    React,
    #[default]
    ReactTailwind,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::React => "react",
            Framework::ReactTailwind => "react_tailwind",
        }
    }

    pub fn uses_tailwind(&self) -> bool {
        matches!(self, Framework::ReactTailwind)
    }
}

impl std::str::FromStr for Framework {
    type Err = FigpipeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "react" => Ok(Framework::React),
            "react_tailwind" => Ok(Framework::ReactTailwind),
            other => Err(FigpipeError::UnsupportedFramework(other.to_string())),
        }
    }
}

/// How the visual gate reports non-passing comparisons.
///
/// `Hybrid` adds a diff-map explanation (severity bucket, primary diff region,
/// contrast-enhanced evidence image) whenever the score misses the pass threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualMode {
    #[default]
    Hybrid,
    Pixel,
}

impl VisualMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualMode::Hybrid => "hybrid",
            VisualMode::Pixel => "pixel",
        }
    }
}

impl std::str::FromStr for VisualMode {
    type Err = FigpipeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hybrid" => Ok(VisualMode::Hybrid),
            "pixel" => Ok(VisualMode::Pixel),
            other => Err(FigpipeError::InvalidRequest(format!("unknown visual mode '{other}'"))),
        }
    }
}

/// Fixed-shape options handed to a code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub use_tailwind: bool,
    /// Emit exact pixel geometry (sizes, offsets, clipping) instead of looser layout.
    pub hard_fidelity: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            use_tailwind: true,
            hard_fidelity: true,
        }
    }
}

impl GenerationOptions {
    /// Options for a framework and mode. Both pipeline modes are strict-pixel profiles.
    pub fn for_request(framework: Framework, mode: PipelineMode) -> Self {
        Self {
            use_tailwind: framework.uses_tailwind(),
            hard_fidelity: match mode {
                PipelineMode::StrictPixel | PipelineMode::StrictPixelPlusResponsive => true,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Overall pipeline run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Pass,
    Warn,
    Fail,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Pass => "PASS",
            PipelineStatus::Warn => "WARN",
            PipelineStatus::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-gate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

impl GateStatus {
    /// Map a score onto a status: `>= pass` passes, `>= warn` warns, anything lower fails.
    pub fn from_score(score: f64, pass_threshold: f64, warn_threshold: f64) -> Self {
        if score >= pass_threshold {
            GateStatus::Pass
        } else if score >= warn_threshold {
            GateStatus::Warn
        } else {
            GateStatus::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Pass => "PASS",
            GateStatus::Warn => "WARN",
            GateStatus::Fail => "FAIL",
            GateStatus::Skipped => "SKIPPED",
        }
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GateResult: one gate's outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_name: String,
    pub status: GateStatus,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub evidence_paths: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl GateResult {
    /// A gate that did not run, with the reason recorded as its only issue.
    pub fn skipped(gate_name: impl Into<String>, threshold: f64, reason: impl Into<String>) -> Self {
        Self {
            gate_name: gate_name.into(),
            status: GateStatus::Skipped,
            score: 0.0,
            threshold,
            evidence_paths: Vec::new(),
            issues: vec![reason.into()],
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineRunRequest
// ---------------------------------------------------------------------------

/// Canonical request consumed by the runner. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineRunRequest {
    pub file_key: String,
    pub node_id: String,
    #[serde(default)]
    pub framework: Framework,
    #[serde(default)]
    pub mode: PipelineMode,
    #[serde(default = "default_target_match")]
    pub target_match: f64,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_max_visual_iterations")]
    pub max_visual_iterations: u32,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub run_label: Option<String>,
    /// Falls back to the runner's configured mode when absent.
    #[serde(default)]
    pub visual_mode: Option<VisualMode>,
    #[serde(default = "default_screenshot_scale")]
    pub figma_screenshot_scale: f64,
    #[serde(default)]
    pub implementation_screenshot_path: Option<String>,
    #[serde(default = "default_true")]
    pub auto_render_implementation: bool,
}

fn default_target_match() -> f64 {
    0.95
}

fn default_true() -> bool {
    true
}

fn default_max_visual_iterations() -> u32 {
    3
}

fn default_screenshot_scale() -> f64 {
    2.0
}

impl PipelineRunRequest {
    /// Request with every optional field at its default.
    pub fn new(file_key: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            file_key: file_key.into().trim().to_string(),
            node_id: node_id.into().trim().to_string(),
            framework: Framework::default(),
            mode: PipelineMode::default(),
            target_match: default_target_match(),
            use_cache: true,
            max_visual_iterations: default_max_visual_iterations(),
            output_dir: None,
            run_label: None,
            visual_mode: None,
            figma_screenshot_scale: default_screenshot_scale(),
            implementation_screenshot_path: None,
            auto_render_implementation: true,
        }
    }

    /// Check field ranges. The runner refuses requests that fail here before any stage runs.
    pub fn validate(&self) -> Result<()> {
        let key_len = self.file_key.trim().chars().count();
        if !(10..=64).contains(&key_len) {
            return Err(FigpipeError::InvalidRequest(format!(
                "file_key must be 10-64 characters, got {key_len}"
            )));
        }
        if self.node_id.trim().is_empty() {
            return Err(FigpipeError::InvalidRequest("node_id must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.target_match) {
            return Err(FigpipeError::InvalidRequest(format!(
                "target_match must be within [0, 1], got {}",
                self.target_match
            )));
        }
        if !(1..=5).contains(&self.max_visual_iterations) {
            return Err(FigpipeError::InvalidRequest(format!(
                "max_visual_iterations must be within [1, 5], got {}",
                self.max_visual_iterations
            )));
        }
        if !(0.01..=4.0).contains(&self.figma_screenshot_scale) {
            return Err(FigpipeError::InvalidRequest(format!(
                "figma_screenshot_scale must be within [0.01, 4], got {}",
                self.figma_screenshot_scale
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PipelineRunResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub pipeline_version: String,
    pub config_hash: String,
    pub visual_mode: VisualMode,
}

/// Complete output of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunResult {
    pub run_id: String,
    pub status: PipelineStatus,
    pub stage_timings: BTreeMap<String, f64>,
    pub quality_metrics: BTreeMap<String, serde_json::Value>,
    pub artifacts: BTreeMap<String, String>,
    pub fallback_count: u32,
    pub errors: Vec<String>,
    pub gates: Vec<GateResult>,
    pub cache_hits: Vec<String>,
    pub cache_misses: Vec<String>,
    pub metadata: RunMetadata,
}

impl PipelineRunResult {
    /// Look up a gate by name.
    pub fn gate(&self, name: &str) -> Option<&GateResult> {
        self.gates.iter().find(|g| g.gate_name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_options_follow_framework() {
        let plain = GenerationOptions::for_request(Framework::React, PipelineMode::StrictPixel);
        assert!(!plain.use_tailwind);
        assert!(plain.hard_fidelity);
        let tw = GenerationOptions::for_request(
            Framework::ReactTailwind,
            PipelineMode::StrictPixelPlusResponsive,
        );
        assert!(tw.use_tailwind);
    }

    #[test]
    fn error_display_node_not_found() {
        let err = FigpipeError::NodeNotFound {
            file_key: "abcdefghij".into(),
            node_id: "1:2".into(),
        };
        assert_eq!(err.to_string(), "Node '1:2' not found in file 'abcdefghij'");
    }

    #[test]
    fn error_display_api_error() {
        let err = FigpipeError::ApiError {
            status: 500,
            message: "internal".into(),
            retryable: true,
        };
        assert_eq!(err.to_string(), "Figma API returned HTTP 500: internal");
    }

    #[test]
    fn error_display_render_timeout() {
        let err = FigpipeError::RenderTimeout { timeout_ms: 90_000 };
        assert_eq!(err.to_string(), "Implementation render timed out after 90000ms");
    }

    #[test]
    fn retryable_classification() {
        assert!(FigpipeError::RateLimited { retry_after_ms: 10 }.is_retryable());
        assert!(FigpipeError::Http("reset".into()).is_retryable());
        assert!(!FigpipeError::ApiError {
            status: 404,
            message: "nope".into(),
            retryable: false
        }
        .is_retryable());
        assert!(!FigpipeError::AuthError {
            service: "figma".into()
        }
        .is_retryable());
    }

    #[test]
    fn terminal_classification() {
        assert!(FigpipeError::AuthError {
            service: "figma".into()
        }
        .is_terminal());
        assert!(FigpipeError::InvalidRequest("bad".into()).is_terminal());
        assert!(!FigpipeError::RateLimited { retry_after_ms: 0 }.is_terminal());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FigpipeError = io_err.into();
        assert!(matches!(err, FigpipeError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    // --- status enums ---

    #[test]
    fn statuses_serialize_upper_case() {
        assert_eq!(serde_json::to_string(&GateStatus::Skipped).unwrap(), "\"SKIPPED\"");
        assert_eq!(serde_json::to_string(&PipelineStatus::Warn).unwrap(), "\"WARN\"");
        let status: GateStatus = serde_json::from_str("\"FAIL\"").unwrap();
        assert_eq!(status, GateStatus::Fail);
    }

    #[test]
    fn mode_and_framework_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&PipelineMode::StrictPixelPlusResponsive).unwrap(),
            "\"strict_pixel_plus_responsive\""
        );
        assert_eq!(
            serde_json::to_string(&Framework::ReactTailwind).unwrap(),
            "\"react_tailwind\""
        );
        assert_eq!("react".parse::<Framework>().unwrap(), Framework::React);
        assert!(matches!(
            "swiftui".parse::<Framework>(),
            Err(FigpipeError::UnsupportedFramework(_))
        ));
        assert_eq!(
            "strict_pixel_plus_responsive".parse::<PipelineMode>().unwrap(),
            PipelineMode::StrictPixelPlusResponsive
        );
        assert_eq!("pixel".parse::<VisualMode>().unwrap(), VisualMode::Pixel);
        assert!("dom".parse::<VisualMode>().is_err());
    }

    #[test]
    fn gate_status_thresholds_are_boundary_exact() {
        assert_eq!(GateStatus::from_score(84.99, 95.0, 85.0), GateStatus::Fail);
        assert_eq!(GateStatus::from_score(85.0, 95.0, 85.0), GateStatus::Warn);
        assert_eq!(GateStatus::from_score(94.99, 95.0, 85.0), GateStatus::Warn);
        assert_eq!(GateStatus::from_score(95.0, 95.0, 85.0), GateStatus::Pass);
    }

    // --- request ---

    #[test]
    fn request_defaults() {
        let req = PipelineRunRequest::new(" qyFsYyLyBsutXGGzZ9PLCp ", "1:2");
        assert_eq!(req.file_key, "qyFsYyLyBsutXGGzZ9PLCp");
        assert_eq!(req.framework, Framework::ReactTailwind);
        assert_eq!(req.mode, PipelineMode::StrictPixel);
        assert_eq!(req.max_visual_iterations, 3);
        assert!(req.use_cache);
        assert!(req.auto_render_implementation);
        req.validate().unwrap();
    }

    #[test]
    fn request_rejects_out_of_range_fields() {
        let mut req = PipelineRunRequest::new("qyFsYyLyBsutXGGzZ9PLCp", "1:2");
        req.target_match = 1.5;
        assert!(matches!(req.validate(), Err(FigpipeError::InvalidRequest(_))));

        let mut req = PipelineRunRequest::new("qyFsYyLyBsutXGGzZ9PLCp", "1:2");
        req.max_visual_iterations = 0;
        assert!(req.validate().is_err());
        req.max_visual_iterations = 6;
        assert!(req.validate().is_err());

        let req = PipelineRunRequest::new("short", "1:2");
        assert!(req.validate().is_err());

        let req = PipelineRunRequest::new("qyFsYyLyBsutXGGzZ9PLCp", "  ");
        assert!(req.validate().is_err());
    }

    #[test]
    fn request_deserializes_with_defaults_and_rejects_unknown_fields() {
        let req: PipelineRunRequest =
            serde_json::from_str(r#"{"file_key":"qyFsYyLyBsutXGGzZ9PLCp","node_id":"1:2"}"#)
                .unwrap();
        assert_eq!(req.target_match, 0.95);
        assert_eq!(req.figma_screenshot_scale, 2.0);

        let bad = serde_json::from_str::<PipelineRunRequest>(
            r#"{"file_key":"qyFsYyLyBsutXGGzZ9PLCp","node_id":"1:2","extra":1}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn skipped_gate_records_reason() {
        let gate = GateResult::skipped("visual", 95.0, "not executed");
        assert_eq!(gate.status, GateStatus::Skipped);
        assert_eq!(gate.score, 0.0);
        assert_eq!(gate.issues, vec!["not executed".to_string()]);
    }
}
