//! Cache-aware, gated pipeline turning a Figma node into validated React code.
//!
//! This crate implements the figpipe runner: snapshot fetch, IR normalization,
//! asset materialization, component DAG batching, code generation, static and
//! visual gates, the bounded patch loop, the exception lane, and run packaging.
//! External systems are reached only through the traits in [`deps`].

pub mod cache;
pub mod deps;
pub mod digest;
pub mod events;
pub mod exception_lane;
pub mod metrics;
pub mod patch;
pub mod render;
pub mod runner;
pub mod stages;
pub mod status;

pub use cache::StageCache;
pub use deps::{
    AssetDownloader, CodeGenerator, DesignSource, DownloadedAsset, ImplementationRenderer,
    NoopRenderer, PipelineDependencies, RenderOutcome, RenderRequest,
};
pub use digest::{canonical_json, sha256_hex, stable_digest};
pub use events::{EventEmitter, PipelineEvent};
pub use exception_lane::{run_exception_lane, ExceptionLaneOutcome};
pub use metrics::StageMetrics;
pub use patch::{
    add_overflow_hidden_for_rounded, normalize_tailwind_arbitrary_classes, ClipRoundedContainers,
    NormalizeArbitraryClasses, PatchRegistry, PatchStrategy,
};
pub use render::ChromeRenderer;
pub use runner::{run_identity_hash, PipelineConfig, PipelineRunner};
pub use stages::{
    build_component_dag, generate_react, normalize_ir, reindex, run_static_gates,
    run_visual_gates, AssetMaterialization, GenerationOutput, STATIC_GATE, VISUAL_GATE,
};
pub use status::{derive_pipeline_status, failing_gates};
