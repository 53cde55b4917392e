//! Stage functions.
//!
//! Each stage consumes the previous stage's plain data and produces its own.
//! Only `fetch_snapshot`, `materialize_assets`, and `package_report` perform
//! I/O; the rest are pure.

pub mod component_dag;
pub mod fetch_snapshot;
pub mod generate;
pub mod materialize_assets;
pub mod normalize_ir;
pub mod package_report;
pub mod static_gates;
pub mod visual_gates;

pub use component_dag::build_component_dag;
pub use fetch_snapshot::{fetch_snapshot, snapshot_from_document};
pub use generate::{apply_responsive_pass, generate_react, quality_metrics, GenerationOutput};
pub use materialize_assets::{materialize_assets, AssetMaterialization};
pub use normalize_ir::{normalize_ir, reindex};
pub use package_report::{package_report, ReportBundle, VisualGateArtifact};
pub use static_gates::{run_static_gates, STATIC_GATE};
pub use visual_gates::{run_visual_gates, similarity, VISUAL_GATE};
