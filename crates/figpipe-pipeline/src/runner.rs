//! Pipeline runner: stage sequencing, caching, gating, patching, packaging.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use figpipe_types::{
    DesignTokens, GateResult, GateStatus, PipelineRunRequest, PipelineRunResult, PipelineStatus,
    Result, RunMetadata, VisualMode,
};

use crate::cache::StageCache;
use crate::deps::{PipelineDependencies, RenderOutcome, RenderRequest};
use crate::digest::stable_digest;
use crate::events::{EventEmitter, PipelineEvent};
use crate::exception_lane::run_exception_lane;
use crate::metrics::StageMetrics;
use crate::patch::PatchRegistry;
use crate::stages::{
    build_component_dag, fetch_snapshot, generate_react, materialize_assets, normalize_ir,
    package_report, run_static_gates, run_visual_gates, AssetMaterialization, GenerationOutput,
    ReportBundle, VisualGateArtifact, VISUAL_GATE,
};
use crate::status::derive_pipeline_status;

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Runner-wide settings. Everything here except the roots feeds the config hash.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub pipeline_version: String,
    pub cache_root: PathBuf,
    pub output_root: PathBuf,
    pub cache_enabled: bool,
    pub pass_threshold: f64,
    pub warn_threshold: f64,
    /// Used when a request does not pick a visual mode.
    pub visual_mode: VisualMode,
    pub render_timeout: Duration,
    /// Upper bound on patch iterations regardless of the request's budget.
    pub max_patch_iterations: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_version: "2.0.0".to_string(),
            cache_root: PathBuf::from(".qa/cache"),
            output_root: PathBuf::from(".qa/runs"),
            cache_enabled: true,
            pass_threshold: 95.0,
            warn_threshold: 85.0,
            visual_mode: VisualMode::Hybrid,
            render_timeout: Duration::from_secs(90),
            max_patch_iterations: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-run bookkeeping
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RunState {
    metrics: StageMetrics,
    cache_hits: Vec<String>,
    cache_misses: Vec<String>,
    errors: Vec<String>,
}

struct CacheScope {
    base_key: String,
    enabled: bool,
}

/// Identity of a run: stable across runs of the same request.
pub fn run_identity_hash(request: &PipelineRunRequest, pipeline_version: &str) -> String {
    stable_digest(&json!({
        "file_key": request.file_key,
        "node_id": request.node_id,
        "framework": request.framework.as_str(),
        "mode": request.mode.as_str(),
        "pipeline_version": pipeline_version,
    }))
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

pub struct PipelineRunner {
    deps: PipelineDependencies,
    config: PipelineConfig,
    cache: StageCache,
    patches: PatchRegistry,
    events: EventEmitter,
}

impl PipelineRunner {
    /// Build a runner, creating the cache root if needed.
    pub fn new(deps: PipelineDependencies, config: PipelineConfig) -> Result<Self> {
        let cache = StageCache::new(&config.cache_root)?;
        Ok(Self {
            deps,
            config,
            cache,
            patches: PatchRegistry::default(),
            events: EventEmitter::default(),
        })
    }

    /// Replace the patch strategies tried after a visual failure.
    pub fn with_patches(mut self, patches: PatchRegistry) -> Self {
        self.patches = patches;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Execute one run end to end.
    ///
    /// Only request validation, a missing node, a failed snapshot fetch, and
    /// artifact write failures are returned as errors. Everything else lands
    /// in the result's `errors` and `status`.
    pub async fn run(&self, request: &PipelineRunRequest) -> Result<PipelineRunResult> {
        request.validate()?;

        let cfg = &self.config;
        let visual_mode = request.visual_mode.unwrap_or(cfg.visual_mode);
        let run_hash = run_identity_hash(request, &cfg.pipeline_version);
        let run_id = format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &run_hash[..10]);

        let output_root = request
            .output_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| cfg.output_root.clone());
        let run_dir = output_root.join(&run_id);

        tracing::info!(run_id = %run_id, file_key = %request.file_key, node_id = %request.node_id, "Pipeline run started");
        self.events.emit(PipelineEvent::RunStarted {
            run_id: run_id.clone(),
            file_key: request.file_key.clone(),
            node_id: request.node_id.clone(),
        });

        let config_hash = stable_digest(&json!({
            "pipeline_version": cfg.pipeline_version,
            "cache_enabled": cfg.cache_enabled,
            "pass_threshold": cfg.pass_threshold,
            "warn_threshold": cfg.warn_threshold,
            "visual_mode": visual_mode.as_str(),
            "target_match": request.target_match,
            "mode": request.mode.as_str(),
            "framework": request.framework.as_str(),
        }));

        let mut state = RunState::default();

        // The snapshot is never cached: its version marker seeds every other key.
        self.events.emit(PipelineEvent::StageStarted {
            stage: "fetch_snapshot".into(),
        });
        let started = Instant::now();
        let snapshot = state
            .metrics
            .timed(
                "fetch_snapshot",
                fetch_snapshot(&request.file_key, &request.node_id, self.deps.source.as_ref()),
            )
            .await?;
        self.stage_completed("fetch_snapshot", false, started);
        tokio::fs::create_dir_all(&run_dir).await?;

        let figma_version = snapshot.meta.figma_version.clone();
        let scope = CacheScope {
            base_key: stable_digest(&json!({
                "file_key": request.file_key,
                "node_id": request.node_id,
                "figma_version": figma_version,
                "pipeline_version": cfg.pipeline_version,
                "config_hash": config_hash,
                "framework": request.framework.as_str(),
                "mode": request.mode.as_str(),
            })),
            enabled: request.use_cache && cfg.cache_enabled,
        };
        tracing::debug!(base_key = %scope.base_key, figma_version = %figma_version, "Cache scope established");

        let tokens: DesignTokens = match self
            .cached_stage(
                &mut state,
                &scope,
                "extract_tokens",
                json!({
                    "file_key": request.file_key,
                    "node_id": request.node_id,
                    "figma_version": figma_version,
                }),
                || {
                    self.deps
                        .source
                        .extract_tokens(&request.file_key, &request.node_id, &snapshot.node)
                },
            )
            .await
        {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "Token extraction failed, continuing without tokens");
                state.errors.push(format!("Token extraction failed: {e}"));
                DesignTokens::default()
            }
        };

        let design_ir = self
            .cached_stage(
                &mut state,
                &scope,
                "normalize_ir",
                json!({
                    "node_id": request.node_id,
                    "token_hash": stable_digest(&tokens),
                }),
                || async { Ok(normalize_ir(&snapshot, &tokens)) },
            )
            .await?;

        let assets_root = cfg.cache_root.join("assets");
        let assets: AssetMaterialization = self
            .cached_stage(
                &mut state,
                &scope,
                "materialize_assets",
                json!({
                    "node_id": request.node_id,
                    "figma_version": figma_version,
                }),
                || {
                    materialize_assets(
                        design_ir.clone(),
                        self.deps.source.as_ref(),
                        self.deps.downloader.as_ref(),
                        &assets_root,
                    )
                },
            )
            .await?;
        for message in &assets.download_errors {
            tracing::warn!(%message, "Asset download error");
        }
        let design_ir = &assets.design_ir;

        let component_graph = self
            .cached_stage(
                &mut state,
                &scope,
                "build_component_dag",
                json!({
                    "ordering_hash": stable_digest(&json!({"ordering": design_ir.ordering})),
                }),
                || async { Ok(build_component_dag(design_ir)) },
            )
            .await?;

        let mut generation: GenerationOutput = self
            .cached_stage(
                &mut state,
                &scope,
                "generate_react",
                json!({
                    "framework": request.framework.as_str(),
                    "mode": request.mode.as_str(),
                    "run_label": request.run_label.clone().unwrap_or_default(),
                    "asset_manifest_hash": stable_digest(&json!({"manifest": assets.manifest})),
                }),
                || async {
                    Ok(generate_react(
                        design_ir,
                        request.framework,
                        request.mode,
                        request.run_label.as_deref(),
                        self.deps.generator.as_ref(),
                    ))
                },
            )
            .await?;

        // -- Gates ------------------------------------------------------------

        let static_gate = state.metrics.timed_sync("static_gates", || {
            run_static_gates(
                &generation.code,
                &assets.manifest,
                cfg.pass_threshold,
                cfg.warn_threshold,
            )
        });
        self.gate_evaluated(&static_gate);

        let mut figma_screenshot: Option<PathBuf> = None;
        let mut implementation_screenshot: Option<PathBuf> =
            request.implementation_screenshot_path.as_deref().map(PathBuf::from);

        let visual_gate = if static_gate.status == GateStatus::Fail {
            GateResult::skipped(
                VISUAL_GATE,
                cfg.pass_threshold,
                "Static gates failed; visual gate was not executed.",
            )
        } else {
            if implementation_screenshot.is_none() && request.auto_render_implementation {
                let output_path = run_dir.join("implementation.png");
                match self
                    .render(&mut state, "render_implementation_screenshot", request, &generation, &assets, &generation.code, &output_path)
                    .await
                {
                    Some(outcome) => {
                        if let Some(error) = outcome.error {
                            state.errors.push(error);
                        }
                        implementation_screenshot = outcome.path;
                    }
                    None => state.errors.push(format!(
                        "Implementation screenshot render timed out after {} seconds.",
                        cfg.render_timeout.as_secs()
                    )),
                }
            }

            let started = Instant::now();
            let capture = state
                .metrics
                .timed(
                    "capture_figma_screenshot",
                    self.deps.source.get_screenshot(
                        &request.file_key,
                        &request.node_id,
                        request.figma_screenshot_scale,
                        &run_dir.join("figma.png"),
                    ),
                )
                .await;
            self.stage_completed("capture_figma_screenshot", false, started);
            figma_screenshot = match capture {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(error = %e, "Reference screenshot capture failed");
                    state.errors.push(format!("Figma screenshot capture failed: {e}"));
                    None
                }
            };

            state.metrics.timed_sync("visual_gates", || {
                run_visual_gates(
                    figma_screenshot.as_deref(),
                    implementation_screenshot.as_deref(),
                    cfg.pass_threshold,
                    cfg.warn_threshold,
                    visual_mode,
                )
            })
        };
        self.gate_evaluated(&visual_gate);

        let mut gates = vec![static_gate, visual_gate];
        let mut status = derive_pipeline_status(&gates);
        let mut fallback_count = 0u32;

        // -- Patch loop -------------------------------------------------------

        let visual_failed = gates
            .last()
            .is_some_and(|g| g.gate_name == VISUAL_GATE && g.status == GateStatus::Fail);
        if status == PipelineStatus::Fail && visual_failed && request.auto_render_implementation {
            let mut baseline = gates[1].score;
            let budget = request.max_visual_iterations.min(cfg.max_patch_iterations);

            for iteration in 1..=budget {
                let Some(strategy) = self.patches.for_iteration(iteration) else {
                    break;
                };
                let strategy_name = strategy.name().to_string();
                let candidate = strategy.apply(&generation.code);
                let attempted = |accepted: bool| PipelineEvent::PatchAttempted {
                    iteration,
                    strategy: strategy_name.clone(),
                    accepted,
                };

                if candidate == generation.code {
                    state.errors.push(format!(
                        "Exception patch iteration {iteration} produced no code change."
                    ));
                    self.events.emit(attempted(false));
                    continue;
                }

                let patched_static = run_static_gates(
                    &candidate,
                    &assets.manifest,
                    cfg.pass_threshold,
                    cfg.warn_threshold,
                );
                if patched_static.status == GateStatus::Fail {
                    state.errors.push(format!(
                        "Exception patch iteration {iteration} failed static gate; patch rejected."
                    ));
                    self.events.emit(attempted(false));
                    break;
                }

                let output_path = run_dir.join(format!("implementation.iter{iteration}.png"));
                let stage = format!("exception_render_{iteration}");
                let Some(outcome) = self
                    .render(&mut state, &stage, request, &generation, &assets, &candidate, &output_path)
                    .await
                else {
                    state
                        .errors
                        .push(format!("Exception patch iteration {iteration} timed out."));
                    self.events.emit(attempted(false));
                    break;
                };
                let Some(candidate_path) = outcome.path else {
                    state.errors.push(format!(
                        "Exception patch iteration {iteration} did not produce an implementation screenshot."
                    ));
                    self.events.emit(attempted(false));
                    break;
                };

                let patched_visual = run_visual_gates(
                    figma_screenshot.as_deref(),
                    Some(&candidate_path),
                    cfg.pass_threshold,
                    cfg.warn_threshold,
                    visual_mode,
                );
                if patched_visual.score <= baseline {
                    state.errors.push(format!(
                        "Exception patch iteration {iteration} did not improve visual score ({:.2} <= {:.2}).",
                        patched_visual.score, baseline
                    ));
                    self.events.emit(attempted(false));
                    continue;
                }

                tracing::info!(
                    iteration,
                    strategy = %strategy_name,
                    score = patched_visual.score,
                    previous = baseline,
                    "Patch accepted"
                );
                self.events.emit(attempted(true));
                baseline = patched_visual.score;
                generation.code = candidate;
                implementation_screenshot = Some(candidate_path);
                fallback_count += 1;
                gates = vec![patched_static, patched_visual];
                status = derive_pipeline_status(&gates);
                if status != PipelineStatus::Fail {
                    break;
                }
            }
        }

        if status == PipelineStatus::Fail {
            let lane = state.metrics.timed_sync("exception_lane", || {
                run_exception_lane(status, &gates, request.max_visual_iterations, fallback_count)
            });
            fallback_count = lane.fallback_count;
            status = lane.status;
            state.errors.extend(lane.errors);
        }

        // -- Packaging --------------------------------------------------------

        // Gate order is fixed: static first, visual second.
        let visual_score = gates[1].score;
        state.metrics.set_quality(generation.quality_metrics.clone());
        state
            .metrics
            .set_quality([("visual_score".to_string(), json!(visual_score))]);

        let metadata = RunMetadata {
            pipeline_version: cfg.pipeline_version.clone(),
            config_hash: config_hash.clone(),
            visual_mode,
        };

        let summary = json!({
            "run_id": run_id,
            "status": status,
            "request": serde_json::to_value(request)?,
            "stage_timings": state.metrics.stage_timings,
            "quality_metrics": state.metrics.quality_metrics,
            "gates": gates,
            "cache_hits": state.cache_hits,
            "cache_misses": state.cache_misses,
            "fallback_count": fallback_count,
            "errors": state.errors,
            "config": metadata,
        });

        let visual_artifact = VisualGateArtifact {
            gate: gates[1].clone(),
            figma_screenshot_path: figma_screenshot.as_deref().map(display),
            implementation_screenshot_path: implementation_screenshot.as_deref().map(display),
        };

        let bundle = ReportBundle {
            snapshot: &snapshot,
            design_ir,
            assets: &assets,
            component_graph: &component_graph,
            generation: &generation,
            static_gate: &gates[0],
            visual_gate: &visual_artifact,
            summary: &summary,
        };
        let artifacts = state
            .metrics
            .timed("package_report", package_report(&output_root, &run_id, &bundle))
            .await?;

        tracing::info!(
            run_id = %run_id,
            status = %status,
            hits = state.cache_hits.len(),
            misses = state.cache_misses.len(),
            fallback_count,
            "Pipeline run finished"
        );
        self.events.emit(PipelineEvent::RunCompleted {
            run_id: run_id.clone(),
            status,
        });

        Ok(PipelineRunResult {
            run_id,
            status,
            stage_timings: state.metrics.stage_timings,
            quality_metrics: state.metrics.quality_metrics,
            artifacts,
            fallback_count,
            errors: state.errors,
            gates,
            cache_hits: state.cache_hits,
            cache_misses: state.cache_misses,
            metadata,
        })
    }

    /// Look a stage up in the cache, or produce, time, and store it.
    ///
    /// A hit charges zero time. Producer errors are returned and never cached.
    async fn cached_stage<T, F, Fut>(
        &self,
        state: &mut RunState,
        scope: &CacheScope,
        stage: &str,
        payload: Value,
        producer: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.events.emit(PipelineEvent::StageStarted {
            stage: stage.to_string(),
        });
        let started = Instant::now();

        let key = scope
            .enabled
            .then(|| self.cache.build_stage_key(&scope.base_key, stage, &payload));

        if let Some(key) = &key {
            tracing::debug!(stage, key = %key, "Cache lookup");
            if let Some(hit) = self.cache.load::<T>(key) {
                state.cache_hits.push(stage.to_string());
                state.metrics.record_zero_if_absent(stage);
                self.events.emit(PipelineEvent::StageCompleted {
                    stage: stage.to_string(),
                    cached: true,
                    duration_ms: 0,
                });
                return Ok(hit);
            }
        }

        state.cache_misses.push(stage.to_string());
        let value = state.metrics.timed(stage, producer()).await?;

        if let Some(key) = &key {
            if let Err(e) = self.cache.save(key, &value) {
                tracing::warn!(stage, error = %e, "Failed to persist cache entry");
            }
        }
        self.stage_completed(stage, false, started);
        Ok(value)
    }

    /// Render `code` with the configured timeout. `None` means the render timed out.
    #[allow(clippy::too_many_arguments)]
    async fn render(
        &self,
        state: &mut RunState,
        stage: &str,
        request: &PipelineRunRequest,
        generation: &GenerationOutput,
        assets: &AssetMaterialization,
        code: &str,
        output_path: &Path,
    ) -> Option<RenderOutcome> {
        let (width, height) = assets.design_ir.viewport();
        let render_request = RenderRequest {
            code: code.to_string(),
            component_name: generation.component_name.clone(),
            manifest: assets.manifest.clone(),
            width,
            height,
            output_path: output_path.to_path_buf(),
            use_tailwind: request.framework.uses_tailwind(),
        };

        self.events.emit(PipelineEvent::StageStarted {
            stage: stage.to_string(),
        });
        let started = Instant::now();
        let timeout = self.config.render_timeout;
        let outcome = state
            .metrics
            .timed(
                stage,
                tokio::time::timeout(timeout, self.deps.renderer.render(&render_request)),
            )
            .await;
        self.stage_completed(stage, false, started);

        match outcome {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                tracing::warn!(stage, timeout_ms = timeout.as_millis() as u64, "Render timed out");
                None
            }
        }
    }

    fn stage_completed(&self, stage: &str, cached: bool, started: Instant) {
        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(stage, cached, duration_ms, "Stage completed");
        self.events.emit(PipelineEvent::StageCompleted {
            stage: stage.to_string(),
            cached,
            duration_ms,
        });
    }

    fn gate_evaluated(&self, gate: &GateResult) {
        tracing::info!(gate = %gate.gate_name, status = %gate.status, score = gate.score, "Gate evaluated");
        self.events.emit(PipelineEvent::GateEvaluated {
            gate: gate.gate_name.clone(),
            status: gate.status,
            score: gate.score,
        });
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
