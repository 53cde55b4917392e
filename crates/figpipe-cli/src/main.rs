//! CLI binary for running figpipe against Figma or a recorded snapshot.

mod adapters;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use figpipe_figma::FigmaClient;
use figpipe_pipeline::{
    run_static_gates, run_visual_gates, ChromeRenderer, DesignSource, ImplementationRenderer,
    NoopRenderer, PipelineConfig, PipelineDependencies, PipelineEvent, PipelineRunner,
};
use figpipe_types::{
    AssetManifestItem, Framework, GateResult, GateStatus, PipelineMode, PipelineRunRequest,
    PipelineStatus, VisualMode,
};

use adapters::{FigmaDesignSource, FileDesignSource, HttpAssetDownloader, ReactCodeGenerator};

#[derive(Parser)]
#[command(name = "figpipe", version, about = "Figma node to gated React code")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one node
    Run(RunArgs),

    /// Run the static gate over a generated component
    Gate {
        /// Path to the generated component source
        code: PathBuf,

        /// Asset manifest JSON (a list of items, or an object with a `manifest` list)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        #[arg(long, default_value_t = 95.0)]
        pass_threshold: f64,

        #[arg(long, default_value_t = 85.0)]
        warn_threshold: f64,
    },

    /// Compare a reference screenshot with an implementation screenshot
    Compare {
        figma: PathBuf,
        implementation: PathBuf,

        #[arg(long, default_value = "hybrid")]
        visual_mode: VisualMode,

        #[arg(long, default_value_t = 95.0)]
        pass_threshold: f64,

        #[arg(long, default_value_t = 85.0)]
        warn_threshold: f64,
    },

    /// Print the summary of a finished run
    Summary {
        /// Run directory (contains summary.json)
        run_dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Figma file key
    file_key: String,

    /// Node id inside the file, e.g. 12:345
    node_id: String,

    #[arg(long, default_value = "react_tailwind")]
    framework: Framework,

    #[arg(long, default_value = "strict_pixel")]
    mode: PipelineMode,

    /// Target visual match ratio in [0, 1]
    #[arg(long, default_value_t = 0.95)]
    target_match: f64,

    /// Bypass the stage cache for this run
    #[arg(long)]
    no_cache: bool,

    #[arg(long, default_value_t = 3)]
    max_visual_iterations: u32,

    /// Output root for this run (default: .qa/runs)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Component name override
    #[arg(long)]
    run_label: Option<String>,

    /// Visual gate mode (default: the runner's configured mode)
    #[arg(long)]
    visual_mode: Option<VisualMode>,

    #[arg(long, default_value_t = 2.0)]
    screenshot_scale: f64,

    /// Use an existing implementation screenshot instead of rendering
    #[arg(long)]
    implementation_screenshot: Option<String>,

    /// Skip rendering the generated component
    #[arg(long)]
    no_render: bool,

    /// Read the design from a saved file-nodes response instead of the Figma API
    #[arg(long)]
    snapshot_file: Option<PathBuf>,

    /// Chrome/Chromium binary (default: $CHROME_BIN or chromium)
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Figma API base URL
    #[arg(long)]
    figma_base_url: Option<String>,

    #[arg(long, default_value = ".qa/cache")]
    cache_root: PathBuf,

    /// Disable the stage cache for every request
    #[arg(long)]
    disable_cache: bool,

    #[arg(long, default_value_t = 95.0)]
    pass_threshold: f64,

    #[arg(long, default_value_t = 85.0)]
    warn_threshold: f64,

    /// Seconds before an implementation render is abandoned
    #[arg(long, default_value_t = 90)]
    render_timeout_secs: u64,

    /// Upper bound on patch iterations
    #[arg(long, default_value_t = 2)]
    max_patch_iterations: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run(args) => cmd_run(args).await?,
        Commands::Gate {
            code,
            manifest,
            pass_threshold,
            warn_threshold,
        } => cmd_gate(&code, manifest.as_deref(), pass_threshold, warn_threshold)?,
        Commands::Compare {
            figma,
            implementation,
            visual_mode,
            pass_threshold,
            warn_threshold,
        } => cmd_compare(&figma, &implementation, visual_mode, pass_threshold, warn_threshold)?,
        Commands::Summary { run_dir } => cmd_summary(&run_dir)?,
    }

    Ok(())
}

fn build_request(args: &RunArgs) -> PipelineRunRequest {
    let mut request = PipelineRunRequest::new(args.file_key.clone(), args.node_id.clone());
    request.framework = args.framework;
    request.mode = args.mode;
    request.target_match = args.target_match;
    request.use_cache = !args.no_cache;
    request.max_visual_iterations = args.max_visual_iterations;
    request.output_dir = args.output_dir.clone();
    request.run_label = args.run_label.clone();
    request.visual_mode = args.visual_mode;
    request.figma_screenshot_scale = args.screenshot_scale;
    request.implementation_screenshot_path = args.implementation_screenshot.clone();
    request.auto_render_implementation = !args.no_render;
    request
}

fn build_config(args: &RunArgs) -> PipelineConfig {
    PipelineConfig {
        cache_root: args.cache_root.clone(),
        cache_enabled: !args.disable_cache,
        pass_threshold: args.pass_threshold,
        warn_threshold: args.warn_threshold,
        render_timeout: Duration::from_secs(args.render_timeout_secs),
        max_patch_iterations: args.max_patch_iterations,
        ..PipelineConfig::default()
    }
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let request = build_request(&args);
    let config = build_config(&args);

    // Downloads go to pre-signed CDN URLs, so the downloader needs no token.
    let download_client = FigmaClient::new(String::new());
    let source: Arc<dyn DesignSource> = match &args.snapshot_file {
        Some(path) => {
            println!("Snapshot: {}", path.display());
            Arc::new(FileDesignSource::load(path)?)
        }
        None => {
            let mut client = FigmaClient::from_env()?;
            if let Some(url) = &args.figma_base_url {
                client = client.with_base_url(url.clone());
            }
            Arc::new(FigmaDesignSource::new(client))
        }
    };

    let renderer: Arc<dyn ImplementationRenderer> = if args.no_render {
        Arc::new(NoopRenderer)
    } else {
        let chrome = match &args.chrome {
            Some(bin) => ChromeRenderer::new(bin.clone()),
            None => ChromeRenderer::from_env(),
        };
        Arc::new(chrome.with_timeout(config.render_timeout))
    };

    let deps = PipelineDependencies {
        source,
        downloader: Arc::new(HttpAssetDownloader::new(download_client)),
        generator: Arc::new(ReactCodeGenerator::default()),
        renderer,
    };
    let runner = PipelineRunner::new(deps, config)?;

    println!(
        "Running figpipe: file={} node={} framework={} mode={}",
        request.file_key,
        request.node_id,
        request.framework.as_str(),
        request.mode.as_str()
    );

    let mut events = runner.events().subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let done = matches!(event, PipelineEvent::RunCompleted { .. });
            print_event(&event);
            if done {
                break;
            }
        }
    });

    let result = runner.run(&request).await;
    // Failed runs never emit RunCompleted; give the printer a moment to drain.
    let _ = tokio::time::timeout(Duration::from_millis(200), progress).await;
    let result = result?;

    println!("\nRun {}: {}", result.run_id, result.status);
    for gate in &result.gates {
        println!("  gate {}: {} ({:.2})", gate.gate_name, gate.status, gate.score);
        for issue in &gate.issues {
            println!("    - {issue}");
        }
    }
    println!(
        "  cache: {} hit(s), {} miss(es); fallbacks: {}",
        result.cache_hits.len(),
        result.cache_misses.len(),
        result.fallback_count
    );
    for err in &result.errors {
        println!("  error: {err}");
    }
    if let Some(summary) = result.artifacts.get("summary") {
        println!("Summary: {summary}");
    }

    if result.status == PipelineStatus::Fail {
        std::process::exit(1);
    }
    Ok(())
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::RunStarted { run_id, .. } => println!("[run] {run_id}"),
        PipelineEvent::StageStarted { .. } => {}
        PipelineEvent::StageCompleted {
            stage,
            cached,
            duration_ms,
        } => {
            let tag = if *cached { " (cached)" } else { "" };
            println!("[stage] {stage}{tag} {duration_ms}ms");
        }
        PipelineEvent::GateEvaluated {
            gate,
            status,
            score,
        } => println!("[gate] {gate}: {status} ({score:.2})"),
        PipelineEvent::PatchAttempted {
            iteration,
            strategy,
            accepted,
        } => {
            let verdict = if *accepted { "accepted" } else { "rejected" };
            println!("[patch] #{iteration} {strategy}: {verdict}");
        }
        PipelineEvent::RunCompleted { status, .. } => println!("[done] {status}"),
    }
}

/// Manifest items from either a bare list or a materialization record.
fn load_manifest(path: &Path) -> anyhow::Result<Vec<AssetManifestItem>> {
    let raw: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let list = match raw {
        Value::Array(_) => raw,
        Value::Object(mut map) => map.remove("manifest").unwrap_or(Value::Array(Vec::new())),
        _ => anyhow::bail!("{} is not an asset manifest", path.display()),
    };
    Ok(serde_json::from_value(list)?)
}

fn print_gate(gate: &GateResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(gate)?);
    if gate.status == GateStatus::Fail {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_gate(
    code_path: &Path,
    manifest: Option<&Path>,
    pass_threshold: f64,
    warn_threshold: f64,
) -> anyhow::Result<()> {
    let code = std::fs::read_to_string(code_path)?;
    let manifest = match manifest {
        Some(path) => load_manifest(path)?,
        None => Vec::new(),
    };
    let gate = run_static_gates(&code, &manifest, pass_threshold, warn_threshold);
    print_gate(&gate)
}

fn cmd_compare(
    figma: &Path,
    implementation: &Path,
    visual_mode: VisualMode,
    pass_threshold: f64,
    warn_threshold: f64,
) -> anyhow::Result<()> {
    for path in [figma, implementation] {
        if !path.is_file() {
            anyhow::bail!("Screenshot not found: {}", path.display());
        }
    }
    let gate = run_visual_gates(
        Some(figma),
        Some(implementation),
        pass_threshold,
        warn_threshold,
        visual_mode,
    );
    print_gate(&gate)
}

fn cmd_summary(run_dir: &Path) -> anyhow::Result<()> {
    let path = run_dir.join("summary.json");
    let summary: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;

    let text = |key: &str| summary[key].as_str().unwrap_or("-").to_string();
    println!("Run: {}", text("run_id"));
    println!("Status: {}", text("status"));
    println!("Fallbacks: {}", summary["fallback_count"].as_u64().unwrap_or(0));

    if let Some(gates) = summary["gates"].as_array() {
        println!("\nGates:");
        for gate in gates {
            println!(
                "  {} {} score={:.2}",
                gate["gate_name"].as_str().unwrap_or("?"),
                gate["status"].as_str().unwrap_or("?"),
                gate["score"].as_f64().unwrap_or(0.0)
            );
        }
    }

    if let Some(timings) = summary["stage_timings"].as_object() {
        println!("\nStage timings:");
        for (stage, secs) in timings {
            println!("  {stage}: {:.3}s", secs.as_f64().unwrap_or(0.0));
        }
    }

    let hits = summary["cache_hits"].as_array().map_or(0, Vec::len);
    let misses = summary["cache_misses"].as_array().map_or(0, Vec::len);
    println!("\nCache: {hits} hit(s), {misses} miss(es)");

    if let Some(errors) = summary["errors"].as_array().filter(|e| !e.is_empty()) {
        println!("\nErrors:");
        for err in errors {
            println!("  {}", err.as_str().unwrap_or_default());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_run(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["figpipe", "run", "abcdefghijkl", "1:2"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_defaults_match_request_defaults() {
        let request = build_request(&parse_run(&[]));
        let defaults = PipelineRunRequest::new("abcdefghijkl", "1:2");
        assert_eq!(request, defaults);
    }

    #[test]
    fn run_flags_override_request_and_config() {
        let args = parse_run(&[
            "--framework",
            "react",
            "--mode",
            "strict_pixel_plus_responsive",
            "--visual-mode",
            "pixel",
            "--no-cache",
            "--no-render",
            "--render-timeout-secs",
            "5",
        ]);
        let request = build_request(&args);
        assert_eq!(request.framework, Framework::React);
        assert_eq!(request.mode, PipelineMode::StrictPixelPlusResponsive);
        assert_eq!(request.visual_mode, Some(VisualMode::Pixel));
        assert!(!request.use_cache);
        assert!(!request.auto_render_implementation);

        let config = build_config(&args);
        assert_eq!(config.render_timeout, Duration::from_secs(5));
        assert_eq!(config.pipeline_version, "2.0.0");
    }

    #[test]
    fn unsupported_framework_is_rejected() {
        let argv = ["figpipe", "run", "abcdefghijkl", "1:2", "--framework", "swiftui"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn manifest_accepts_list_or_record() {
        let dir = tempfile::tempdir().unwrap();
        let item = r#"{"asset_id":"a","source_node_id":"1:2","image_ref":"r","local_path":"/tmp/a.png",
                       "logical_path":"/assets/figma/a.png","hash":"h","mime":"image/png"}"#;

        let list = dir.path().join("list.json");
        std::fs::write(&list, format!("[{item}]")).unwrap();
        assert_eq!(load_manifest(&list).unwrap().len(), 1);

        let record = dir.path().join("record.json");
        std::fs::write(&record, format!(r#"{{"manifest": [{item}], "download_errors": []}}"#)).unwrap();
        assert_eq!(load_manifest(&record).unwrap()[0].logical_path, "/assets/figma/a.png");

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "42").unwrap();
        assert!(load_manifest(&bad).is_err());
    }
}
