use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use figpipe_types::{DesignIr, Framework, GenerationOptions, PipelineMode};

use crate::deps::CodeGenerator;

/// Generated component source plus the metrics computed over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub component_name: String,
    pub framework: Framework,
    pub code: String,
    pub quality_metrics: BTreeMap<String, Value>,
}

fn class_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"className="([^"]+)""#).expect("static pattern"))
}

fn fixed_width_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^w-\[(\d+(?:\.\d+)?)px\]$").expect("static pattern"))
}

/// Run the generator over a private copy of the IR root.
pub fn generate_react(
    design_ir: &DesignIr,
    framework: Framework,
    mode: PipelineMode,
    run_label: Option<&str>,
    generator: &dyn CodeGenerator,
) -> GenerationOutput {
    let root_node = design_ir.root_node.clone();
    let source_name = run_label
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .or_else(|| root_node.get("name").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "Component".to_string());
    let component_name = generator.sanitize_component_name(&source_name);

    let options = GenerationOptions::for_request(framework, mode);
    let mut code = generator.generate(&root_node, &component_name, &options);

    if mode == PipelineMode::StrictPixelPlusResponsive {
        code = apply_responsive_pass(&code);
    }

    tracing::info!(
        component = %component_name,
        framework = framework.as_str(),
        chars = code.len(),
        "Component generated"
    );

    GenerationOutput {
        component_name,
        framework,
        quality_metrics: quality_metrics(&code),
        code,
    }
}

/// Make the first class attribute fluid.
///
/// The first fixed `w-[Npx]` class becomes `w-full` plus `max-w-[Npx]`, and
/// `overflow-x-auto` is added when missing. Only the first `className="..."`
/// is touched.
pub fn apply_responsive_pass(code: &str) -> String {
    let Some(caps) = class_attr_re().captures(code) else {
        return code.to_string();
    };
    let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
        return code.to_string();
    };

    let original: Vec<&str> = value.as_str().split_whitespace().collect();
    let mut classes: Vec<String> = original.iter().map(|c| c.to_string()).collect();

    for (idx, class) in original.iter().enumerate() {
        if let Some(width) = fixed_width_re().captures(class).and_then(|c| c.get(1)) {
            let max_width = format!("max-w-[{}px]", width.as_str());
            classes[idx] = "w-full".to_string();
            if !classes.contains(&max_width) {
                classes.push(max_width);
            }
            break;
        }
    }

    if !classes.iter().any(|c| c == "overflow-x-auto") {
        classes.push("overflow-x-auto".to_string());
    }

    format!(
        "{}className=\"{}\"{}",
        &code[..whole.start()],
        classes.join(" "),
        &code[whole.end()..]
    )
}

/// Size and shape metrics of a generated component.
pub fn quality_metrics(code: &str) -> BTreeMap<String, Value> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            ("div_count", r"<div\b"),
            ("span_count", r"<span\b"),
            (
                "semantic_count",
                r"<(?:section|article|header|main|footer|nav|button|ul|li|p|h[1-6])\b",
            ),
            ("svg_count", r"<svg\b"),
            ("https_url_count", r"https://"),
            (
                "fixed_px_utility_count",
                r"\b(?:w|h|pt|pr|pb|pl|gap|text|leading|tracking)-\[[0-9]+(?:\.[0-9]+)?px\]",
            ),
        ]
        .into_iter()
        .map(|(name, pattern)| (name, Regex::new(pattern).expect("static pattern")))
        .collect()
    });

    let mut metrics = BTreeMap::new();
    metrics.insert("chars".to_string(), Value::from(code.chars().count()));
    metrics.insert("lines".to_string(), Value::from(code.lines().count()));
    for (name, re) in patterns {
        metrics.insert(name.to_string(), Value::from(re.find_iter(code).count()));
    }
    metrics.insert(
        "icon_comment_count".to_string(),
        Value::from(code.matches("/* Icon:").count()),
    );
    metrics.insert(
        "image_ref_comment_count".to_string(),
        Value::from(code.matches("imageRef:").count()),
    );
    metrics
}
