use std::sync::OnceLock;

use regex::Regex;

use figpipe_types::{AssetManifestItem, GateResult, GateStatus};

pub const STATIC_GATE: &str = "static";

struct Check {
    name: &'static str,
    passed: bool,
    critical: bool,
    message: &'static str,
}

fn empty_class_name_default_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"className\s*=\s*''").expect("static pattern"))
}

/// Deterministic checks over generated code and the asset manifest.
///
/// Any failing critical check fails the gate outright; a failing non-critical
/// check caps it at WARN. Issues are listed in check order.
pub fn run_static_gates(
    code: &str,
    manifest: &[AssetManifestItem],
    pass_threshold: f64,
    warn_threshold: f64,
) -> GateResult {
    let missing_paths = manifest
        .iter()
        .filter(|item| !item.logical_path.is_empty())
        .filter(|item| !code.contains(&item.logical_path))
        .count();
    let class_name_declared = empty_class_name_default_re().is_match(code);

    let checks = [
        Check {
            name: "no_image_ref_placeholders",
            passed: !code.contains("imageRef:"),
            critical: true,
            message: "Generated code still contains imageRef placeholders.",
        },
        Check {
            name: "no_figma_signed_urls",
            passed: !code.contains("s3-alpha-sig.figma.com"),
            critical: true,
            message: "Generated code leaks temporary signed Figma URLs.",
        },
        Check {
            name: "materialized_asset_paths_used",
            passed: missing_paths == 0,
            critical: true,
            message: "Not all materialized asset paths are referenced in generated code.",
        },
        Check {
            name: "class_name_prop_used",
            passed: !class_name_declared || code.contains("{className}"),
            critical: false,
            message: "Component className prop is declared but not used.",
        },
    ];

    for check in checks.iter().filter(|c| !c.passed) {
        tracing::debug!(check = check.name, critical = check.critical, "Static check failed");
    }

    let passed = checks.iter().filter(|c| c.passed).count();
    let score = passed as f64 / checks.len() as f64 * 100.0;

    let status = if checks.iter().any(|c| c.critical && !c.passed) {
        GateStatus::Fail
    } else if checks.iter().any(|c| !c.critical && !c.passed) {
        GateStatus::Warn
    } else {
        GateStatus::from_score(score, pass_threshold, warn_threshold)
    };

    let issues = checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| c.message.to_string())
        .collect();

    GateResult {
        gate_name: STATIC_GATE.to_string(),
        status,
        score: (score * 100.0).round() / 100.0,
        threshold: pass_threshold,
        evidence_paths: Vec::new(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str) -> AssetManifestItem {
        AssetManifestItem {
            asset_id: "0123456789abcdef".into(),
            source_node_id: "1:2".into(),
            image_ref: "ref".into(),
            local_path: "/tmp/x.png".into(),
            logical_path: path.into(),
            hash: "h".into(),
            mime: "image/png".into(),
        }
    }

    #[test]
    fn clean_code_passes() {
        let gate = run_static_gates(
            "<img src=\"/assets/figma/a.png\" className={className} />",
            &[item("/assets/figma/a.png")],
            95.0,
            85.0,
        );
        assert_eq!(gate.status, GateStatus::Pass);
        assert_eq!(gate.score, 100.0);
        assert!(gate.issues.is_empty());
    }

    #[test]
    fn placeholders_and_signed_urls_always_fail() {
        let gate = run_static_gates("/* imageRef: abc */", &[], 0.0, 0.0);
        assert_eq!(gate.status, GateStatus::Fail);
        assert_eq!(gate.score, 75.0);

        let gate = run_static_gates("https://s3-alpha-sig.figma.com/img", &[], 0.0, 0.0);
        assert_eq!(gate.status, GateStatus::Fail);
    }

    #[test]
    fn unreferenced_asset_fails() {
        let gate = run_static_gates("<div/>", &[item("/assets/figma/a.png")], 95.0, 85.0);
        assert_eq!(gate.status, GateStatus::Fail);
        assert_eq!(
            gate.issues,
            vec!["Not all materialized asset paths are referenced in generated code."]
        );
    }

    #[test]
    fn unused_class_name_warns() {
        let gate = run_static_gates("function A({ className = '' }) { return <div/>; }", &[], 95.0, 85.0);
        assert_eq!(gate.status, GateStatus::Warn);
        assert_eq!(gate.score, 75.0);
    }

    #[test]
    fn issues_follow_check_order() {
        let gate = run_static_gates(
            "imageRef: s3-alpha-sig.figma.com className=''",
            &[],
            95.0,
            85.0,
        );
        assert_eq!(gate.issues.len(), 3);
        assert!(gate.issues[0].contains("imageRef"));
        assert!(gate.issues[1].contains("signed"));
        assert!(gate.issues[2].contains("className"));
    }
}
