//! Design-token extraction from a Figma node subtree.
//!
//! Tokens are collected locally from the node JSON already fetched for the
//! run, so no extra API calls are made.

use serde_json::{json, Value};

use figpipe_types::DesignTokens;

/// Collect distinct colours, text styles, spacing values and effects under `root`.
///
/// Entries keep first-seen order except spacing, which is sorted ascending.
pub fn extract_design_tokens(root: &Value) -> DesignTokens {
    let mut collector = Collector::default();
    collector.visit(root);
    collector.finish()
}

#[derive(Default)]
struct Collector {
    colors: Vec<Value>,
    typography: Vec<Value>,
    spacing: Vec<f64>,
    shadows: Vec<Value>,
    blurs: Vec<Value>,
}

impl Collector {
    fn visit(&mut self, node: &Value) {
        if node.get("visible").and_then(Value::as_bool) == Some(false) {
            return;
        }

        for key in ["fills", "strokes"] {
            for paint in visible(node, key) {
                if paint["type"] == "SOLID" {
                    let opacity = paint.get("opacity").and_then(Value::as_f64).unwrap_or(1.0);
                    push_unique(
                        &mut self.colors,
                        json!({"hex": hex(&paint["color"]), "opacity": round2(opacity)}),
                    );
                }
            }
        }

        if node["type"] == "TEXT" {
            if let Some(style) = node.get("style").filter(|s| s.is_object()) {
                push_unique(
                    &mut self.typography,
                    json!({
                        "font_family": style.get("fontFamily").cloned().unwrap_or(Value::Null),
                        "font_size": style.get("fontSize").cloned().unwrap_or(Value::Null),
                        "font_weight": style.get("fontWeight").cloned().unwrap_or(Value::Null),
                        "line_height_px": style.get("lineHeightPx").cloned().unwrap_or(Value::Null),
                        "letter_spacing": style.get("letterSpacing").cloned().unwrap_or(Value::Null),
                    }),
                );
            }
        }

        for key in [
            "itemSpacing",
            "paddingTop",
            "paddingRight",
            "paddingBottom",
            "paddingLeft",
        ] {
            if let Some(v) = node.get(key).and_then(Value::as_f64).filter(|v| *v > 0.0) {
                if !self.spacing.iter().any(|s| (s - v).abs() < f64::EPSILON) {
                    self.spacing.push(v);
                }
            }
        }

        for effect in visible(node, "effects") {
            let radius = effect.get("radius").cloned().unwrap_or(json!(0));
            match effect["type"].as_str() {
                Some(kind @ ("DROP_SHADOW" | "INNER_SHADOW")) => push_unique(
                    &mut self.shadows,
                    json!({
                        "type": kind,
                        "color": hex(&effect["color"]),
                        "offset": effect.get("offset").cloned().unwrap_or(json!({"x": 0, "y": 0})),
                        "radius": radius,
                        "spread": effect.get("spread").cloned().unwrap_or(json!(0)),
                    }),
                ),
                Some(kind @ ("LAYER_BLUR" | "BACKGROUND_BLUR")) => push_unique(
                    &mut self.blurs,
                    json!({"type": kind, "radius": radius}),
                ),
                _ => {}
            }
        }

        if let Some(children) = node.get("children").and_then(Value::as_array) {
            for child in children {
                self.visit(child);
            }
        }
    }

    fn finish(mut self) -> DesignTokens {
        self.spacing.sort_by(|a, b| a.total_cmp(b));
        DesignTokens {
            colors: self.colors,
            typography: self.typography,
            spacing: self.spacing.into_iter().map(|v| json!(v)).collect(),
            shadows: self.shadows,
            blurs: self.blurs,
        }
    }
}

fn visible<'a>(node: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    node.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|p| p.get("visible").and_then(Value::as_bool) != Some(false))
}

fn push_unique(list: &mut Vec<Value>, value: Value) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `#rrggbb`, or `#rrggbbaa` when the colour's own alpha is below 1.
fn hex(color: &Value) -> String {
    let channel = |key: &str| {
        (color.get(key).and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 1.0) * 255.0).round()
            as u8
    };
    let alpha = color.get("a").and_then(Value::as_f64).unwrap_or(1.0);
    let rgb = format!("#{:02x}{:02x}{:02x}", channel("r"), channel("g"), channel("b"));
    if alpha < 1.0 {
        format!("{rgb}{:02x}", channel("a"))
    } else {
        rgb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Value {
        json!({
            "id": "1:1",
            "type": "FRAME",
            "fills": [{"type": "SOLID", "color": {"r": 1, "g": 1, "b": 1, "a": 1}}],
            "itemSpacing": 16,
            "paddingTop": 24,
            "paddingLeft": 8,
            "effects": [
                {"type": "DROP_SHADOW", "color": {"r": 0, "g": 0, "b": 0, "a": 0.25},
                 "offset": {"x": 0, "y": 4}, "radius": 8},
                {"type": "LAYER_BLUR", "radius": 4, "visible": false}
            ],
            "children": [
                {
                    "id": "1:2",
                    "type": "TEXT",
                    "fills": [{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 0, "a": 1}}],
                    "style": {"fontFamily": "Inter", "fontSize": 14, "fontWeight": 500,
                              "lineHeightPx": 20, "letterSpacing": 0}
                },
                {
                    "id": "1:3",
                    "type": "TEXT",
                    "fills": [{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 0, "a": 1}}],
                    "style": {"fontFamily": "Inter", "fontSize": 14, "fontWeight": 500,
                              "lineHeightPx": 20, "letterSpacing": 0},
                    "paddingTop": 8
                },
                {
                    "id": "1:4",
                    "type": "RECTANGLE",
                    "visible": false,
                    "fills": [{"type": "SOLID", "color": {"r": 1, "g": 0, "b": 0, "a": 1}}]
                }
            ]
        })
    }

    #[test]
    fn colours_are_distinct_and_skip_hidden_nodes() {
        let tokens = extract_design_tokens(&tree());
        assert_eq!(
            tokens.colors,
            vec![
                json!({"hex": "#ffffff", "opacity": 1.0}),
                json!({"hex": "#000000", "opacity": 1.0}),
            ]
        );
    }

    #[test]
    fn typography_is_deduplicated() {
        let tokens = extract_design_tokens(&tree());
        assert_eq!(tokens.typography.len(), 1);
        assert_eq!(tokens.typography[0]["font_family"], "Inter");
        assert_eq!(tokens.typography[0]["font_weight"], 500);
    }

    #[test]
    fn spacing_sorted_and_distinct() {
        let tokens = extract_design_tokens(&tree());
        assert_eq!(tokens.spacing, vec![json!(8.0), json!(16.0), json!(24.0)]);
    }

    #[test]
    fn effects_split_into_shadows_and_blurs() {
        let tokens = extract_design_tokens(&tree());
        assert_eq!(tokens.shadows.len(), 1);
        assert_eq!(tokens.shadows[0]["color"], "#00000040");
        assert_eq!(tokens.shadows[0]["spread"], 0);
        assert!(tokens.blurs.is_empty());
    }

    #[test]
    fn empty_node_yields_empty_tokens() {
        assert_eq!(extract_design_tokens(&json!({})), DesignTokens::default());
    }
}
