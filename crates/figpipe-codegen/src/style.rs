//! CSS value extraction from Figma node properties.
//!
//! Every helper reads raw node JSON and returns plain CSS strings; the JSX
//! emitter decides whether they become Tailwind arbitrary values or inline
//! style entries.

use serde_json::Value;

// ---------------------------------------------------------------------------
// Numbers and colours
// ---------------------------------------------------------------------------

/// `12` for integral values (within 0.01), otherwise up to two trimmed decimals.
pub fn format_number(value: f64) -> String {
    if (value - value.round()).abs() < 0.01 {
        format!("{}", value.round() as i64)
    } else {
        let s = format!("{value:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn format_px(value: f64) -> String {
    format!("{}px", format_number(value))
}

pub(crate) fn num(node: &Value, key: &str) -> f64 {
    node.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn channel(color: &Value, key: &str) -> u8 {
    (num(color, key).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// `#rrggbb`, or `#rrggbbaa` when the effective alpha is below 1.
pub fn color_hex(color: &Value, opacity: f64) -> String {
    let alpha = color.get("a").and_then(Value::as_f64).unwrap_or(1.0) * opacity;
    let (r, g, b) = (channel(color, "r"), channel(color, "g"), channel(color, "b"));
    if alpha < 1.0 {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
    } else {
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

pub fn is_visible(paint: &Value) -> bool {
    paint.get("visible").and_then(Value::as_bool).unwrap_or(true)
}

fn paint_opacity(paint: &Value) -> f64 {
    paint.get("opacity").and_then(Value::as_f64).unwrap_or(1.0)
}

fn visible_paints<'a>(node: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    node.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|p| is_visible(p))
}

// ---------------------------------------------------------------------------
// Backgrounds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundKind {
    Color,
    Gradient,
    Image,
    Layered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    pub value: String,
    pub kind: BackgroundKind,
}

fn gradient_stops(paint: &Value) -> String {
    let opacity = paint_opacity(paint);
    paint
        .get("gradientStops")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|stop| {
            let color = color_hex(&stop["color"], opacity);
            format!("{color} {}%", format_number(num(stop, "position") * 100.0))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn linear_angle(paint: &Value) -> f64 {
    let handles = paint.get("gradientHandlePositions").and_then(Value::as_array);
    match handles.map(|h| h.as_slice()) {
        Some([start, end, ..]) => {
            let dx = num(end, "x") - num(start, "x");
            let dy = num(end, "y") - num(start, "y");
            (dy.atan2(dx).to_degrees() + 90.0).rem_euclid(360.0)
        }
        _ => 180.0,
    }
}

/// CSS for one fill. Image fills without a materialized `imageUrl` produce nothing.
pub fn fill_css(paint: &Value) -> Option<Background> {
    if !is_visible(paint) {
        return None;
    }
    let kind = paint.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "SOLID" => Some(Background {
            value: color_hex(&paint["color"], paint_opacity(paint)),
            kind: BackgroundKind::Color,
        }),
        "GRADIENT_LINEAR" => Some(Background {
            value: format!(
                "linear-gradient({}deg, {})",
                format_number(linear_angle(paint)),
                gradient_stops(paint)
            ),
            kind: BackgroundKind::Gradient,
        }),
        "GRADIENT_RADIAL" | "GRADIENT_DIAMOND" => Some(Background {
            value: format!("radial-gradient(circle, {})", gradient_stops(paint)),
            kind: BackgroundKind::Gradient,
        }),
        "GRADIENT_ANGULAR" => Some(Background {
            value: format!("conic-gradient({})", gradient_stops(paint)),
            kind: BackgroundKind::Gradient,
        }),
        "IMAGE" => {
            let url = paint.get("imageUrl").and_then(Value::as_str)?;
            let sizing = match paint.get("scaleMode").and_then(Value::as_str) {
                Some("FIT") => "center/contain no-repeat",
                Some("STRETCH") => "center/100% 100% no-repeat",
                Some("TILE") => "repeat",
                _ => "center/cover no-repeat",
            };
            Some(Background {
                value: format!("url(\"{url}\") {sizing}"),
                kind: BackgroundKind::Image,
            })
        }
        _ => None,
    }
}

/// Combined background for a node's visible fills.
///
/// Figma paints fills bottom-up in array order while CSS lists layers top
/// first, so multiple fills are reversed. Solid colours in a layer stack are
/// wrapped as flat gradients because only the last CSS layer may be a colour.
pub fn background(node: &Value) -> Option<Background> {
    let layers: Vec<Background> = visible_paints(node, "fills").filter_map(fill_css).collect();
    match layers.len() {
        0 => None,
        1 => layers.into_iter().next(),
        _ => {
            let value = layers
                .iter()
                .rev()
                .map(|layer| match layer.kind {
                    BackgroundKind::Color => {
                        format!("linear-gradient({0}, {0})", layer.value)
                    }
                    _ => layer.value.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            Some(Background {
                value,
                kind: BackgroundKind::Layered,
            })
        }
    }
}

/// Image references of visible image fills that have no materialized URL.
pub fn unresolved_image_refs(node: &Value) -> Vec<String> {
    visible_paints(node, "fills")
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("IMAGE"))
        .filter(|p| p.get("imageUrl").and_then(Value::as_str).is_none())
        .filter_map(|p| p.get("imageRef").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// First visible solid fill colour.
pub fn solid_color(node: &Value, key: &str) -> Option<String> {
    visible_paints(node, key)
        .find(|p| p.get("type").and_then(Value::as_str) == Some("SOLID"))
        .map(|p| color_hex(&p["color"], paint_opacity(p)))
}

// ---------------------------------------------------------------------------
// Strokes, radii, effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub weight: f64,
    pub outside: bool,
    pub dashed: bool,
    /// Per-side widths as `(top, right, bottom, left)` when the node sets them.
    pub sides: Option<(f64, f64, f64, f64)>,
}

pub fn stroke(node: &Value) -> Option<Stroke> {
    let color = solid_color(node, "strokes")?;
    let weight = num(node, "strokeWeight");
    if weight <= 0.0 {
        return None;
    }
    let dashed = node
        .get("strokeDashes")
        .and_then(Value::as_array)
        .is_some_and(|d| !d.is_empty());
    let sides = node
        .get("individualStrokeWeights")
        .filter(|w| w.is_object())
        .map(|w| (num(w, "top"), num(w, "right"), num(w, "bottom"), num(w, "left")));
    Some(Stroke {
        color,
        weight,
        outside: node.get("strokeAlign").and_then(Value::as_str) == Some("OUTSIDE"),
        dashed,
        sides,
    })
}

/// Corner radii as CSS: one value, or four when the corners differ.
pub fn corner_radius(node: &Value) -> Option<String> {
    if let Some(radii) = node.get("rectangleCornerRadii").and_then(Value::as_array) {
        let values: Vec<f64> = radii.iter().filter_map(Value::as_f64).collect();
        if values.len() == 4 && values.iter().any(|v| *v > 0.0) {
            if values.iter().all(|v| (*v - values[0]).abs() < f64::EPSILON) {
                return Some(format_px(values[0]));
            }
            return Some(values.iter().map(|v| format_px(*v)).collect::<Vec<_>>().join(" "));
        }
    }
    let radius = num(node, "cornerRadius");
    (radius > 0.0).then(|| format_px(radius))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    /// `box-shadow` value, inner shadows marked `inset`.
    pub shadow: Option<String>,
    pub layer_blur: Option<String>,
    pub backdrop_blur: Option<String>,
}

pub fn effects(node: &Value) -> Effects {
    let mut shadows = Vec::new();
    let mut out = Effects::default();
    for effect in visible_paints(node, "effects") {
        let radius = num(effect, "radius");
        match effect.get("type").and_then(Value::as_str) {
            Some(kind @ ("DROP_SHADOW" | "INNER_SHADOW")) => {
                let inset = if kind == "INNER_SHADOW" { "inset " } else { "" };
                let offset = &effect["offset"];
                shadows.push(format!(
                    "{inset}{} {} {} {} {}",
                    format_px(num(offset, "x")),
                    format_px(num(offset, "y")),
                    format_px(radius),
                    format_px(num(effect, "spread")),
                    color_hex(&effect["color"], 1.0)
                ));
            }
            Some("LAYER_BLUR") => out.layer_blur = Some(format!("blur({})", format_px(radius))),
            Some("BACKGROUND_BLUR") => {
                out.backdrop_blur = Some(format!("blur({})", format_px(radius)))
            }
            _ => {}
        }
    }
    if !shadows.is_empty() {
        out.shadow = Some(shadows.join(", "));
    }
    out
}

/// CSS `mix-blend-mode` for a Figma blend mode. Normal modes map to `None`.
pub fn blend_mode(node: &Value) -> Option<&'static str> {
    let mode = match node.get("blendMode").and_then(Value::as_str)? {
        "MULTIPLY" => "multiply",
        "SCREEN" => "screen",
        "OVERLAY" => "overlay",
        "DARKEN" => "darken",
        "LIGHTEN" => "lighten",
        "COLOR_DODGE" => "color-dodge",
        "COLOR_BURN" => "color-burn",
        "HARD_LIGHT" => "hard-light",
        "SOFT_LIGHT" => "soft-light",
        "DIFFERENCE" => "difference",
        "EXCLUSION" => "exclusion",
        "HUE" => "hue",
        "SATURATION" => "saturation",
        "COLOR" => "color",
        "LUMINOSITY" => "luminosity",
        _ => return None,
    };
    Some(mode)
}

/// CSS `matrix(...)` for the linear part of a node's `relativeTransform`.
///
/// Translation is dropped because placement comes from the bounding box.
/// Identity transforms yield `None`.
pub fn rotation_matrix(node: &Value) -> Option<String> {
    let rows = node.get("relativeTransform")?.as_array()?;
    let row = |i: usize| -> Option<Vec<f64>> {
        let values: Vec<f64> = rows.get(i)?.as_array()?.iter().filter_map(Value::as_f64).collect();
        (values.len() >= 2).then_some(values)
    };
    let (r0, r1) = (row(0)?, row(1)?);
    let (a, b, c, d) = (r0[0], r1[0], r0[1], r1[1]);
    let identity = (a - 1.0).abs() < 1e-6 && b.abs() < 1e-6 && c.abs() < 1e-6 && (d - 1.0).abs() < 1e-6;
    if identity {
        return None;
    }
    Some(format!("matrix({a:.6}, {b:.6}, {c:.6}, {d:.6}, 0, 0)"))
}
