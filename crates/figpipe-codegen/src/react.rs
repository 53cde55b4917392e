//! React component emission.
//!
//! A node tree is lowered into a small element model first, then printed as
//! JSX. Styling goes to Tailwind arbitrary-value classes when the options ask
//! for Tailwind; anything Tailwind cannot express cleanly (and everything in
//! plain React mode) lands in an inline `style` object.

use serde_json::Value;

use figpipe_types::GenerationOptions;

use crate::style::{
    background, blend_mode, corner_radius, effects, format_number, format_px, num,
    rotation_matrix, solid_color, stroke, unresolved_image_refs, BackgroundKind,
};

/// Children rendered per container before the rest are dropped.
pub const MAX_CHILDREN: usize = 20;

// ---------------------------------------------------------------------------
// Element model
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Element {
    tag: &'static str,
    attrs: Vec<(&'static str, String)>,
    classes: Vec<String>,
    style: Vec<(&'static str, String)>,
    children: Vec<Child>,
}

#[derive(Debug)]
enum Child {
    Element(Element),
    Comment(String),
    Text(String),
}

impl Element {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    /// Add one declaration, as a class in Tailwind mode when `class` is given.
    fn put(&mut self, tailwind: bool, class: Option<String>, key: &'static str, value: String) {
        match class {
            Some(class) if tailwind => self.classes.push(class),
            _ => self.style.push((key, value)),
        }
    }

    fn render(&self, out: &mut String, depth: usize, root: bool) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(self.tag);

        for (key, value) in &self.attrs {
            out.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
        }

        let joined = self.classes.join(" ");
        match (root, joined.is_empty()) {
            (true, true) => out.push_str(" className={className}"),
            (true, false) => out.push_str(&format!(" className={{`${{className}} {joined}`.trim()}}")),
            (false, false) => out.push_str(&format!(" className=\"{joined}\"")),
            (false, true) => {}
        }

        if !self.style.is_empty() {
            let entries: Vec<String> = self
                .style
                .iter()
                .map(|(key, value)| format!("{key}: '{}'", value.replace('\'', "\\'")))
                .collect();
            out.push_str(&format!(" style={{{{ {} }}}}", entries.join(", ")));
        }

        if self.children.is_empty() {
            out.push_str(" />\n");
            return;
        }
        out.push_str(">\n");

        let child_indent = "  ".repeat(depth + 1);
        for child in &self.children {
            match child {
                Child::Element(element) => element.render(out, depth + 1, false),
                Child::Comment(text) => {
                    out.push_str(&format!("{child_indent}{{/* {} */}}\n", text.replace("*/", "* /")));
                }
                Child::Text(text) => {
                    out.push_str(&child_indent);
                    out.push_str(text);
                    out.push('\n');
                }
            }
        }

        out.push_str(&indent);
        out.push_str(&format!("</{}>\n", self.tag));
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('{', "&#123;")
        .replace('}', "&#125;")
}

/// Tailwind arbitrary values cannot contain spaces.
fn arbitrary(value: &str) -> String {
    value.replace(", ", ",").replace(' ', "_")
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Bounds {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

fn bounds(node: &Value) -> Option<Bounds> {
    let bbox = node.get("absoluteBoundingBox").filter(|b| b.is_object())?;
    Some(Bounds {
        x: num(bbox, "x"),
        y: num(bbox, "y"),
        width: num(bbox, "width"),
        height: num(bbox, "height"),
    })
}

/// Layout facts a child needs about its parent.
#[derive(Debug, Clone, Copy)]
struct Parent {
    bounds: Option<Bounds>,
    auto_layout: bool,
}

fn is_auto_layout(node: &Value) -> bool {
    matches!(
        node.get("layoutMode").and_then(Value::as_str),
        Some("HORIZONTAL" | "VERTICAL")
    )
}

fn is_visible(node: &Value) -> bool {
    node.get("visible").and_then(Value::as_bool).unwrap_or(true)
}

fn str_of<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key).and_then(Value::as_str)
}

fn node_name(node: &Value) -> &str {
    str_of(node, "name").unwrap_or("node")
}

// ---------------------------------------------------------------------------
// ReactGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReactGenerator {
    max_children: usize,
}

impl Default for ReactGenerator {
    fn default() -> Self {
        Self {
            max_children: MAX_CHILDREN,
        }
    }
}

impl ReactGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_children(mut self, max_children: usize) -> Self {
        self.max_children = max_children;
        self
    }

    /// Full component module for `node`, exported as `component_name`.
    ///
    /// The root element always consumes the `className` prop.
    pub fn generate_react_code(
        &self,
        node: &Value,
        component_name: &str,
        options: &GenerationOptions,
    ) -> String {
        let mut jsx = String::new();
        match self.element(node, None, options) {
            Some(root) => root.render(&mut jsx, 2, true),
            None => Element::new("div").render(&mut jsx, 2, true),
        }

        format!(
            "import React from 'react';\n\
             \n\
             interface {component_name}Props {{\n  className?: string;\n}}\n\
             \n\
             export const {component_name}: React.FC<{component_name}Props> = ({{\n  className = '',\n}}) => {{\n  return (\n\
             {jsx}  );\n}};\n\
             \n\
             export default {component_name};\n"
        )
    }

    fn element(&self, node: &Value, parent: Option<Parent>, options: &GenerationOptions) -> Option<Element> {
        if !is_visible(node) {
            return None;
        }
        let mut el = match str_of(node, "type").unwrap_or_default() {
            "TEXT" => self.text(node, options),
            "VECTOR" | "BOOLEAN_OPERATION" | "STAR" | "LINE" | "REGULAR_POLYGON" => {
                self.icon(node, options)
            }
            _ => self.container(node, options),
        };
        self.position(&mut el, node, parent, options);
        Some(el)
    }

    fn position(&self, el: &mut Element, node: &Value, parent: Option<Parent>, options: &GenerationOptions) {
        let Some(parent) = parent else {
            return;
        };
        let tw = options.use_tailwind;
        let pinned = str_of(node, "layoutPositioning") == Some("ABSOLUTE");
        let absolute = pinned || (options.hard_fidelity && !parent.auto_layout);

        if absolute {
            if let (Some(own), Some(outer)) = (bounds(node), parent.bounds) {
                let left = format_px(own.x - outer.x);
                let top = format_px(own.y - outer.y);
                el.put(tw, Some("absolute".into()), "position", "absolute".into());
                el.put(tw, Some(format!("left-[{left}]")), "left", left);
                el.put(tw, Some(format!("top-[{top}]")), "top", top);
            }
            return;
        }

        if parent.auto_layout {
            if num(node, "layoutGrow") >= 1.0 {
                el.put(tw, Some("grow".into()), "flexGrow", "1".into());
            } else {
                el.put(tw, Some("shrink-0".into()), "flexShrink", "0".into());
            }
            if str_of(node, "layoutAlign") == Some("STRETCH") {
                el.put(tw, Some("self-stretch".into()), "alignSelf", "stretch".into());
            }
        }
    }

    // -- Containers -----------------------------------------------------------

    fn container(&self, node: &Value, options: &GenerationOptions) -> Element {
        let tw = options.use_tailwind;
        let mut el = Element::new("div");
        let own = bounds(node);
        let auto_layout = is_auto_layout(node);

        if let Some(b) = own {
            let (w, h) = (format_px(b.width), format_px(b.height));
            el.put(tw, Some(format!("w-[{w}]")), "width", w);
            el.put(tw, Some(format!("h-[{h}]")), "height", h);
        }

        let children: Vec<&Value> = node
            .get("children")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|c| is_visible(c))
            .collect();

        let has_pinned_child = children
            .iter()
            .any(|c| str_of(c, "layoutPositioning") == Some("ABSOLUTE"));
        let freeform = options.hard_fidelity && !auto_layout && !children.is_empty();
        if has_pinned_child || freeform {
            el.put(tw, Some("relative".into()), "position", "relative".into());
        }

        if node.get("clipsContent").and_then(Value::as_bool) == Some(true) {
            el.put(tw, Some("overflow-hidden".into()), "overflow", "hidden".into());
        }

        self.paint(&mut el, node, options);
        if str_of(node, "type") == Some("ELLIPSE") {
            el.put(tw, Some("rounded-[50%]".into()), "borderRadius", "50%".into());
        }
        if auto_layout {
            self.flex(&mut el, node, options);
        }

        for image_ref in unresolved_image_refs(node) {
            el.children.push(Child::Comment(format!("imageRef: {image_ref}")));
        }

        if children.len() > self.max_children {
            tracing::debug!(
                node = node_name(node),
                children = children.len(),
                kept = self.max_children,
                "Truncating children"
            );
        }
        let context = Parent {
            bounds: own,
            auto_layout,
        };
        for child in children.into_iter().take(self.max_children) {
            if let Some(child_el) = self.element(child, Some(context), options) {
                el.children.push(Child::Element(child_el));
            }
        }
        el
    }

    /// Fills, radius, strokes, effects, opacity, blend mode, and rotation.
    fn paint(&self, el: &mut Element, node: &Value, options: &GenerationOptions) {
        let tw = options.use_tailwind;

        if let Some(bg) = background(node) {
            match bg.kind {
                BackgroundKind::Color => {
                    el.put(tw, Some(format!("bg-[{}]", bg.value)), "backgroundColor", bg.value)
                }
                _ => el.put(tw, None, "background", bg.value),
            }
        }

        if let Some(radius) = corner_radius(node) {
            el.put(tw, Some(format!("rounded-[{}]", arbitrary(&radius))), "borderRadius", radius);
        }

        if let Some(s) = stroke(node) {
            let line = if s.dashed { "dashed" } else { "solid" };
            if s.outside {
                let w = format_px(s.weight);
                el.put(tw, Some(format!("outline-[{w}]")), "outlineWidth", w);
                el.put(tw, Some(format!("outline-{line}")), "outlineStyle", line.into());
                el.put(tw, Some(format!("outline-[{}]", s.color)), "outlineColor", s.color);
            } else {
                match s.sides {
                    Some((top, right, bottom, left)) => {
                        for (side, key, width) in [
                            ("t", "borderTopWidth", top),
                            ("r", "borderRightWidth", right),
                            ("b", "borderBottomWidth", bottom),
                            ("l", "borderLeftWidth", left),
                        ] {
                            let w = format_px(width);
                            el.put(tw, Some(format!("border-{side}-[{w}]")), key, w);
                        }
                    }
                    None => {
                        let w = format_px(s.weight);
                        el.put(tw, Some(format!("border-[{w}]")), "borderWidth", w);
                    }
                }
                el.put(tw, Some(format!("border-{line}")), "borderStyle", line.into());
                el.put(tw, Some(format!("border-[{}]", s.color)), "borderColor", s.color);
                if !tw {
                    el.style.push(("boxSizing", "border-box".into()));
                }
            }
        }

        let fx = effects(node);
        if let Some(shadow) = fx.shadow {
            el.put(tw, Some(format!("shadow-[{}]", arbitrary(&shadow))), "boxShadow", shadow);
        }
        if let Some(blur) = fx.layer_blur {
            el.put(tw, None, "filter", blur);
        }
        if let Some(blur) = fx.backdrop_blur {
            el.put(tw, None, "backdropFilter", blur);
        }

        let opacity = node.get("opacity").and_then(Value::as_f64).unwrap_or(1.0);
        if opacity < 1.0 {
            let value = format_number(opacity);
            el.put(tw, Some(format!("opacity-[{value}]")), "opacity", value);
        }

        if let Some(mode) = blend_mode(node) {
            el.put(tw, Some(format!("mix-blend-{mode}")), "mixBlendMode", mode.into());
        }

        if options.hard_fidelity {
            if let Some(matrix) = rotation_matrix(node) {
                el.put(tw, None, "transform", matrix);
            }
        }
    }

    fn flex(&self, el: &mut Element, node: &Value, options: &GenerationOptions) {
        let tw = options.use_tailwind;
        el.put(tw, Some("flex".into()), "display", "flex".into());
        let (class, direction) = match str_of(node, "layoutMode") {
            Some("VERTICAL") => ("flex-col", "column"),
            _ => ("flex-row", "row"),
        };
        el.put(tw, Some(class.into()), "flexDirection", direction.into());

        if str_of(node, "layoutWrap") == Some("WRAP") {
            el.put(tw, Some("flex-wrap".into()), "flexWrap", "wrap".into());
        }

        let gap = num(node, "itemSpacing");
        if gap > 0.0 {
            let g = format_px(gap);
            el.put(tw, Some(format!("gap-[{g}]")), "gap", g);
        }

        let justify = match str_of(node, "primaryAxisAlignItems") {
            Some("CENTER") => Some(("justify-center", "center")),
            Some("MAX") => Some(("justify-end", "flex-end")),
            Some("SPACE_BETWEEN") => Some(("justify-between", "space-between")),
            Some("MIN") => Some(("justify-start", "flex-start")),
            _ => None,
        };
        if let Some((class, value)) = justify {
            el.put(tw, Some(class.into()), "justifyContent", value.into());
        }

        let align = match str_of(node, "counterAxisAlignItems") {
            Some("CENTER") => Some(("items-center", "center")),
            Some("MAX") => Some(("items-end", "flex-end")),
            Some("BASELINE") => Some(("items-baseline", "baseline")),
            Some("MIN") => Some(("items-start", "flex-start")),
            _ => None,
        };
        if let Some((class, value)) = align {
            el.put(tw, Some(class.into()), "alignItems", value.into());
        }

        for (prefix, key, field) in [
            ("pt", "paddingTop", "paddingTop"),
            ("pr", "paddingRight", "paddingRight"),
            ("pb", "paddingBottom", "paddingBottom"),
            ("pl", "paddingLeft", "paddingLeft"),
        ] {
            let value = num(node, field);
            if value > 0.0 {
                let p = format_px(value);
                el.put(tw, Some(format!("{prefix}-[{p}]")), key, p);
            }
        }
    }

    // -- Text -----------------------------------------------------------------

    fn text(&self, node: &Value, options: &GenerationOptions) -> Element {
        let tw = options.use_tailwind;
        let style = node.get("style").cloned().unwrap_or(Value::Null);
        let link = style
            .get("hyperlink")
            .and_then(|h| h.get("url"))
            .and_then(Value::as_str);

        let mut el = match link {
            Some(url) => {
                let mut a = Element::new("a");
                a.attrs.push(("href", url.to_string()));
                a
            }
            None => Element::new("span"),
        };

        if options.hard_fidelity && str_of(node, "textAutoResize") != Some("WIDTH_AND_HEIGHT") {
            if let Some(b) = bounds(node) {
                let w = format_px(b.width);
                el.put(tw, Some("block".into()), "display", "block".into());
                el.put(tw, Some(format!("w-[{w}]")), "width", w);
            }
        }

        if let Some(family) = str_of(&style, "fontFamily") {
            el.style.push(("fontFamily", format!("\"{family}\", sans-serif")));
        }

        let size = num(&style, "fontSize");
        if size > 0.0 {
            let s = format_px(size);
            el.put(tw, Some(format!("text-[{s}]")), "fontSize", s);
        }

        let weight = num(&style, "fontWeight");
        if weight > 0.0 {
            el.put(tw, Some(weight_class(weight).into()), "fontWeight", format_number(weight));
        }

        if let Some(color) = solid_color(node, "fills") {
            el.put(tw, Some(format!("text-[{color}]")), "color", color);
        }

        let line_height = num(&style, "lineHeightPx");
        if line_height > 0.0 {
            let lh = format_px(line_height);
            el.put(tw, Some(format!("leading-[{lh}]")), "lineHeight", lh);
        }

        let tracking = num(&style, "letterSpacing");
        if tracking != 0.0 {
            let t = format_px(tracking);
            el.put(tw, Some(format!("tracking-[{t}]")), "letterSpacing", t);
        }

        let align = match str_of(&style, "textAlignHorizontal") {
            Some("CENTER") => Some(("text-center", "center")),
            Some("RIGHT") => Some(("text-right", "right")),
            Some("JUSTIFIED") => Some(("text-justify", "justify")),
            _ => None,
        };
        if let Some((class, value)) = align {
            el.put(tw, Some(class.into()), "textAlign", value.into());
        }

        let case = match str_of(&style, "textCase") {
            Some("UPPER") => Some(("uppercase", "uppercase")),
            Some("LOWER") => Some(("lowercase", "lowercase")),
            Some("TITLE") => Some(("capitalize", "capitalize")),
            _ => None,
        };
        if let Some((class, value)) = case {
            el.put(tw, Some(class.into()), "textTransform", value.into());
        }

        let decoration = match str_of(&style, "textDecoration") {
            Some("UNDERLINE") => Some(("underline", "underline")),
            Some("STRIKETHROUGH") => Some(("line-through", "line-through")),
            _ => None,
        };
        if let Some((class, value)) = decoration {
            el.put(tw, Some(class.into()), "textDecoration", value.into());
        }

        let max_lines = num(&style, "maxLines").max(num(node, "maxLines"));
        if max_lines >= 1.0 {
            let lines = format_number(max_lines);
            if tw {
                el.classes.push(format!("line-clamp-{lines}"));
            } else {
                el.style.push(("overflow", "hidden".into()));
                el.style.push(("display", "-webkit-box".into()));
                el.style.push(("WebkitBoxOrient", "vertical".into()));
                el.style.push(("WebkitLineClamp", lines));
            }
        }

        let paragraph = num(&style, "paragraphSpacing");
        if paragraph > 0.0 {
            let p = format_px(paragraph);
            el.put(tw, Some(format!("mb-[{p}]")), "marginBottom", p);
        }

        let opacity = node.get("opacity").and_then(Value::as_f64).unwrap_or(1.0);
        if opacity < 1.0 {
            let value = format_number(opacity);
            el.put(tw, Some(format!("opacity-[{value}]")), "opacity", value);
        }

        let characters = str_of(node, "characters").unwrap_or_default();
        let lines: Vec<String> = characters.split('\n').map(escape_text).collect();
        let text = lines.join("<br />");
        if !text.is_empty() {
            el.children.push(Child::Text(text));
        }
        el
    }

    // -- Vectors --------------------------------------------------------------

    fn icon(&self, node: &Value, options: &GenerationOptions) -> Element {
        let tw = options.use_tailwind;
        let name = node_name(node).to_string();
        let (width, height) = bounds(node)
            .map(|b| (b.width, b.height))
            .unwrap_or((0.0, 0.0));

        let fill = solid_color(node, "fills");
        let stroke_color = solid_color(node, "strokes");
        let mut paths: Vec<Element> = Vec::new();
        for (key, color) in [("fillGeometry", &fill), ("strokeGeometry", &stroke_color)] {
            let Some(color) = color else {
                continue;
            };
            for geometry in node.get(key).and_then(Value::as_array).into_iter().flatten() {
                let Some(d) = str_of(geometry, "path") else {
                    continue;
                };
                let mut path = Element::new("path");
                path.attrs.push(("d", d.to_string()));
                path.attrs.push(("fill", color.clone()));
                if str_of(geometry, "windingRule") == Some("EVENODD") {
                    path.attrs.push(("fillRule", "evenodd".into()));
                    path.attrs.push(("clipRule", "evenodd".into()));
                }
                paths.push(path);
            }
        }

        if paths.is_empty() {
            let mut el = Element::new("div");
            let (w, h) = (format_px(width), format_px(height));
            el.put(tw, Some(format!("w-[{w}]")), "width", w);
            el.put(tw, Some(format!("h-[{h}]")), "height", h);
            if let Some(color) = fill {
                el.put(tw, Some(format!("bg-[{color}]")), "backgroundColor", color);
            }
            el.children.push(Child::Comment(format!("Icon: {name}")));
            return el;
        }

        let mut svg = Element::new("svg");
        let (w, h) = (format_number(width), format_number(height));
        svg.attrs.push(("width", w.clone()));
        svg.attrs.push(("height", h.clone()));
        svg.attrs.push(("viewBox", format!("0 0 {w} {h}")));
        svg.attrs.push(("fill", "none".into()));
        svg.attrs.push(("xmlns", "http://www.w3.org/2000/svg".into()));
        svg.put(tw, Some("overflow-visible".into()), "overflow", "visible".into());
        let opacity = node.get("opacity").and_then(Value::as_f64).unwrap_or(1.0);
        if opacity < 1.0 {
            let value = format_number(opacity);
            svg.put(tw, Some(format!("opacity-[{value}]")), "opacity", value);
        }
        svg.children.push(Child::Comment(format!("Icon: {name}")));
        svg.children.extend(paths.into_iter().map(Child::Element));
        svg
    }
}

fn weight_class(weight: f64) -> &'static str {
    match weight.round() as i64 {
        ..=149 => "font-thin",
        150..=249 => "font-extralight",
        250..=349 => "font-light",
        350..=449 => "font-normal",
        450..=549 => "font-medium",
        550..=649 => "font-semibold",
        650..=749 => "font-bold",
        750..=849 => "font-extrabold",
        _ => "font-black",
    }
}

/// PascalCase identifier from a free-form layer name.
///
/// Non-alphanumeric characters split words, a leading digit gets a
/// `Component` prefix, and an empty result falls back to `Component`.
pub fn sanitize_component_name(raw: &str) -> String {
    let name: String = raw
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    match name.chars().next() {
        None => "Component".to_string(),
        Some(first) if first.is_ascii_digit() => format!("Component{name}"),
        Some(_) => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tailwind() -> GenerationOptions {
        GenerationOptions {
            use_tailwind: true,
            hard_fidelity: false,
        }
    }

    fn plain() -> GenerationOptions {
        GenerationOptions {
            use_tailwind: false,
            hard_fidelity: false,
        }
    }

    fn strict() -> GenerationOptions {
        GenerationOptions {
            use_tailwind: true,
            hard_fidelity: true,
        }
    }

    fn frame(children: Value) -> Value {
        json!({
            "id": "1:1",
            "name": "Card",
            "type": "FRAME",
            "absoluteBoundingBox": {"x": 0, "y": 0, "width": 320, "height": 200},
            "fills": [{"type": "SOLID", "color": {"r": 1, "g": 1, "b": 1, "a": 1}}],
            "children": children
        })
    }

    fn text(id: &str, chars: &str) -> Value {
        json!({
            "id": id,
            "name": chars,
            "type": "TEXT",
            "characters": chars,
            "absoluteBoundingBox": {"x": 10, "y": 10, "width": 100, "height": 20},
            "fills": [{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 0, "a": 1}}],
            "style": {"fontFamily": "Inter", "fontSize": 16, "fontWeight": 700, "lineHeightPx": 24}
        })
    }

    #[test]
    fn component_module_shape() {
        let code = ReactGenerator::new().generate_react_code(&frame(json!([])), "Card", &tailwind());
        assert!(code.starts_with("import React from 'react';"));
        assert!(code.contains("interface CardProps {\n  className?: string;\n}"));
        assert!(code.contains("export const Card: React.FC<CardProps> = ({\n  className = '',\n}) => {"));
        assert!(code.trim_end().ends_with("export default Card;"));
    }

    #[test]
    fn root_merges_class_name_prop() {
        let code = ReactGenerator::new().generate_react_code(&frame(json!([])), "Card", &tailwind());
        assert!(code.contains("className={`${className} w-[320px] h-[200px] bg-[#ffffff]`.trim()}"));

        let code = ReactGenerator::new().generate_react_code(&frame(json!([])), "Card", &plain());
        assert!(code.contains("className={className}"));
        assert!(code.contains("width: '320px'"));
        assert!(code.contains("backgroundColor: '#ffffff'"));
    }

    #[test]
    fn text_gets_typography_classes() {
        let code =
            ReactGenerator::new().generate_react_code(&frame(json!([text("1:2", "Hello")])), "Card", &tailwind());
        assert!(code.contains("<span className=\"text-[16px] font-bold text-[#000000] leading-[24px]\""));
        assert!(code.contains("fontFamily: '\"Inter\", sans-serif'"));
        assert!(code.contains("Hello"));
    }

    #[test]
    fn text_is_escaped_and_links_become_anchors() {
        let mut node = text("1:2", "a < b {x}\nnext");
        node["style"]["hyperlink"] = json!({"type": "URL", "url": "https://example.com"});
        let code = ReactGenerator::new().generate_react_code(&frame(json!([node])), "Card", &tailwind());
        assert!(code.contains("<a href=\"https://example.com\""));
        assert!(code.contains("a &lt; b &#123;x&#125;<br />next"));
    }

    #[test]
    fn hidden_nodes_are_skipped() {
        let mut hidden = text("1:3", "Secret");
        hidden["visible"] = json!(false);
        let code = ReactGenerator::new().generate_react_code(
            &frame(json!([text("1:2", "Shown"), hidden])),
            "Card",
            &tailwind(),
        );
        assert!(code.contains("Shown"));
        assert!(!code.contains("Secret"));
    }

    #[test]
    fn auto_layout_becomes_flex() {
        let mut node = frame(json!([text("1:2", "A")]));
        node["layoutMode"] = json!("VERTICAL");
        node["itemSpacing"] = json!(12);
        node["paddingTop"] = json!(8);
        node["paddingLeft"] = json!(16.5);
        node["primaryAxisAlignItems"] = json!("SPACE_BETWEEN");
        node["counterAxisAlignItems"] = json!("CENTER");
        let code = ReactGenerator::new().generate_react_code(&node, "Card", &tailwind());
        assert!(code.contains("flex flex-col gap-[12px] justify-between items-center pt-[8px] pl-[16.5px]"));
        assert!(code.contains("shrink-0"));
    }

    #[test]
    fn freeform_children_are_absolutely_placed_in_hard_fidelity() {
        let mut child = text("1:2", "Pinned");
        child["absoluteBoundingBox"] = json!({"x": 50.5, "y": -19.75, "width": 40, "height": 10});
        let code = ReactGenerator::new().generate_react_code(&frame(json!([child])), "Card", &strict());
        assert!(code.contains("relative"));
        assert!(code.contains("absolute left-[50.5px] top-[-19.75px]"));

        let loose = ReactGenerator::new().generate_react_code(
            &frame(json!([text("1:2", "Loose")])),
            "Card",
            &tailwind(),
        );
        assert!(!loose.contains("absolute"));
    }

    #[test]
    fn pinned_child_in_auto_layout() {
        let mut node = frame(json!([]));
        node["layoutMode"] = json!("HORIZONTAL");
        let mut badge = text("1:2", "New");
        badge["layoutPositioning"] = json!("ABSOLUTE");
        node["children"] = json!([badge]);
        let code = ReactGenerator::new().generate_react_code(&node, "Card", &tailwind());
        assert!(code.contains("relative"));
        assert!(code.contains("absolute left-[10px] top-[10px]"));
    }

    #[test]
    fn vectors_render_inline_svg() {
        let icon = json!({
            "id": "1:5",
            "name": "Arrow",
            "type": "VECTOR",
            "absoluteBoundingBox": {"x": 0, "y": 0, "width": 24, "height": 24},
            "fills": [{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 0, "a": 1}}],
            "fillGeometry": [{"path": "M0 0L24 12L0 24Z", "windingRule": "EVENODD"}]
        });
        let code = ReactGenerator::new().generate_react_code(&frame(json!([icon])), "Card", &tailwind());
        assert!(code.contains("{/* Icon: Arrow */}"));
        assert!(code.contains("<svg width=\"24\" height=\"24\" viewBox=\"0 0 24 24\""));
        assert!(code.contains("<path d=\"M0 0L24 12L0 24Z\" fill=\"#000000\" fillRule=\"evenodd\""));
    }

    #[test]
    fn vector_without_geometry_is_a_sized_box() {
        let icon = json!({
            "id": "1:5",
            "name": "Dot",
            "type": "VECTOR",
            "absoluteBoundingBox": {"x": 0, "y": 0, "width": 8, "height": 8}
        });
        let code = ReactGenerator::new().generate_react_code(&frame(json!([icon])), "Card", &tailwind());
        assert!(code.contains("<div className=\"w-[8px] h-[8px]\">"));
        assert!(code.contains("{/* Icon: Dot */}"));
    }

    #[test]
    fn image_fills_use_materialized_urls_or_placeholders() {
        let mut node = frame(json!([]));
        node["fills"] = json!([{"type": "IMAGE", "scaleMode": "FILL", "imageRef": "abc", "imageUrl": "/assets/figma/abc.png"}]);
        let code = ReactGenerator::new().generate_react_code(&node, "Card", &tailwind());
        assert!(code.contains("background: 'url(\"/assets/figma/abc.png\") center/cover no-repeat'"));
        assert!(!code.contains("imageRef:"));

        node["fills"] = json!([{"type": "IMAGE", "imageRef": "missing"}]);
        let code = ReactGenerator::new().generate_react_code(&node, "Card", &tailwind());
        assert!(code.contains("{/* imageRef: missing */}"));
    }

    #[test]
    fn effects_and_borders() {
        let mut node = frame(json!([]));
        node["cornerRadius"] = json!(12);
        node["strokes"] = json!([{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 0, "a": 1}}]);
        node["strokeWeight"] = json!(1);
        node["strokeDashes"] = json!([2, 2]);
        node["effects"] = json!([{"type": "DROP_SHADOW", "offset": {"x": 0, "y": 2}, "radius": 4,
                                  "color": {"r": 0, "g": 0, "b": 0, "a": 1}}]);
        node["opacity"] = json!(0.5);
        let code = ReactGenerator::new().generate_react_code(&node, "Card", &tailwind());
        assert!(code.contains("rounded-[12px]"));
        assert!(code.contains("border-[1px] border-dashed border-[#000000]"));
        assert!(code.contains("shadow-[0px_2px_4px_0px_#000000]"));
        assert!(code.contains("opacity-[0.5]"));
    }

    #[test]
    fn children_are_capped() {
        let children: Vec<Value> = (0..25).map(|i| text(&format!("2:{i}"), &format!("Item{i}"))).collect();
        let generator = ReactGenerator::new().with_max_children(MAX_CHILDREN);
        let code = generator.generate_react_code(&frame(json!(children)), "List", &tailwind());
        assert!(code.contains("Item19"));
        assert!(!code.contains("Item20"));
    }

    #[test]
    fn component_names_are_pascal_case() {
        assert_eq!(sanitize_component_name("hero card / v2"), "HeroCardV2");
        assert_eq!(sanitize_component_name("myWidget"), "MyWidget");
        assert_eq!(sanitize_component_name("404 page"), "Component404Page");
        assert_eq!(sanitize_component_name("--"), "Component");
        assert_eq!(sanitize_component_name(""), "Component");
    }

    #[test]
    fn font_weight_buckets() {
        assert_eq!(weight_class(400.0), "font-normal");
        assert_eq!(weight_class(600.0), "font-semibold");
        assert_eq!(weight_class(900.0), "font-black");
    }
}
