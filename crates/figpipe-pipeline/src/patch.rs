//! Deterministic text patches tried when the visual gate fails.
//!
//! A [`PatchRegistry`] holds an ordered list of [`PatchStrategy`]s. The runner
//! picks one strategy per iteration and evaluates each candidate on its own;
//! strategies never see gate results and never touch anything but the code.

use std::sync::OnceLock;

use regex::{Captures, Regex};

// ---------------------------------------------------------------------------
// PatchStrategy trait
// ---------------------------------------------------------------------------

pub trait PatchStrategy: Send + Sync {
    /// Stable identifier used in logs and events.
    fn name(&self) -> &str;

    /// Return the patched code. Returning the input unchanged means "nothing to do".
    fn apply(&self, code: &str) -> String;
}

// ---------------------------------------------------------------------------
// PatchRegistry
// ---------------------------------------------------------------------------

pub struct PatchRegistry {
    strategies: Vec<Box<dyn PatchStrategy>>,
}

impl PatchRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn register(&mut self, strategy: impl PatchStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Strategy for a 1-based iteration. Iterations past the end reuse the last strategy.
    pub fn for_iteration(&self, iteration: u32) -> Option<&dyn PatchStrategy> {
        let last = self.strategies.len().checked_sub(1)?;
        let idx = (iteration.saturating_sub(1) as usize).min(last);
        self.strategies.get(idx).map(|s| s.as_ref())
    }
}

impl Default for PatchRegistry {
    /// Built-in strategies, in application order.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(NormalizeArbitraryClasses);
        registry.register(ClipRoundedContainers);
        registry
    }
}

// ---------------------------------------------------------------------------
// Built-in strategies
// ---------------------------------------------------------------------------

fn class_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"className="([^"]*)""#).expect("static pattern"))
}

fn class_template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"className=\{`([^`]*)`\}").expect("static pattern"))
}

fn arbitrary_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\[\]]+)\]").expect("static pattern"))
}

/// Canonicalize Tailwind arbitrary values inside `className="..."` literals.
pub struct NormalizeArbitraryClasses;

impl PatchStrategy for NormalizeArbitraryClasses {
    fn name(&self) -> &str {
        "normalize_tailwind_arbitrary_classes"
    }

    fn apply(&self, code: &str) -> String {
        normalize_tailwind_arbitrary_classes(code)
    }
}

/// Add `overflow-hidden` to rounded containers that do not set any overflow.
pub struct ClipRoundedContainers;

impl PatchStrategy for ClipRoundedContainers {
    fn name(&self) -> &str {
        "add_overflow_hidden_for_rounded"
    }

    fn apply(&self, code: &str) -> String {
        add_overflow_hidden_for_rounded(code)
    }
}

/// `[12.0px, 4.0px]` becomes `[12px,4px]`; inner whitespace becomes `_`.
pub fn normalize_tailwind_arbitrary_classes(code: &str) -> String {
    class_literal_re()
        .replace_all(code, |caps: &Captures| {
            let normalized = arbitrary_value_re().replace_all(&caps[1], normalize_bracket);
            let normalized: Vec<&str> = normalized.split_whitespace().collect();
            format!("className=\"{}\"", normalized.join(" "))
        })
        .into_owned()
}

fn normalize_bracket(caps: &Captures) -> String {
    static COMMA: OnceLock<Regex> = OnceLock::new();
    static TRAILING_ZERO: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let comma = COMMA.get_or_init(|| Regex::new(r",\s*").expect("static pattern"));
    let trailing_zero =
        TRAILING_ZERO.get_or_init(|| Regex::new(r"(\d)\.0([a-zA-Z%])").expect("static pattern"));
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").expect("static pattern"));

    let content = comma.replace_all(caps[1].trim(), ",");
    let content = trailing_zero.replace_all(&content, "$1$2");
    let content = spaces.replace_all(&content, "_");
    format!("[{content}]")
}

pub fn add_overflow_hidden_for_rounded(code: &str) -> String {
    fn augment(class_value: &str) -> String {
        let mut classes: Vec<&str> = class_value.split_whitespace().collect();
        let has_rounded = classes
            .iter()
            .any(|c| c.starts_with("rounded") || c.contains("rounded-"));
        let has_overflow = classes.iter().any(|c| c.starts_with("overflow-"));
        if has_rounded && !has_overflow {
            classes.push("overflow-hidden");
        }
        classes.join(" ")
    }

    let literal = class_literal_re().replace_all(code, |caps: &Captures| {
        format!("className=\"{}\"", augment(&caps[1]))
    });
    class_template_re()
        .replace_all(&literal, |caps: &Captures| {
            format!("className={{`{}`}}", augment(&caps[1]))
        })
        .into_owned()
}
