//! React and React+Tailwind code generation from Figma node JSON.
//!
//! The generator is pure: the same node, name, and [`GenerationOptions`]
//! always produce the same source text.
//!
//! [`GenerationOptions`]: figpipe_types::GenerationOptions

pub mod react;
pub mod style;

pub use react::{sanitize_component_name, ReactGenerator, MAX_CHILDREN};
