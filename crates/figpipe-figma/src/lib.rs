//! Figma REST access for figpipe.
//!
//! [`FigmaClient`] wraps the file-nodes, image-fill, and node-render
//! endpoints with retry/backoff. [`extract_design_tokens`] derives token
//! lists from an already-fetched node tree.

pub mod client;
pub mod retry;
pub mod tokens;

pub use client::{FigmaClient, RemoteFile};
pub use retry::{with_retry, BackoffPolicy};
pub use tokens::extract_design_tokens;
