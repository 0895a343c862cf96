//! `codebundle_core` is the engine behind [codebundle](https://github.com/ifiokjr/codebundle). Given a named variant of a documentation code sample (e.g. the JavaScript and TypeScript renditions of one demo) it discovers, loads, parses and transforms every file the sample depends on, and packages them into a self-contained bundle that is cheap to ship to a client.
//!
//! ## Resolution Pipeline
//!
//! ```text
//! Variant (inline source or url)
//!   → Variant metadata (optional VariantMetaLoader)
//!   → Single-file loader (LoadSourceCache, SourceLoader, transformers, SourceParser, enhancers)
//!   → Globals injection (shared files merged in under collision free names)
//!   → Recursive extra file resolution (cycle detection, depth budget, key rebasing)
//!   → Packaged variant + dependency list + externals
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Configuration loading from `codebundle.toml`.
//! - [`path`] — Key rebasing and virtual file paths for the files of a variant.
//!
//! ## Key Types
//!
//! - [`Variant`] — One rendition of a sample, used both as input and as packaged output.
//! - [`LoadOptions`] — The collaborators ([`SourceLoader`], [`SourceParser`], …) and settings for a resolution.
//! - [`ResolvedVariant`] — The packaged variant with its dependencies and externals.
//! - [`LineDelta`] and [`TreeDelta`] — Transforms stored as deltas against the baseline file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codebundle_core::LoadOptions;
//! use codebundle_core::Variant;
//! use codebundle_core::load_variant;
//!
//! # async fn run() -> codebundle_core::BundleResult<()> {
//! let variant = Variant::inline("entry.js", "import './utils.js';\n")
//! 	.with_extra_file("utils.js", "https://example.com/utils.js");
//! let options = LoadOptions::new().without_parsing();
//! let resolved = load_variant("js", variant, &options).await?;
//!
//! println!("{}", serde_json::to_string_pretty(&resolved.variant).unwrap());
//! # Ok(())
//! # }
//! ```

pub use cache::*;
pub use delta::*;
pub use error::*;
pub use externals::*;
pub use fallback::*;
pub use options::*;
pub use transform::apply_transform;
pub use tree::*;
pub use types::*;
pub use variant::*;

mod cache;
pub mod config;
mod delta;
#[allow(unused_assignments)]
mod error;
pub(crate) mod extra_files;
mod externals;
mod fallback;
pub(crate) mod globals;
pub(crate) mod loader;
mod options;
pub mod path;
pub(crate) mod transform;
mod tree;
mod types;
mod variant;

#[cfg(test)]
mod __fixtures;
