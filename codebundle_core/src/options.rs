use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::BoxError;
use crate::Code;
use crate::GlobalsCode;
use crate::OutputMode;
use crate::SourceComments;
use crate::SourceLoad;
use crate::TransformedSource;
use crate::Tree;
use crate::Variant;
use crate::config::BundleConfig;
use crate::config::DEFAULT_MAX_DEPTH;

/// Fetches the raw content of a resource.
#[async_trait]
pub trait SourceLoader: Send + Sync {
	async fn load_source(&self, url: &str) -> Result<SourceLoad, BoxError>;
}

/// Parses raw text into a [`Tree`].
#[async_trait]
pub trait SourceParser: Send + Sync {
	async fn parse_source(
		&self,
		text: &str,
		file_name: &str,
		language: Option<&str>,
	) -> Result<Tree, BoxError>;
}

/// Resolves a bare url into complete variant metadata.
#[async_trait]
pub trait VariantMetaLoader: Send + Sync {
	async fn load_variant_meta(&self, variant_name: &str, url: &str) -> Result<Variant, BoxError>;
}

/// Resolves a url into every variant of a sample.
#[async_trait]
pub trait CodeMetaLoader: Send + Sync {
	async fn load_code_meta(&self, url: &str) -> Result<Code, BoxError>;
}

/// Produces named alternate renditions of a file's text, e.g. a JavaScript
/// rendition of a TypeScript file.
#[async_trait]
pub trait SourceTransformer: Send + Sync {
	async fn transform(
		&self,
		text: &str,
		file_name: &str,
	) -> Result<BTreeMap<String, TransformedSource>, BoxError>;
}

/// Rewrites a parsed tree, optionally using comment metadata reported by the
/// loader.
#[async_trait]
pub trait SourceEnhancer: Send + Sync {
	async fn enhance(
		&self,
		tree: Tree,
		comments: Option<&SourceComments>,
		file_name: &str,
	) -> Result<Tree, BoxError>;
}

/// A transformer and the file extensions it applies to.
#[derive(Clone)]
pub struct RegisteredTransformer {
	/// Lowercase extensions without the leading dot.
	pub extensions: Vec<String>,
	pub transformer: Arc<dyn SourceTransformer>,
}

impl RegisteredTransformer {
	pub fn new<I, S>(extensions: I, transformer: Arc<dyn SourceTransformer>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let extensions = extensions
			.into_iter()
			.map(|extension| extension.as_ref().trim_start_matches('.').to_lowercase())
			.collect();

		Self {
			extensions,
			transformer,
		}
	}

	pub fn matches(&self, extension: &str) -> bool {
		self.extensions.iter().any(|candidate| candidate == extension)
	}
}

/// Whether recoverable inconsistencies fail the resolution or only warn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
	#[default]
	Development,
	Production,
}

impl Mode {
	/// Read `CODEBUNDLE_MODE`, if set to a known value.
	pub fn from_env() -> Option<Self> {
		let value = std::env::var("CODEBUNDLE_MODE").ok()?;
		match value.trim().to_lowercase().as_str() {
			"production" | "prod" => Some(Self::Production),
			"development" | "dev" => Some(Self::Development),
			_ => None,
		}
	}
}

/// Collaborators and settings for a resolution. Passed explicitly into
/// every call; nothing is registered globally.
#[derive(Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct LoadOptions {
	pub loader: Option<Arc<dyn SourceLoader>>,
	pub parser: Option<Arc<dyn SourceParser>>,
	pub variant_meta_loader: Option<Arc<dyn VariantMetaLoader>>,
	pub code_meta_loader: Option<Arc<dyn CodeMetaLoader>>,
	pub transformers: Vec<RegisteredTransformer>,
	pub enhancers: Vec<Arc<dyn SourceEnhancer>>,
	/// Keep raw text instead of parsing it.
	pub disable_parsing: bool,
	/// Skip running source transformers.
	pub disable_transforms: bool,
	/// Maximum nesting of extra files below the main file.
	pub max_depth: usize,
	/// Variants whose extra files are injected into every resolved variant.
	pub globals_code: Vec<GlobalsCode>,
	pub output: OutputMode,
	pub mode: Mode,
}

impl Default for LoadOptions {
	fn default() -> Self {
		Self {
			loader: None,
			parser: None,
			variant_meta_loader: None,
			code_meta_loader: None,
			transformers: Vec::new(),
			enhancers: Vec::new(),
			disable_parsing: false,
			disable_transforms: false,
			max_depth: DEFAULT_MAX_DEPTH,
			globals_code: Vec::new(),
			output: OutputMode::default(),
			mode: Mode::default(),
		}
	}
}

impl LoadOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Construct [`LoadOptions`] from a [`BundleConfig`]. Collaborators still
	/// have to be attached by the caller. `CODEBUNDLE_MODE` overrides the
	/// configured mode.
	pub fn from_config(config: Option<&BundleConfig>) -> Self {
		let defaults = Self::default();
		let mode = Mode::from_env()
			.or_else(|| config.and_then(|c| c.mode))
			.unwrap_or_default();

		Self {
			disable_parsing: config.is_some_and(|c| c.disable_parsing),
			disable_transforms: config.is_some_and(|c| c.disable_transforms),
			max_depth: config.and_then(|c| c.max_depth).unwrap_or(defaults.max_depth),
			output: config.and_then(|c| c.output).unwrap_or_default(),
			mode,
			..defaults
		}
	}

	#[must_use]
	pub fn with_loader(mut self, loader: Arc<dyn SourceLoader>) -> Self {
		self.loader = Some(loader);
		self
	}

	#[must_use]
	pub fn with_parser(mut self, parser: Arc<dyn SourceParser>) -> Self {
		self.parser = Some(parser);
		self
	}

	#[must_use]
	pub fn with_variant_meta_loader(mut self, loader: Arc<dyn VariantMetaLoader>) -> Self {
		self.variant_meta_loader = Some(loader);
		self
	}

	#[must_use]
	pub fn with_code_meta_loader(mut self, loader: Arc<dyn CodeMetaLoader>) -> Self {
		self.code_meta_loader = Some(loader);
		self
	}

	#[must_use]
	pub fn with_transformer(mut self, transformer: RegisteredTransformer) -> Self {
		self.transformers.push(transformer);
		self
	}

	#[must_use]
	pub fn with_enhancer(mut self, enhancer: Arc<dyn SourceEnhancer>) -> Self {
		self.enhancers.push(enhancer);
		self
	}

	#[must_use]
	pub fn with_globals(mut self, globals: impl Into<GlobalsCode>) -> Self {
		self.globals_code.push(globals.into());
		self
	}

	#[must_use]
	pub fn with_mode(mut self, mode: Mode) -> Self {
		self.mode = mode;
		self
	}

	#[must_use]
	pub fn with_output(mut self, output: OutputMode) -> Self {
		self.output = output;
		self
	}

	#[must_use]
	pub fn with_max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth;
		self
	}

	#[must_use]
	pub fn without_parsing(mut self) -> Self {
		self.disable_parsing = true;
		self
	}

	#[must_use]
	pub fn without_transforms(mut self) -> Self {
		self.disable_transforms = true;
		self
	}

	/// The transformers registered for a file name's extension.
	pub(crate) fn transformers_for(&self, file_name: &str) -> Vec<&RegisteredTransformer> {
		let Some(extension) = crate::path::extension_of(file_name) else {
			return Vec::new();
		};

		self.transformers
			.iter()
			.filter(|registered| registered.matches(&extension))
			.collect()
	}
}

impl std::fmt::Debug for LoadOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LoadOptions")
			.field("loader", &self.loader.is_some())
			.field("parser", &self.parser.is_some())
			.field("variant_meta_loader", &self.variant_meta_loader.is_some())
			.field("code_meta_loader", &self.code_meta_loader.is_some())
			.field("transformers", &self.transformers.len())
			.field("enhancers", &self.enhancers.len())
			.field("disable_parsing", &self.disable_parsing)
			.field("disable_transforms", &self.disable_transforms)
			.field("max_depth", &self.max_depth)
			.field("globals_code", &self.globals_code.len())
			.field("output", &self.output)
			.field("mode", &self.mode)
			.finish()
	}
}
