use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;

/// Error type returned by the collaborators supplied to the engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A collaborator failure that can be shared between every waiter of the
/// same in-flight load.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Diagnostic, Error)]
#[non_exhaustive]
pub enum BundleError {
	#[error("no source loader configured to fetch `{url}`")]
	#[diagnostic(
		code(codebundle::missing_loader),
		help("supply a `SourceLoader` with `LoadOptions::with_loader`")
	)]
	MissingLoader { url: String },

	#[error("no source parser configured to parse `{file}`")]
	#[diagnostic(
		code(codebundle::missing_parser),
		help("supply a `SourceParser` or set `disable_parsing`")
	)]
	MissingParser { file: String },

	#[error("no code metadata loader configured to load `{url}`")]
	#[diagnostic(code(codebundle::missing_code_meta_loader))]
	MissingCodeMetaLoader { url: String },

	#[error("file `{file}` has neither inline source nor a url to load it from")]
	#[diagnostic(code(codebundle::missing_source))]
	MissingSource { file: String },

	#[error("unable to derive a file name from `{url}`")]
	#[diagnostic(
		code(codebundle::missing_file_name),
		help("declare `fileName` on the variant or provide a `VariantMetaLoader`")
	)]
	MissingFileName { url: String },

	#[error("extra file key `{key}` must be relative to the file that declares it")]
	#[diagnostic(code(codebundle::absolute_extra_file_key))]
	AbsoluteExtraFileKey { key: String },

	#[error("extra file `{key}` discovered while loading `{url}` points at relative path `{value}`")]
	#[diagnostic(
		code(codebundle::relative_extra_file_url),
		help("loaders must report extra files as absolute urls or inline content")
	)]
	RelativeExtraFileUrl {
		key: String,
		value: String,
		url: String,
	},

	#[error("extra dependency `{dependency}` reported by `{url}` is not an absolute url")]
	#[diagnostic(code(codebundle::relative_dependency))]
	RelativeDependency { dependency: String, url: String },

	#[error("`{url}` lists itself as an extra dependency")]
	#[diagnostic(code(codebundle::self_dependency))]
	SelfDependency { url: String },

	#[error("extra file `{key}` points at relative path `{value}` but no base url is available")]
	#[diagnostic(
		code(codebundle::unresolvable_relative_entry),
		help("give the variant a `url` or declare the extra file with an absolute url")
	)]
	UnresolvableRelativeEntry { key: String, value: String },

	#[error("circular dependency detected at `{url}`")]
	#[diagnostic(code(codebundle::circular_dependency))]
	CircularDependency { url: String },

	#[error("maximum extra file depth of {max_depth} exceeded")]
	#[diagnostic(
		code(codebundle::max_depth_exceeded),
		help("raise `max_depth` or check for files that import each other under different urls")
	)]
	MaxDepthExceeded { max_depth: usize },

	#[error("variant `{variant}` lists all files but loading `{file}` discovered: {files}")]
	#[diagnostic(
		code(codebundle::unlisted_extra_files),
		help("add the files to `extraFiles` or drop `allFilesListed`")
	)]
	UnlistedExtraFiles {
		variant: String,
		file: String,
		files: String,
	},

	#[error("failed to load `{url}`")]
	#[diagnostic(code(codebundle::load))]
	Load {
		url: String,
		#[source]
		source: SharedError,
	},

	#[error("failed to parse `{file}`")]
	#[diagnostic(code(codebundle::parse))]
	Parse {
		file: String,
		#[source]
		source: SharedError,
	},

	#[error("source transformer failed for `{file}`")]
	#[diagnostic(code(codebundle::transform))]
	Transform {
		file: String,
		#[source]
		source: SharedError,
	},

	#[error("source enhancer failed for `{file}`")]
	#[diagnostic(code(codebundle::enhance))]
	Enhance {
		file: String,
		#[source]
		source: SharedError,
	},

	#[error("failed to load variant metadata for `{variant}` from `{url}`")]
	#[diagnostic(code(codebundle::variant_meta))]
	VariantMeta {
		variant: String,
		url: String,
		#[source]
		source: SharedError,
	},

	#[error("failed to load code metadata from `{url}`")]
	#[diagnostic(code(codebundle::code_meta))]
	CodeMeta {
		url: String,
		#[source]
		source: SharedError,
	},

	#[error("file `{file}` not found in variant `{variant}`")]
	#[diagnostic(code(codebundle::file_not_found))]
	FileNotFound { file: String, variant: String },

	#[error("variant `{variant}` not found")]
	#[diagnostic(code(codebundle::variant_not_found))]
	VariantNotFound { variant: String },

	#[error("delta does not apply to its baseline: {0}")]
	#[diagnostic(code(codebundle::delta_mismatch))]
	DeltaMismatch(String),

	#[error("unknown transform: `{name}`")]
	#[diagnostic(code(codebundle::unknown_transform))]
	UnknownTransform { name: String },

	#[error("failed to encode or decode a serialized tree: {0}")]
	#[diagnostic(code(codebundle::encoding))]
	Encoding(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(codebundle::config_parse),
		help("check that codebundle.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("failed to read `{path}`: {reason}")]
	#[diagnostic(code(codebundle::read_file))]
	ReadFile { path: String, reason: String },

	#[error("variant `{variant}`, file `{file}`{}", display_url(.url))]
	#[diagnostic(code(codebundle::file))]
	File {
		variant: String,
		file: String,
		url: Option<String>,
		#[source]
		source: Box<BundleError>,
	},
}

impl BundleError {
	/// Attach the variant, file and url that were being processed. Errors
	/// that already carry a location are returned unchanged so the innermost
	/// location is the one reported.
	pub fn in_file(self, variant: &str, file: &str, url: Option<&str>) -> Self {
		match self {
			Self::File { .. } => self,
			other => {
				Self::File {
					variant: variant.to_string(),
					file: file.to_string(),
					url: url.map(ToString::to_string),
					source: Box::new(other),
				}
			}
		}
	}

	/// The error with any location context removed.
	pub fn root(&self) -> &Self {
		match self {
			Self::File { source, .. } => source.root(),
			other => other,
		}
	}
}

fn display_url(url: &Option<String>) -> String {
	url.as_deref().map(|url| format!(" ({url})")).unwrap_or_default()
}

pub type BundleResult<T> = Result<T, BundleError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
