use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::Externals;
use crate::LineDelta;
use crate::TreeDelta;
use crate::VariantSource;

/// Extra files keyed by their path relative to the file that declares them.
pub type ExtraFiles = BTreeMap<String, ExtraFile>;

/// Named transforms of a single file.
pub type Transforms = BTreeMap<String, Transform>;

/// A sample: every known variant keyed by name.
pub type Code = BTreeMap<String, VariantInput>;

/// Line keyed comment metadata reported by a loader and consumed by
/// [`SourceEnhancer`](crate::SourceEnhancer)s.
pub type SourceComments = BTreeMap<u32, Vec<String>>;

/// One named rendition of a documentation code sample.
///
/// The same record is used for the caller's input and for the packaged
/// output, which is why every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<VariantSource>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transforms: Option<Transforms>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub extra_files: Option<ExtraFiles>,
	/// Names of the external modules imported anywhere in the variant. Only
	/// set on packaged output.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub externals: Option<Vec<String>>,
	/// The caller promises `extra_files` already lists every file.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub all_files_listed: bool,
	/// Directory segments the sample files live under, e.g. `src/`.
	/// Metadata files are placed above it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata_prefix: Option<String>,
}

impl Variant {
	/// A variant with inline source and a file name.
	pub fn inline(file_name: impl Into<String>, source: impl Into<VariantSource>) -> Self {
		Self {
			file_name: Some(file_name.into()),
			source: Some(source.into()),
			..Self::default()
		}
	}

	/// A variant loaded from `url`.
	pub fn from_url(url: impl Into<String>) -> Self {
		Self {
			url: Some(url.into()),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_extra_file(mut self, key: impl Into<String>, file: impl Into<ExtraFile>) -> Self {
		self.extra_files
			.get_or_insert_with(ExtraFiles::new)
			.insert(key.into(), file.into());
		self
	}

	/// The source of the main file or of the named extra file.
	pub fn file_source(&self, file_name: &str) -> Option<&VariantSource> {
		if self.file_name.as_deref() == Some(file_name) {
			return self.source.as_ref();
		}

		match self.extra_files.as_ref()?.get(file_name)? {
			ExtraFile::Url(_) => None,
			ExtraFile::Inline(content) => content.source.as_ref(),
		}
	}

	/// The main file name followed by every extra file key.
	pub fn file_names(&self) -> Vec<String> {
		self.file_name
			.iter()
			.cloned()
			.chain(self.extra_files.iter().flat_map(|files| files.keys().cloned()))
			.collect()
	}
}

/// An extra file is either a url still to be loaded or inline content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraFile {
	Url(String),
	Inline(ExtraFileContent),
}

impl ExtraFile {
	pub fn is_metadata(&self) -> bool {
		match self {
			Self::Url(_) => false,
			Self::Inline(content) => content.metadata,
		}
	}

	/// Mark the file as injected rather than part of the sample itself.
	#[must_use]
	pub fn into_metadata(self) -> Self {
		let mut content = match self {
			Self::Url(url) => {
				ExtraFileContent {
					url: Some(url),
					..ExtraFileContent::default()
				}
			}
			Self::Inline(content) => content,
		};
		content.metadata = true;
		Self::Inline(content)
	}

	pub fn source(&self) -> Option<&VariantSource> {
		match self {
			Self::Url(_) => None,
			Self::Inline(content) => content.source.as_ref(),
		}
	}
}

impl From<&str> for ExtraFile {
	fn from(url: &str) -> Self {
		Self::Url(url.to_string())
	}
}

impl From<String> for ExtraFile {
	fn from(url: String) -> Self {
		Self::Url(url)
	}
}

impl From<ExtraFileContent> for ExtraFile {
	fn from(content: ExtraFileContent) -> Self {
		Self::Inline(content)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraFileContent {
	/// Where to load the file from when `source` is absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<VariantSource>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transforms: Option<Transforms>,
	/// Injected or generated rather than a primary sample file.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub metadata: bool,
}

impl ExtraFileContent {
	pub fn with_source(source: impl Into<VariantSource>) -> Self {
		Self {
			source: Some(source.into()),
			..Self::default()
		}
	}
}

/// A named alternate rendition of a file stored as a delta against the
/// file's baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
	pub delta: Delta,
	/// File name of the transformed rendition, e.g. `index.js` for an
	/// `index.ts` baseline.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "delta", rename_all = "camelCase")]
pub enum Delta {
	/// Against the raw text baseline.
	Lines(LineDelta),
	/// Against the parsed tree baseline.
	Tree(TreeDelta),
}

/// The output of a [`SourceTransformer`](crate::SourceTransformer) for one
/// transform name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedSource {
	pub source: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_name: Option<String>,
}

/// What a [`SourceLoader`](crate::SourceLoader) returns for one url.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLoad {
	pub source: String,
	/// Further files this file depends on, keyed relative to it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub extra_files: Option<ExtraFiles>,
	/// Absolute urls consulted while producing `source`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub extra_dependencies: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub externals: Option<Externals>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub comments: Option<SourceComments>,
}

impl SourceLoad {
	pub fn new(source: impl Into<String>) -> Self {
		Self {
			source: source.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_extra_file(mut self, key: impl Into<String>, file: impl Into<ExtraFile>) -> Self {
		self.extra_files
			.get_or_insert_with(ExtraFiles::new)
			.insert(key.into(), file.into());
		self
	}
}

/// A variant as supplied by a caller: either complete metadata or a url to
/// resolve into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantInput {
	Url(String),
	Variant(Box<Variant>),
}

impl From<Variant> for VariantInput {
	fn from(variant: Variant) -> Self {
		Self::Variant(Box::new(variant))
	}
}

impl From<&str> for VariantInput {
	fn from(url: &str) -> Self {
		Self::Url(url.to_string())
	}
}

/// The packaged result of resolving one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVariant {
	pub variant: Variant,
	/// Every absolute url consulted, main file first.
	pub dependencies: Vec<String>,
	/// The full externals map. The packaged variant only keeps its keys.
	pub externals: Externals,
}

/// A source of shared files injected into variants.
#[derive(Debug, Clone)]
pub enum GlobalsCode {
	Url(String),
	Variant(Box<Variant>),
	/// Already run through the pipeline; injected as is.
	Resolved(Box<ResolvedVariant>),
}

impl From<&str> for GlobalsCode {
	fn from(url: &str) -> Self {
		Self::Url(url.to_string())
	}
}

impl From<Variant> for GlobalsCode {
	fn from(variant: Variant) -> Self {
		Self::Variant(Box::new(variant))
	}
}
