use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;

use crate::BoxError;
use crate::Code;
use crate::CodeMetaLoader;
use crate::SourceComments;
use crate::SourceEnhancer;
use crate::SourceLoad;
use crate::SourceLoader;
use crate::SourceParser;
use crate::SourceTransformer;
use crate::TransformedSource;
use crate::Tree;
use crate::Variant;
use crate::VariantMetaLoader;

/// Serves sources from memory and counts how often each url is requested.
#[derive(Default)]
pub struct MemoryLoader {
	files: HashMap<String, SourceLoad>,
	calls: Mutex<HashMap<String, usize>>,
}

impl MemoryLoader {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_file(mut self, url: &str, load: SourceLoad) -> Self {
		self.files.insert(url.to_string(), load);
		self
	}

	pub fn calls(&self, url: &str) -> usize {
		self.calls
			.lock()
			.unwrap()
			.get(url)
			.copied()
			.unwrap_or_default()
	}

	pub fn total_calls(&self) -> usize {
		self.calls.lock().unwrap().values().sum()
	}
}

#[async_trait]
impl SourceLoader for MemoryLoader {
	async fn load_source(&self, url: &str) -> Result<SourceLoad, BoxError> {
		*self
			.calls
			.lock()
			.unwrap()
			.entry(url.to_string())
			.or_default() += 1;

		// Give sibling loads the chance to race for the same url.
		tokio::task::yield_now().await;

		self.files
			.get(url)
			.cloned()
			.ok_or_else(|| format!("no such file: {url}").into())
	}
}

/// Builds one `span.line` element per source line.
pub struct LineParser;

#[async_trait]
impl SourceParser for LineParser {
	async fn parse_source(
		&self,
		text: &str,
		_file_name: &str,
		language: Option<&str>,
	) -> Result<Tree, BoxError> {
		Ok(line_tree(text, language))
	}
}

pub fn line_tree(text: &str, language: Option<&str>) -> Tree {
	let children: Vec<Value> = text
		.split_inclusive('\n')
		.map(|line| {
			json!({
				"type": "element",
				"tagName": "span",
				"properties": { "className": ["line"] },
				"children": [{ "type": "text", "value": line }],
			})
		})
		.collect();

	let mut root = json!({ "type": "root", "children": children });
	if let Some(language) = language {
		root["data"] = json!({ "language": language });
	}

	Tree::new(root)
}

/// Rejects every input.
pub struct FailingParser;

#[async_trait]
impl SourceParser for FailingParser {
	async fn parse_source(
		&self,
		_text: &str,
		file_name: &str,
		_language: Option<&str>,
	) -> Result<Tree, BoxError> {
		Err(format!("unexpected token in {file_name}").into())
	}
}

/// Produces a `js` rendition of TypeScript by dropping `: number`
/// annotations.
pub struct StripTypes;

#[async_trait]
impl SourceTransformer for StripTypes {
	async fn transform(
		&self,
		text: &str,
		file_name: &str,
	) -> Result<BTreeMap<String, TransformedSource>, BoxError> {
		let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
		let transformed = TransformedSource {
			source: text.replace(": number", ""),
			file_name: Some(format!("{stem}.js")),
		};

		Ok(BTreeMap::from([("js".to_string(), transformed)]))
	}
}

/// Marks every tree it sees and records the comments it was given.
#[derive(Default)]
pub struct RecordingEnhancer {
	pub seen: Mutex<Vec<(String, Option<SourceComments>)>>,
}

#[async_trait]
impl SourceEnhancer for RecordingEnhancer {
	async fn enhance(
		&self,
		mut tree: Tree,
		comments: Option<&SourceComments>,
		file_name: &str,
	) -> Result<Tree, BoxError> {
		self.seen
			.lock()
			.unwrap()
			.push((file_name.to_string(), comments.cloned()));
		tree["enhanced"] = Value::Bool(true);

		Ok(tree)
	}
}

/// Returns the same metadata for every url.
pub struct StaticVariantMeta(pub Variant);

#[async_trait]
impl VariantMetaLoader for StaticVariantMeta {
	async fn load_variant_meta(&self, _variant_name: &str, _url: &str) -> Result<Variant, BoxError> {
		Ok(self.0.clone())
	}
}

pub struct StaticCodeMeta(pub Code);

#[async_trait]
impl CodeMetaLoader for StaticCodeMeta {
	async fn load_code_meta(&self, _url: &str) -> Result<Code, BoxError> {
		Ok(self.0.clone())
	}
}
