use std::io::Read;
use std::io::Write;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use derive_more::Deref;
use derive_more::DerefMut;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::BundleError;
use crate::BundleResult;

/// A parsed source document in [hast](https://github.com/syntax-tree/hast)
/// shape: nested JSON objects with a `type`, optional `children` and, for
/// text nodes, a `value`.
///
/// The engine never interprets the tree beyond diffing it, so any JSON
/// produced by a [`SourceParser`](crate::SourceParser) is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Deref, DerefMut)]
#[serde(transparent)]
pub struct Tree(Value);

impl Tree {
	pub fn new(value: Value) -> Self {
		Self(value)
	}

	/// A root node wrapping the raw text in a single text node. Used for
	/// files that were never parsed but still need to look like pipeline
	/// output.
	pub fn from_text(text: &str) -> Self {
		Self(json!({
			"type": "root",
			"children": [{ "type": "text", "value": text }],
		}))
	}

	pub fn into_value(self) -> Value {
		self.0
	}

	/// Concatenated `value` of every text node, in document order.
	pub fn text_content(&self) -> String {
		let mut text = String::new();
		collect_text(&self.0, &mut text);
		text
	}

	/// Compact JSON encoding of the tree.
	pub fn to_json(&self) -> String {
		self.0.to_string()
	}

	pub fn from_json(json: &str) -> BundleResult<Self> {
		serde_json::from_str(json)
			.map(Self)
			.map_err(|e| BundleError::Encoding(e.to_string()))
	}

	/// Gzip-compressed compact JSON, base64 encoded.
	pub fn to_gzip(&self) -> BundleResult<String> {
		let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
		encoder
			.write_all(self.to_json().as_bytes())
			.map_err(|e| BundleError::Encoding(e.to_string()))?;
		let bytes = encoder
			.finish()
			.map_err(|e| BundleError::Encoding(e.to_string()))?;

		Ok(STANDARD.encode(bytes))
	}

	pub fn from_gzip(encoded: &str) -> BundleResult<Self> {
		let bytes = STANDARD
			.decode(encoded)
			.map_err(|e| BundleError::Encoding(e.to_string()))?;
		let mut json = String::new();
		GzDecoder::new(bytes.as_slice())
			.read_to_string(&mut json)
			.map_err(|e| BundleError::Encoding(e.to_string()))?;

		Self::from_json(&json)
	}
}

fn collect_text(node: &Value, text: &mut String) {
	if node.get("type").and_then(Value::as_str) == Some("text") {
		if let Some(value) = node.get("value").and_then(Value::as_str) {
			text.push_str(value);
		}
	}

	if let Some(children) = node.get("children").and_then(Value::as_array) {
		for child in children {
			collect_text(child, text);
		}
	}
}

/// A tree stored in a transport encoding rather than as live JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SerializedTree {
	/// Compact JSON text.
	HastJson(String),
	/// Gzip-compressed JSON, base64 encoded.
	HastGzip(String),
}

impl SerializedTree {
	pub fn decode(&self) -> BundleResult<Tree> {
		match self {
			Self::HastJson(json) => Tree::from_json(json),
			Self::HastGzip(encoded) => Tree::from_gzip(encoded),
		}
	}
}

/// The content of a file as it moves through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantSource {
	/// Raw, unparsed text.
	Text(String),
	/// A parsed tree in a transport encoding.
	Serialized(SerializedTree),
	/// A parsed tree.
	Tree(Tree),
}

impl VariantSource {
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(text) => Some(text),
			_ => None,
		}
	}

	pub fn is_text(&self) -> bool {
		matches!(self, Self::Text(_))
	}

	/// Decode the source into a tree. Raw text is not parsed and returns
	/// `None`.
	pub fn to_tree(&self) -> BundleResult<Option<Tree>> {
		match self {
			Self::Text(_) => Ok(None),
			Self::Serialized(serialized) => serialized.decode().map(Some),
			Self::Tree(tree) => Ok(Some(tree.clone())),
		}
	}

	/// The plain text of the source, reading text nodes out of trees.
	pub fn text_content(&self) -> BundleResult<String> {
		match self {
			Self::Text(text) => Ok(text.clone()),
			Self::Serialized(serialized) => Ok(serialized.decode()?.text_content()),
			Self::Tree(tree) => Ok(tree.text_content()),
		}
	}

	/// Wrap raw text in a minimal tree; parsed sources pass through.
	pub fn normalized(self) -> Self {
		match self {
			Self::Text(text) => Self::Tree(Tree::from_text(&text)),
			other => other,
		}
	}
}

impl From<&str> for VariantSource {
	fn from(text: &str) -> Self {
		Self::Text(text.to_string())
	}
}

impl From<String> for VariantSource {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}

impl From<Tree> for VariantSource {
	fn from(tree: Tree) -> Self {
		Self::Tree(tree)
	}
}

/// How parsed trees are stored in the packaged output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputMode {
	/// Keep the live tree.
	#[default]
	Tree,
	/// Serialize the tree to JSON text.
	HastJson,
	/// Serialize and gzip the tree.
	HastGzip,
}

impl OutputMode {
	/// Re-encode a parsed source for output. Text and already serialized
	/// sources are returned unchanged.
	pub fn encode(self, source: VariantSource) -> BundleResult<VariantSource> {
		let VariantSource::Tree(tree) = source else {
			return Ok(source);
		};

		match self {
			Self::Tree => Ok(VariantSource::Tree(tree)),
			Self::HastJson => {
				Ok(VariantSource::Serialized(SerializedTree::HastJson(
					tree.to_json(),
				)))
			}
			Self::HastGzip => {
				Ok(VariantSource::Serialized(SerializedTree::HastGzip(
					tree.to_gzip()?,
				)))
			}
		}
	}
}
