use async_trait::async_trait;
use codebundle_core::BoxError;
use codebundle_core::SourceParser;
use codebundle_core::Tree;
use codebundle_core::path::extension_of;
use serde_json::Value;
use serde_json::json;

/// Parses a source into one `span.line` element per line, each holding the
/// line's text. Enough structure for line highlighting without a grammar
/// for every language.
pub struct LineParser;

#[async_trait]
impl SourceParser for LineParser {
	async fn parse_source(
		&self,
		text: &str,
		file_name: &str,
		language: Option<&str>,
	) -> Result<Tree, BoxError> {
		let language = language
			.map(ToString::to_string)
			.or_else(|| extension_of(file_name));

		Ok(line_tree(text, language.as_deref()))
	}
}

fn line_tree(text: &str, language: Option<&str>) -> Tree {
	let children: Vec<Value> = text
		.split_inclusive('\n')
		.enumerate()
		.map(|(index, line)| {
			json!({
				"type": "element",
				"tagName": "span",
				"properties": { "className": ["line"], "dataLn": index + 1 },
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
