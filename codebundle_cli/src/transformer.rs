use std::collections::BTreeMap;

use async_trait::async_trait;
use codebundle_core::BoxError;
use codebundle_core::SourceTransformer;
use codebundle_core::TransformedSource;
use codebundle_core::path::split_extension;
use regex::Regex;

/// Name of the transform produced by [`StripTypes`].
pub const JS_TRANSFORM: &str = "js";

/// File extensions [`StripTypes`] is registered for.
pub const TYPESCRIPT_EXTENSIONS: [&str; 2] = ["ts", "tsx"];

/// A `js` rendition of a TypeScript file with type-only syntax removed:
/// `import type` statements, `type` aliases that fit on one line and
/// annotations naming a simple type.
///
/// This is not a TypeScript compiler. Generics, interfaces and multi-line
/// types survive unchanged.
pub struct StripTypes {
	type_import: Regex,
	type_alias: Regex,
	annotation: Regex,
}

impl StripTypes {
	pub fn new() -> Result<Self, regex::Error> {
		Ok(Self {
			type_import: Regex::new(r#"(?m)^\s*import\s+type\s[^;]*;?[ \t]*\r?\n"#)?,
			type_alias: Regex::new(r"(?m)^\s*(?:export\s+)?type\s+\w+\s*=[^;\n]*;?[ \t]*\r?\n")?,
			annotation: Regex::new(
				r"\s*:\s*(?:string|number|boolean|void|unknown|any|null|undefined|[A-Z]\w*)(?:\[\])?(\s*[,)=;{])",
			)?,
		})
	}

	pub fn strip(&self, text: &str) -> String {
		let text = self.type_import.replace_all(text, "");
		let text = self.type_alias.replace_all(&text, "");
		self.annotation.replace_all(&text, "$1").into_owned()
	}
}

#[async_trait]
impl SourceTransformer for StripTypes {
	async fn transform(
		&self,
		text: &str,
		file_name: &str,
	) -> Result<BTreeMap<String, TransformedSource>, BoxError> {
		let (stem, extension) = split_extension(file_name);
		let extension = if extension == Some("tsx") { "jsx" } else { "js" };
		let transformed = TransformedSource {
			source: self.strip(text),
			file_name: Some(format!("{stem}.{extension}")),
		};

		Ok(BTreeMap::from([(JS_TRANSFORM.to_string(), transformed)]))
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use similar_asserts::assert_eq;

	use super::*;

	#[rstest]
	#[case::parameters(
		"function add(a: number, b: number): number {\n",
		"function add(a, b) {\n"
	)]
	#[case::variables("const name: string = 'x';\n", "const name = 'x';\n")]
	#[case::arrays("let ids: number[] = [];\n", "let ids = [];\n")]
	#[case::type_imports("import type { Props } from './types';\nimport a from 'a';\n", "import a from 'a';\n")]
	#[case::aliases("export type Id = string;\nconst id = 1;\n", "const id = 1;\n")]
	#[case::object_literals("const point = { x: 1, y: 2 };\n", "const point = { x: 1, y: 2 };\n")]
	fn strips_type_syntax(#[case] input: &str, #[case] expected: &str) {
		let strip = StripTypes::new().unwrap();

		assert_eq!(strip.strip(input), expected);
	}

	#[tokio::test]
	async fn renames_the_file() -> Result<(), BoxError> {
		let renditions = StripTypes::new()?.transform("let a: number = 1;\n", "Demo.tsx").await?;

		let js = &renditions[JS_TRANSFORM];
		assert_eq!(js.source, "let a = 1;\n");
		assert_eq!(js.file_name.as_deref(), Some("Demo.jsx"));
		Ok(())
	}
}
