use std::collections::BTreeMap;

use crate::BundleError;
use crate::BundleResult;
use crate::Delta;
use crate::LineDelta;
use crate::LoadOptions;
use crate::SourceComments;
use crate::Transform;
use crate::TransformedSource;
use crate::Transforms;
use crate::Tree;
use crate::TreeDelta;
use crate::VariantSource;

/// Run every transformer registered for the file's extension. When several
/// transformers produce the same name the first registered one wins.
pub(crate) async fn run_transformers(
	options: &LoadOptions,
	text: &str,
	file_name: &str,
) -> BundleResult<BTreeMap<String, TransformedSource>> {
	let mut transformed = BTreeMap::new();

	for registered in options.transformers_for(file_name) {
		let output = registered
			.transformer
			.transform(text, file_name)
			.await
			.map_err(|e| {
				BundleError::Transform {
					file: file_name.to_string(),
					source: e.into(),
				}
			})?;

		for (name, source) in output {
			transformed.entry(name).or_insert(source);
		}
	}

	Ok(transformed)
}

/// Line deltas of each transformed text against the raw baseline.
pub(crate) fn line_transforms(
	baseline: &str,
	transformed: &BTreeMap<String, TransformedSource>,
) -> Transforms {
	transformed
		.iter()
		.map(|(name, output)| {
			let transform = Transform {
				delta: Delta::Lines(LineDelta::compute(baseline, &output.source)),
				file_name: output.file_name.clone(),
			};
			(name.clone(), transform)
		})
		.collect()
}

/// Parse `text` and run every enhancer over the result.
pub(crate) async fn parse_text(
	options: &LoadOptions,
	text: &str,
	file_name: &str,
	language: Option<&str>,
	comments: Option<&SourceComments>,
) -> BundleResult<Tree> {
	let parser = options
		.parser
		.as_ref()
		.ok_or_else(|| BundleError::MissingParser {
			file: file_name.to_string(),
		})?;

	let mut tree = parser
		.parse_source(text, file_name, language)
		.await
		.map_err(|e| {
			BundleError::Parse {
				file: file_name.to_string(),
				source: e.into(),
			}
		})?;

	for enhancer in &options.enhancers {
		tree = enhancer
			.enhance(tree, comments, file_name)
			.await
			.map_err(|e| {
				BundleError::Enhance {
					file: file_name.to_string(),
					source: e.into(),
				}
			})?;
	}

	Ok(tree)
}

/// Turn line deltas into tree deltas against a freshly parsed baseline by
/// replaying each one on the raw text, parsing the result and diffing the
/// trees. Tree deltas are kept as they are.
pub(crate) async fn retarget_transforms(
	options: &LoadOptions,
	baseline_text: &str,
	baseline_tree: &Tree,
	transforms: Transforms,
	file_name: &str,
	language: Option<&str>,
) -> BundleResult<Transforms> {
	let mut retargeted = Transforms::new();

	for (name, transform) in transforms {
		let Delta::Lines(delta) = &transform.delta else {
			retargeted.insert(name, transform);
			continue;
		};

		let text = delta.apply(baseline_text)?;
		let parse_name = transform.file_name.as_deref().unwrap_or(file_name);
		let tree = parse_text(options, &text, parse_name, language, None).await?;
		let delta = TreeDelta::compute(baseline_tree, &tree)
			.unwrap_or_else(|| TreeDelta::identity(baseline_tree));

		retargeted.insert(name, Transform {
			delta: Delta::Tree(delta),
			file_name: transform.file_name,
		});
	}

	Ok(retargeted)
}

/// Replay the named transform on `source`, producing the alternate
/// rendition. Serialized sources are decoded first.
pub fn apply_transform(
	source: &VariantSource,
	transforms: &Transforms,
	name: &str,
) -> BundleResult<VariantSource> {
	let transform = transforms
		.get(name)
		.ok_or_else(|| BundleError::UnknownTransform {
			name: name.to_string(),
		})?;

	match (&transform.delta, source) {
		(Delta::Lines(delta), VariantSource::Text(text)) => delta.apply(text).map(VariantSource::Text),
		(Delta::Lines(_), _) => {
			Err(BundleError::DeltaMismatch(
				"line delta applied to a parsed source".to_string(),
			))
		}
		(Delta::Tree(_), VariantSource::Text(_)) => {
			Err(BundleError::DeltaMismatch(
				"tree delta applied to raw text".to_string(),
			))
		}
		(Delta::Tree(delta), parsed) => {
			let tree = parsed.to_tree()?.ok_or_else(|| {
				BundleError::DeltaMismatch("tree delta applied to raw text".to_string())
			})?;
			let value = delta.apply(&tree)?;
			Ok(VariantSource::Tree(Tree::new(value)))
		}
	}
}
