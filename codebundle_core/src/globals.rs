use std::collections::BTreeSet;

use futures::future::try_join_all;

use crate::BundleResult;
use crate::ExtraFiles;
use crate::Externals;
use crate::GlobalsCode;
use crate::LoadOptions;
use crate::LoadSourceCache;
use crate::ResolvedVariant;
use crate::VariantInput;
use crate::path::directory_of;
use crate::path::metadata_back_path;
use crate::path::split_extension;
use crate::variant::resolve_variant;

/// Dependencies and externals contributed by injected globals.
#[derive(Debug, Default)]
pub(crate) struct InjectedGlobals {
	pub dependencies: Vec<String>,
	pub externals: Externals,
}

/// Resolve every globals source of `options`. Globals of globals are not
/// followed.
pub(crate) async fn resolve_globals_sources(
	options: &LoadOptions,
	cache: &LoadSourceCache,
	variant_name: &str,
) -> BundleResult<Vec<ResolvedVariant>> {
	let nested = LoadOptions {
		globals_code: Vec::new(),
		..options.clone()
	};
	let sources = options
		.globals_code
		.iter()
		.map(|globals| resolve_globals(&nested, cache, variant_name, globals));

	try_join_all(sources).await
}

/// Merge the extra files of every resolved globals source into
/// `extra_files` as metadata. `extra_files` must already hold every file
/// of the sample; injected files whose key is taken are renamed. The
/// globals entry files themselves are never injected.
pub(crate) fn inject_globals(
	resolved: Vec<ResolvedVariant>,
	metadata_prefix: Option<&str>,
	extra_files: &mut ExtraFiles,
) -> InjectedGlobals {
	let back_path = metadata_back_path(metadata_prefix);
	let mut used: BTreeSet<String> = extra_files.keys().cloned().collect();
	let mut injected = InjectedGlobals::default();

	for globals in resolved {
		for (key, file) in globals.variant.extra_files.into_iter().flatten() {
			let key = format!("{back_path}{key}");
			let name = unique_global_name(&key, &used);
			if name != key {
				tracing::debug!(key, name, "renamed colliding globals file");
			}
			used.insert(name.clone());
			extra_files.insert(name, file.into_metadata());
		}

		injected.dependencies.extend(globals.dependencies);
		injected.externals.extend_from(&globals.externals);
	}

	injected
}

async fn resolve_globals(
	options: &LoadOptions,
	cache: &LoadSourceCache,
	variant_name: &str,
	globals: &GlobalsCode,
) -> BundleResult<ResolvedVariant> {
	let input = match globals {
		GlobalsCode::Resolved(resolved) => return Ok(resolved.as_ref().clone()),
		GlobalsCode::Url(url) => VariantInput::Url(url.clone()),
		GlobalsCode::Variant(variant) => VariantInput::Variant(variant.clone()),
	};

	resolve_variant(options, cache, variant_name, input).await
}

/// A key for an injected file that does not collide with `used`.
///
/// The key itself is kept when free, then the file name gets a `global_`
/// prefix, then `_1`, `_2`, … is appended to the prefixed stem, so
/// `theme.css` next to `theme.css` and `global_theme.css` becomes
/// `global_theme_1.css`.
pub(crate) fn unique_global_name(key: &str, used: &BTreeSet<String>) -> String {
	if !used.contains(key) {
		return key.to_string();
	}

	let directory = directory_of(key);
	let name = &key[directory.len()..];
	let prefixed = format!("{directory}global_{name}");
	if !used.contains(&prefixed) {
		return prefixed;
	}

	let (stem, extension) = split_extension(name);
	let mut counter = 1_usize;
	loop {
		let candidate = match extension {
			Some(extension) => format!("{directory}global_{stem}_{counter}.{extension}"),
			None => format!("{directory}global_{stem}_{counter}"),
		};
		if !used.contains(&candidate) {
			return candidate;
		}
		counter += 1;
	}
}
