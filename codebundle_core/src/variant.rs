use std::collections::BTreeSet;
use std::collections::HashSet;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::BundleError;
use crate::BundleResult;
use crate::ExtraFiles;
use crate::Externals;
use crate::LoadOptions;
use crate::LoadSourceCache;
use crate::ResolvedVariant;
use crate::Variant;
use crate::VariantInput;
use crate::VariantSource;
use crate::extra_files::Level;
use crate::extra_files::resolve_extra_files;
use crate::globals::inject_globals;
use crate::globals::resolve_globals_sources;
use crate::loader::FileRequest;
use crate::loader::ResolveContext;
use crate::loader::load_file;
use crate::merge_externals;
use crate::path::file_name_from_url;
use crate::path::is_absolute_key;
use crate::path::normalize_path;

/// Stages of a single variant resolution, reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Init,
	MainFileLoaded,
	GlobalsResolved,
	ExtraFilesResolved,
	Done,
	/// Terminal state of a resolution that returned an error.
	Failed,
}

/// Resolve one named variant into its packaged form: the main file loaded
/// and parsed, every extra file flattened to entry relative keys, globals
/// injected and externals merged.
///
/// Loads are deduplicated by url for the duration of this call only.
#[tracing::instrument(skip(input, options))]
pub async fn load_variant(
	variant_name: &str,
	input: impl Into<VariantInput>,
	options: &LoadOptions,
) -> BundleResult<ResolvedVariant> {
	let cache = LoadSourceCache::new();
	resolve_variant(options, &cache, variant_name, input.into()).await
}

/// Resolve a variant using a load cache that outlives it. Used by the
/// globals injector and the fallback orchestrator.
pub(crate) fn resolve_variant<'a>(
	options: &'a LoadOptions,
	cache: &'a LoadSourceCache,
	variant_name: &'a str,
	input: VariantInput,
) -> BoxFuture<'a, BundleResult<ResolvedVariant>> {
	async move {
		resolve_variant_stages(options, cache, variant_name, input)
			.await
			.inspect_err(|error| {
				tracing::debug!(variant = variant_name, stage = ?Stage::Failed, %error);
			})
	}
	.boxed()
}

async fn resolve_variant_stages(
	options: &LoadOptions,
	cache: &LoadSourceCache,
	variant_name: &str,
	input: VariantInput,
) -> BundleResult<ResolvedVariant> {
	tracing::debug!(variant = variant_name, stage = ?Stage::Init);
	let mut variant = variant_metadata(options, variant_name, input).await?;

	let (Some(file_name), url) = (variant.file_name.clone(), variant.url.clone()) else {
		// Nothing to load. Raw text still gets the minimal tree wrapper.
		variant.source = variant.source.map(VariantSource::normalized);
		tracing::debug!(variant = variant_name, stage = ?Stage::Done);
		return Ok(ResolvedVariant {
			variant,
			dependencies: Vec::new(),
			externals: Externals::new(),
		});
	};

	let declared = variant.extra_files.clone().unwrap_or_default();
	let ctx = ResolveContext {
		options,
		cache,
		variant_name,
		all_files_listed: variant.all_files_listed,
		declared_keys: declared
			.keys()
			.map(String::as_str)
			.map(normalize_path)
			.collect(),
	};

	let main = load_file(&ctx, FileRequest {
		key: &file_name,
		url: url.as_deref(),
		source: variant.source.as_ref(),
		transforms: variant.transforms.as_ref(),
		language: variant.language.as_deref(),
	})
	.await?;
	tracing::debug!(variant = variant_name, stage = ?Stage::MainFileLoaded);

	if let Some(key) = declared.keys().find(|key| is_absolute_key(key)) {
		return Err(BundleError::AbsoluteExtraFileKey { key: key.clone() }.in_file(
			variant_name,
			&file_name,
			url.as_deref(),
		));
	}

	let mut pending: ExtraFiles = declared;
	for (key, file) in main.extra_files.into_iter().flatten() {
		pending.entry(key).or_insert(file);
	}

	let globals_sources = if options.globals_code.is_empty() {
		None
	} else {
		let sources = resolve_globals_sources(options, cache, variant_name).await?;
		tracing::debug!(variant = variant_name, stage = ?Stage::GlobalsResolved);
		Some(sources)
	};

	let mut resolved = resolve_extra_files(&ctx, pending, Level {
		base_url: url.clone(),
		declaring_key: file_name.clone(),
		remaining_depth: options.max_depth,
		visited: url.iter().cloned().collect::<HashSet<_>>(),
	})
	.await?;
	tracing::debug!(
		variant = variant_name,
		stage = ?Stage::ExtraFilesResolved,
		files = resolved.extra_files.len(),
	);

	// Injected last so globals are renamed against every sample file,
	// including the ones discovered while recursing.
	let globals = globals_sources.map(|sources| {
		inject_globals(
			sources,
			variant.metadata_prefix.as_deref(),
			&mut resolved.extra_files,
		)
	});

	let externals = merge_externals(
		[
			Some(&main.externals),
			globals.as_ref().map(|g| &g.externals),
			Some(&resolved.externals),
		]
		.into_iter()
		.flatten(),
	);
	let dependencies = dedupe(
		url.iter()
			.cloned()
			.chain(main.dependencies)
			.chain(globals.into_iter().flat_map(|g| g.dependencies))
			.chain(resolved.dependencies),
	);

	variant.source = Some(main.source);
	variant.transforms = main.transforms;
	variant.extra_files = (!resolved.extra_files.is_empty()).then_some(resolved.extra_files);
	variant.externals = (!externals.is_empty()).then(|| externals.module_names());

	tracing::debug!(variant = variant_name, stage = ?Stage::Done);
	Ok(ResolvedVariant {
		variant,
		dependencies,
		externals,
	})
}

/// Turn the caller's input into variant metadata, asking the
/// [`VariantMetaLoader`](crate::VariantMetaLoader) for bare urls when one is
/// configured.
async fn variant_metadata(
	options: &LoadOptions,
	variant_name: &str,
	input: VariantInput,
) -> BundleResult<Variant> {
	let mut variant = match (input, &options.variant_meta_loader) {
		(VariantInput::Variant(variant), _) => *variant,
		(VariantInput::Url(url), Some(meta_loader)) => {
			let mut variant = meta_loader
				.load_variant_meta(variant_name, &url)
				.await
				.map_err(|e| {
					BundleError::VariantMeta {
						variant: variant_name.to_string(),
						url: url.clone(),
						source: e.into(),
					}
				})?;
			if variant.url.is_none() {
				variant.url = Some(url);
			}
			variant
		}
		(VariantInput::Url(url), None) => Variant::from_url(url),
	};

	if variant.file_name.is_none() {
		variant.file_name = variant
			.url
			.as_deref()
			.map(|url| {
				file_name_from_url(url).ok_or_else(|| {
					BundleError::MissingFileName {
						url: url.to_string(),
					}
				})
			})
			.transpose()?;
	}

	Ok(variant)
}

fn dedupe(items: impl IntoIterator<Item = String>) -> Vec<String> {
	let mut seen = BTreeSet::new();
	items
		.into_iter()
		.filter(|item| seen.insert(item.clone()))
		.collect()
}
