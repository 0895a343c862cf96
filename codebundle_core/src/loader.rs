use std::collections::BTreeSet;

use crate::BundleError;
use crate::BundleResult;
use crate::ExtraFile;
use crate::ExtraFiles;
use crate::Externals;
use crate::LoadOptions;
use crate::LoadSourceCache;
use crate::Mode;
use crate::SourceComments;
use crate::Transforms;
use crate::VariantSource;
use crate::path::is_absolute_key;
use crate::path::is_absolute_url;
use crate::path::rebase_key;
use crate::transform::line_transforms;
use crate::transform::parse_text;
use crate::transform::retarget_transforms;
use crate::transform::run_transformers;

/// The result of a check whose failure is fatal in development and only a
/// warning in production.
#[derive(Debug)]
pub(crate) enum ValidationOutcome {
	Ok,
	Warn(String),
	Fail(BundleError),
}

impl ValidationOutcome {
	pub(crate) fn violation(mode: Mode, error: BundleError) -> Self {
		match mode {
			Mode::Development => Self::Fail(error),
			Mode::Production => Self::Warn(error.to_string()),
		}
	}

	/// Log warnings and return `Ok(false)` so the caller can skip the
	/// offending item; failures are returned as errors.
	pub(crate) fn surface(self) -> BundleResult<bool> {
		match self {
			Self::Ok => Ok(true),
			Self::Warn(message) => {
				tracing::warn!("{message}");
				Ok(false)
			}
			Self::Fail(error) => Err(error),
		}
	}
}

/// State shared by every file loaded during one variant resolution.
pub(crate) struct ResolveContext<'a> {
	pub options: &'a LoadOptions,
	pub cache: &'a LoadSourceCache,
	pub variant_name: &'a str,
	/// The variant promised its extra files are already complete.
	pub all_files_listed: bool,
	/// Entry relative keys declared on the variant.
	pub declared_keys: BTreeSet<String>,
}

/// One file to load.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileRequest<'a> {
	/// The file's key relative to the entry file. For the main file this is
	/// its file name.
	pub key: &'a str,
	pub url: Option<&'a str>,
	pub source: Option<&'a VariantSource>,
	pub transforms: Option<&'a Transforms>,
	pub language: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub(crate) struct LoadedFile {
	pub source: VariantSource,
	pub transforms: Option<Transforms>,
	/// Extra files the loader discovered, keyed relative to this file.
	pub extra_files: Option<ExtraFiles>,
	/// The file's url followed by every extra dependency it reported.
	pub dependencies: Vec<String>,
	pub externals: Externals,
}

/// Load one file, run its transformers, parse it and package the result.
/// Errors carry the variant, file and url being processed.
pub(crate) async fn load_file(
	ctx: &ResolveContext<'_>,
	request: FileRequest<'_>,
) -> BundleResult<LoadedFile> {
	load_file_inner(ctx, request)
		.await
		.map_err(|e| e.in_file(ctx.variant_name, request.key, request.url))
}

async fn load_file_inner(
	ctx: &ResolveContext<'_>,
	request: FileRequest<'_>,
) -> BundleResult<LoadedFile> {
	let options = ctx.options;
	let file_name = request.key.rsplit('/').next().unwrap_or(request.key);
	let mut dependencies = Vec::new();
	let mut externals = Externals::new();
	let mut extra_files = None;
	let mut comments: Option<SourceComments> = None;

	let source = match (request.source, request.url) {
		(Some(source), _) => source.clone(),
		(None, Some(url)) => {
			let loader = options
				.loader
				.as_ref()
				.ok_or_else(|| BundleError::MissingLoader {
					url: url.to_string(),
				})?;
			let loaded = ctx.cache.load(url, loader).await.map_err(|source| {
				BundleError::Load {
					url: url.to_string(),
					source,
				}
			})?;

			validate_extra_files(url, loaded.extra_files.as_ref())?;
			validate_dependencies(url, loaded.extra_dependencies.as_deref())?;
			if ctx.all_files_listed {
				check_listed(ctx, request.key, loaded.extra_files.as_ref()).surface()?;
			}

			dependencies.extend(loaded.extra_dependencies.iter().flatten().cloned());
			if let Some(discovered) = &loaded.externals {
				externals.extend_from(discovered);
			}
			extra_files.clone_from(&loaded.extra_files);
			comments.clone_from(&loaded.comments);

			VariantSource::Text(loaded.source.clone())
		}
		(None, None) => {
			return Err(BundleError::MissingSource {
				file: request.key.to_string(),
			});
		}
	};

	if let Some(url) = request.url {
		dependencies.insert(0, url.to_string());
	}

	let mut transforms = request.transforms.cloned();
	let source = match source {
		VariantSource::Text(text) => {
			if transforms.is_none() && !options.disable_transforms {
				let transformed = run_transformers(options, &text, file_name).await?;
				if !transformed.is_empty() {
					transforms = Some(line_transforms(&text, &transformed));
				}
			}

			if options.disable_parsing {
				VariantSource::Text(text)
			} else {
				let tree = parse_text(
					options,
					&text,
					file_name,
					request.language,
					comments.as_ref(),
				)
				.await?;

				if let Some(current) = transforms.take() {
					transforms = Some(
						retarget_transforms(
							options,
							&text,
							&tree,
							current,
							file_name,
							request.language,
						)
						.await?,
					);
				}

				VariantSource::Tree(tree)
			}
		}
		parsed => parsed,
	};

	Ok(LoadedFile {
		source: options.output.encode(source)?,
		transforms,
		extra_files,
		dependencies,
		externals,
	})
}

/// Discovered keys must be relative and discovered values must be absolute
/// urls or inline content.
fn validate_extra_files(url: &str, extra_files: Option<&ExtraFiles>) -> BundleResult<()> {
	for (key, file) in extra_files.into_iter().flatten() {
		if is_absolute_key(key) {
			return Err(BundleError::AbsoluteExtraFileKey { key: key.clone() });
		}

		let value = match file {
			ExtraFile::Url(value) => Some(value),
			ExtraFile::Inline(content) if content.source.is_none() => content.url.as_ref(),
			ExtraFile::Inline(_) => None,
		};

		if let Some(value) = value.filter(|value| !is_absolute_url(value)) {
			return Err(BundleError::RelativeExtraFileUrl {
				key: key.clone(),
				value: value.clone(),
				url: url.to_string(),
			});
		}
	}

	Ok(())
}

fn validate_dependencies(url: &str, dependencies: Option<&[String]>) -> BundleResult<()> {
	for dependency in dependencies.into_iter().flatten() {
		if !is_absolute_url(dependency) {
			return Err(BundleError::RelativeDependency {
				dependency: dependency.clone(),
				url: url.to_string(),
			});
		}

		if dependency == url {
			return Err(BundleError::SelfDependency {
				url: url.to_string(),
			});
		}
	}

	Ok(())
}

/// Compare the files a load discovered against the keys the variant
/// declared upfront.
fn check_listed(
	ctx: &ResolveContext<'_>,
	key: &str,
	discovered: Option<&ExtraFiles>,
) -> ValidationOutcome {
	let unlisted: Vec<String> = discovered
		.into_iter()
		.flat_map(|files| files.keys())
		.map(|discovered_key| rebase_key(key, discovered_key))
		.filter(|rebased| !ctx.declared_keys.contains(rebased))
		.collect();

	if unlisted.is_empty() {
		return ValidationOutcome::Ok;
	}

	ValidationOutcome::violation(ctx.options.mode, BundleError::UnlistedExtraFiles {
		variant: ctx.variant_name.to_string(),
		file: key.to_string(),
		files: unlisted.join(", "),
	})
}
