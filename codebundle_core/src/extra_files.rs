use std::collections::HashSet;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::try_join_all;

use crate::BundleError;
use crate::BundleResult;
use crate::ExtraFile;
use crate::ExtraFileContent;
use crate::ExtraFiles;
use crate::Externals;
use crate::loader::FileRequest;
use crate::loader::ResolveContext;
use crate::loader::ValidationOutcome;
use crate::loader::load_file;
use crate::path::is_absolute_url;
use crate::path::rebase_key;
use crate::path::resolve_url;

/// Recursion state for one level of extra files.
#[derive(Debug, Clone)]
pub(crate) struct Level {
	/// Url of the file that declared this level's entries.
	pub base_url: Option<String>,
	/// Key of the declaring file relative to the entry file.
	pub declaring_key: String,
	pub remaining_depth: usize,
	/// Urls already being resolved on the path from the entry file.
	pub visited: HashSet<String>,
}

/// Flattened extra files keyed relative to the entry file.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolvedExtraFiles {
	pub extra_files: ExtraFiles,
	pub dependencies: Vec<String>,
	pub externals: Externals,
}

impl ResolvedExtraFiles {
	/// Fold `other` in after the entries already present. Keys already
	/// present are kept.
	fn absorb(&mut self, other: Self) {
		for (key, file) in other.extra_files {
			self.extra_files.entry(key).or_insert(file);
		}
		self.dependencies.extend(other.dependencies);
		self.externals.extend_from(&other.externals);
	}
}

/// Resolve every entry of `extra_files` to loaded content, recursing into
/// the extra files each of them declares. Siblings load concurrently.
pub(crate) fn resolve_extra_files<'a>(
	ctx: &'a ResolveContext<'a>,
	extra_files: ExtraFiles,
	level: Level,
) -> BoxFuture<'a, BundleResult<ResolvedExtraFiles>> {
	async move {
		if extra_files.is_empty() {
			return Ok(ResolvedExtraFiles::default());
		}

		if level.remaining_depth == 0 {
			return Err(BundleError::MaxDepthExceeded {
				max_depth: ctx.options.max_depth,
			}
			.in_file(
				ctx.variant_name,
				&level.declaring_key,
				level.base_url.as_deref(),
			));
		}

		let entries = extra_files
			.into_iter()
			.map(|(key, file)| resolve_entry(ctx, key, file, &level));
		let results = try_join_all(entries).await?;

		let mut resolved = ResolvedExtraFiles::default();
		for result in results {
			resolved.absorb(result);
		}

		Ok(resolved)
	}
	.boxed()
}

async fn resolve_entry(
	ctx: &ResolveContext<'_>,
	key: String,
	file: ExtraFile,
	level: &Level,
) -> BundleResult<ResolvedExtraFiles> {
	let rebased = rebase_key(&level.declaring_key, &key);
	let metadata = file.is_metadata();
	let content = match file {
		ExtraFile::Url(url) => {
			ExtraFileContent {
				url: Some(url),
				..ExtraFileContent::default()
			}
		}
		ExtraFile::Inline(content) => content,
	};

	let url = match (&content.source, &content.url) {
		(Some(_), _) => None,
		(None, Some(value)) => {
			let located = entry_url(ctx, &key, value, level)
				.map_err(|e| e.in_file(ctx.variant_name, &rebased, Some(value)))?;
			let Some(url) = located else {
				return Ok(ResolvedExtraFiles::default());
			};
			if level.visited.contains(&url) {
				return Err(BundleError::CircularDependency { url: url.clone() }.in_file(
					ctx.variant_name,
					&rebased,
					Some(&url),
				));
			}
			Some(url)
		}
		(None, None) => {
			return Err(BundleError::MissingSource {
				file: rebased.clone(),
			}
			.in_file(ctx.variant_name, &rebased, None));
		}
	};

	let loaded = load_file(ctx, FileRequest {
		key: &rebased,
		url: url.as_deref(),
		source: content.source.as_ref(),
		transforms: content.transforms.as_ref(),
		language: None,
	})
	.await?;

	let mut resolved = ResolvedExtraFiles::default();
	resolved.extra_files.insert(
		rebased.clone(),
		ExtraFile::Inline(ExtraFileContent {
			url: None,
			source: Some(loaded.source),
			transforms: loaded.transforms,
			metadata,
		}),
	);
	resolved.dependencies = loaded.dependencies;
	resolved.externals = loaded.externals;

	if let Some(discovered) = loaded.extra_files {
		let mut visited = level.visited.clone();
		visited.extend(url.clone());
		let nested = Level {
			base_url: url.or_else(|| level.base_url.clone()),
			declaring_key: rebased,
			remaining_depth: level.remaining_depth - 1,
			visited,
		};
		let children = resolve_extra_files(ctx, discovered, nested).await?;
		resolved.absorb(children);
	}

	Ok(resolved)
}

/// The absolute url an entry value points at. Relative values need the
/// declaring file's url; without one the entry is skipped in production
/// and fails in development.
fn entry_url(
	ctx: &ResolveContext<'_>,
	key: &str,
	value: &str,
	level: &Level,
) -> BundleResult<Option<String>> {
	if is_absolute_url(value) {
		return Ok(Some(value.to_string()));
	}

	if let Some(url) = level
		.base_url
		.as_deref()
		.and_then(|base| resolve_url(base, value))
	{
		return Ok(Some(url));
	}

	let error = BundleError::UnresolvableRelativeEntry {
		key: key.to_string(),
		value: value.to_string(),
	};
	match ValidationOutcome::violation(ctx.options.mode, error) {
		ValidationOutcome::Warn(message) => {
			ValidationOutcome::Warn(format!("skipping extra file: {message}"))
		}
		other => other,
	}
	.surface()?;

	Ok(None)
}
