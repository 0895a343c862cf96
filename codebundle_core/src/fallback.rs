use futures::future::try_join_all;

use crate::BundleError;
use crate::BundleResult;
use crate::Code;
use crate::ExtraFiles;
use crate::LoadOptions;
use crate::LoadSourceCache;
use crate::Variant;
use crate::VariantInput;
use crate::VariantSource;
use crate::transform::parse_text;
use crate::variant::resolve_variant;

/// What the caller is about to render.
#[derive(Debug, Clone, Default)]
pub struct FallbackOptions {
	/// The initial file will be shown highlighted, so it must be parsed.
	pub should_highlight: bool,
	/// The caller needs every extra file of the initial variant.
	pub need_extra_files: bool,
	/// Every variant of the sample must be resolved, not only the initial
	/// one.
	pub need_all_variants: bool,
	/// The file to show first. Defaults to the variant's main file.
	pub initial_filename: Option<String>,
}

/// The code needed to render a sample's initial state.
#[derive(Debug, Clone)]
pub struct FallbackCode {
	/// Every variant, with the resolved ones replaced by their packaged
	/// form.
	pub code: Code,
	pub initial_filename: Option<String>,
	pub initial_source: VariantSource,
	/// File names known across every resolved variant.
	pub all_file_names: Vec<String>,
	/// Extra files of the initial variant when `need_extra_files` was set.
	pub initial_extra_files: Option<ExtraFiles>,
}

/// Load just enough of a sample to render `initial_variant`.
///
/// `loaded` is the code already at hand; when absent the
/// [`CodeMetaLoader`](crate::CodeMetaLoader) resolves `url` into it. A
/// variant that lists all its files and already holds the requested file is
/// used as is. Everything else goes through [`load_variant`](crate::load_variant)
/// with one load cache shared by every variant.
#[tracing::instrument(skip(loaded, fallback, options))]
pub async fn load_fallback_code(
	url: &str,
	initial_variant: &str,
	loaded: Option<Code>,
	fallback: FallbackOptions,
	options: &LoadOptions,
) -> BundleResult<FallbackCode> {
	let mut code = match loaded {
		Some(code) => code,
		None => load_code(url, options).await?,
	};

	let input = code
		.get(initial_variant)
		.cloned()
		.ok_or_else(|| BundleError::VariantNotFound {
			variant: initial_variant.to_string(),
		})?;

	if let VariantInput::Variant(variant) = &input {
		if let Some(fallback_code) = early_return(&code, variant, &fallback, options).await? {
			tracing::debug!(variant = initial_variant, "using preloaded code");
			return Ok(fallback_code);
		}
	}

	let options = LoadOptions {
		disable_parsing: options.disable_parsing || !fallback.should_highlight,
		..options.clone()
	};
	let cache = LoadSourceCache::new();
	let targets: Vec<(String, VariantInput)> = if fallback.need_all_variants {
		code.iter()
			.map(|(name, input)| (name.clone(), input.clone()))
			.collect()
	} else {
		vec![(initial_variant.to_string(), input)]
	};

	let resolutions = targets
		.iter()
		.map(|(name, input)| resolve_variant(&options, &cache, name, input.clone()));
	let resolved = try_join_all(resolutions).await?;

	let mut all_file_names = Vec::new();
	for ((name, _), resolved) in targets.iter().zip(resolved) {
		for file_name in resolved.variant.file_names() {
			if !all_file_names.contains(&file_name) {
				all_file_names.push(file_name);
			}
		}
		code.insert(name.clone(), VariantInput::from(resolved.variant));
	}

	let Some(VariantInput::Variant(variant)) = code.get(initial_variant) else {
		return Err(BundleError::VariantNotFound {
			variant: initial_variant.to_string(),
		});
	};
	let initial_filename = fallback
		.initial_filename
		.clone()
		.or_else(|| variant.file_name.clone());
	let initial_source = initial_source(variant, initial_filename.as_deref(), initial_variant)?;
	let initial_extra_files = if fallback.need_extra_files {
		variant.extra_files.clone()
	} else {
		None
	};

	Ok(FallbackCode {
		code,
		initial_filename,
		initial_source,
		all_file_names,
		initial_extra_files,
	})
}

async fn load_code(url: &str, options: &LoadOptions) -> BundleResult<Code> {
	let meta_loader =
		options
			.code_meta_loader
			.as_ref()
			.ok_or_else(|| BundleError::MissingCodeMetaLoader {
				url: url.to_string(),
			})?;

	meta_loader.load_code_meta(url).await.map_err(|e| {
		BundleError::CodeMeta {
			url: url.to_string(),
			source: e.into(),
		}
	})
}

/// Serve the request straight from `variant` when it lists every file,
/// nothing broader was asked for and the requested file is present.
async fn early_return(
	code: &Code,
	variant: &Variant,
	fallback: &FallbackOptions,
	options: &LoadOptions,
) -> BundleResult<Option<FallbackCode>> {
	if !variant.all_files_listed || fallback.need_extra_files || fallback.need_all_variants {
		return Ok(None);
	}

	let initial_filename = fallback
		.initial_filename
		.clone()
		.or_else(|| variant.file_name.clone());
	let source = match initial_filename.as_deref() {
		Some(file_name) => variant.file_source(file_name),
		None => variant.source.as_ref(),
	};
	let Some(source) = source.cloned() else {
		return Ok(None);
	};

	let initial_source = match source {
		VariantSource::Text(text) if fallback.should_highlight => {
			let file_name = initial_filename.as_deref().unwrap_or_default();
			let language = (initial_filename == variant.file_name)
				.then_some(variant.language.as_deref())
				.flatten();
			let tree = parse_text(options, &text, file_name, language, None).await?;
			options.output.encode(VariantSource::Tree(tree))?
		}
		other => other,
	};

	Ok(Some(FallbackCode {
		code: code.clone(),
		initial_filename,
		initial_source,
		all_file_names: variant.file_names(),
		initial_extra_files: None,
	}))
}

fn initial_source(
	variant: &Variant,
	file_name: Option<&str>,
	variant_name: &str,
) -> BundleResult<VariantSource> {
	let source = match file_name {
		Some(file_name) => variant.file_source(file_name),
		None => variant.source.as_ref(),
	};

	source.cloned().ok_or_else(|| {
		BundleError::FileNotFound {
			file: file_name.unwrap_or_default().to_string(),
			variant: variant_name.to_string(),
		}
	})
}
