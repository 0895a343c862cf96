use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use codebundle_cli::CodebundleCli;
use codebundle_cli::Commands;
use codebundle_cli::FsSourceLoader;
use codebundle_cli::LineParser;
use codebundle_cli::OutputArg;
use codebundle_cli::StripTypes;
use codebundle_cli::TYPESCRIPT_EXTENSIONS;
use codebundle_core::AnyEmptyResult;
use codebundle_core::AnyResult;
use codebundle_core::config::BundleConfig;
use codebundle_core::LoadOptions;
use codebundle_core::Mode;
use codebundle_core::RegisteredTransformer;
use codebundle_core::ResolvedVariant;
use codebundle_core::Transforms;
use codebundle_core::Variant;
use codebundle_core::apply_transform;
use codebundle_core::load_variant;
use codebundle_core::path::extension_of;
use codebundle_core::path::virtual_paths;
use tracing_subscriber::EnvFilter;
use url::Url;

fn main() {
	let args = CodebundleCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let default_level = if args.verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.init();

	let result = match &args.command {
		Some(Commands::Resolve {
			entry,
			variant,
			globals,
			max_depth,
			no_parse,
			output,
			production,
			transform,
		}) => {
			run_resolve(&args, entry, variant, &ResolveFlags {
				globals,
				max_depth: *max_depth,
				no_parse: *no_parse,
				output: *output,
				production: *production,
				transform: transform.as_deref(),
			})
		}
		Some(Commands::Files { entry }) => run_files(&args, entry),
		None => {
			eprintln!("No subcommand specified. Run `codebundle --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<codebundle_core::BundleError>() {
			Ok(bundle_err) => {
				let report: miette::Report = (*bundle_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("error: {e}");
			}
		}
		process::exit(2);
	}
}

struct ResolveFlags<'a> {
	globals: &'a [PathBuf],
	max_depth: Option<usize>,
	no_parse: bool,
	output: Option<OutputArg>,
	production: bool,
	transform: Option<&'a str>,
}

fn resolve_root(args: &CodebundleCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn file_url(path: &Path) -> AnyResult<String> {
	let absolute = std::path::absolute(path)?;
	let url = Url::from_file_path(&absolute)
		.map_err(|()| format!("cannot express {} as a file url", absolute.display()))?;

	Ok(url.to_string())
}

/// Options for resolving from disk: the config file under `root` with the
/// filesystem collaborators attached.
fn build_options(root: &Path) -> AnyResult<(LoadOptions, Vec<PathBuf>)> {
	let config = BundleConfig::load(root)?;
	let globals = config
		.as_ref()
		.map(|config| config.globals_paths(root))
		.unwrap_or_default();
	let options = LoadOptions::from_config(config.as_ref())
		.with_loader(Arc::new(FsSourceLoader::new()?))
		.with_parser(Arc::new(LineParser))
		.with_transformer(RegisteredTransformer::new(
			TYPESCRIPT_EXTENSIONS,
			Arc::new(StripTypes::new()?),
		));

	Ok((options, globals))
}

fn entry_variant(root: &Path, entry: &Path) -> AnyResult<Variant> {
	let path = root.join(entry);
	if !path.is_file() {
		return Err(format!("entry file not found: {}", path.display()).into());
	}

	let mut variant = Variant::from_url(file_url(&path)?);
	variant.language = path.to_str().and_then(extension_of);
	Ok(variant)
}

fn resolve(options: &LoadOptions, variant_name: &str, variant: Variant) -> AnyResult<ResolvedVariant> {
	let runtime = tokio::runtime::Runtime::new()?;
	let resolved = runtime.block_on(load_variant(variant_name, variant, options))?;
	Ok(resolved)
}

fn run_resolve(
	args: &CodebundleCli,
	entry: &Path,
	variant_name: &str,
	flags: &ResolveFlags<'_>,
) -> AnyEmptyResult {
	let root = resolve_root(args);
	let (mut options, mut globals) = build_options(&root)?;
	globals.extend(flags.globals.iter().map(|path| root.join(path)));

	for path in &globals {
		options = options.with_globals(file_url(path)?.as_str());
	}
	if let Some(max_depth) = flags.max_depth {
		options = options.with_max_depth(max_depth);
	}
	if flags.no_parse {
		options = options.without_parsing();
	}
	if let Some(output) = flags.output {
		options = options.with_output(output.into());
	}
	if flags.production {
		options = options.with_mode(Mode::Production);
	}

	let variant = entry_variant(&root, entry)?;
	let resolved = resolve(&options, variant_name, variant)?;

	if let Some(name) = flags.transform {
		let Some(source) = resolved.variant.source.as_ref() else {
			return Err(format!("`{variant_name}` has no source to transform").into());
		};
		let transforms = resolved.variant.transforms.clone().unwrap_or_else(Transforms::new);
		let rendition = apply_transform(source, &transforms, name)?;
		print!("{}", rendition.text_content()?);
		return Ok(());
	}

	println!("{}", serde_json::to_string_pretty(&resolved)?);
	Ok(())
}

fn run_files(args: &CodebundleCli, entry: &Path) -> AnyEmptyResult {
	let root = resolve_root(args);
	let (mut options, globals) = build_options(&root)?;
	for path in &globals {
		options = options.with_globals(file_url(path)?.as_str());
	}

	let variant = entry_variant(&root, entry)?;
	let resolved = resolve(&options.without_parsing(), "default", variant)?;
	let Some(paths) = virtual_paths(&resolved.variant) else {
		return Ok(());
	};

	println!("{}", paths.main);
	for path in paths.extra.values() {
		println!("{path}");
	}

	tracing::debug!(dependencies = resolved.dependencies.len(), "listed files");
	Ok(())
}
