use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use codebundle_core::OutputMode;

pub use loader::*;
pub use parser::*;
pub use transformer::*;

mod loader;
mod parser;
mod transformer;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Resolve documentation code samples into self-contained bundles.",
	long_about = "codebundle loads a code sample from disk, follows every relative import it \
	              makes, and packages the whole sample into one JSON bundle ready to ship to a \
	              client.\n\nQuick start:\n  codebundle resolve demo/index.js  Print the \
	              packaged variant\n  codebundle files demo/index.js    List the virtual path \
	              of every file"
)]
pub struct CodebundleCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory. Entries and configured globals
	/// are resolved against it.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Resolve a sample and print the packaged variant as JSON.
	///
	/// The output holds the variant itself, every url it was built from and
	/// the external modules its files import. Relative imports are followed
	/// recursively; bare module imports are reported as externals.
	Resolve {
		/// The main file of the sample.
		entry: PathBuf,

		/// Name of the variant being resolved.
		#[arg(long, default_value = "default")]
		variant: String,

		/// Entry files whose extra files are injected into the variant.
		/// Added to the globals listed in the config file.
		#[arg(long = "globals", value_name = "PATH")]
		globals: Vec<PathBuf>,

		/// Maximum nesting of imported files below the entry.
		#[arg(long)]
		max_depth: Option<usize>,

		/// Keep sources as raw text instead of parsing them into trees.
		#[arg(long, default_value_t = false)]
		no_parse: bool,

		/// How parsed trees are written out.
		#[arg(long, value_enum)]
		output: Option<OutputArg>,

		/// Only warn about inconsistencies that would otherwise fail the
		/// resolution.
		#[arg(long, default_value_t = false)]
		production: bool,

		/// Print the named transform of the entry file as text instead of
		/// the bundle.
		#[arg(long, value_name = "NAME")]
		transform: Option<String>,
	},
	/// List the virtual path of every file in a resolved sample.
	///
	/// The entry file is placed deep enough below the virtual root that every
	/// imported file, even one reached through `../`, lands inside it.
	Files {
		/// The main file of the sample.
		entry: PathBuf,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputArg {
	/// Keep parsed trees as JSON objects.
	Tree,
	/// Store each parsed tree as a JSON string.
	Json,
	/// Store each parsed tree gzip-compressed and base64-encoded.
	Gzip,
}

impl From<OutputArg> for OutputMode {
	fn from(value: OutputArg) -> Self {
		match value {
			OutputArg::Tree => Self::Tree,
			OutputArg::Json => Self::HastJson,
			OutputArg::Gzip => Self::HastGzip,
		}
	}
}
