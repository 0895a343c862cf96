use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::BundleError;
use crate::BundleResult;
use crate::Mode;
use crate::OutputMode;

/// Default maximum nesting of extra files below the main file.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = [
	"codebundle.toml",
	".codebundle.toml",
	".config/codebundle.toml",
];

/// Configuration loaded from a `codebundle.toml` file.
///
/// ```toml
/// max_depth = 6
/// disable_parsing = false
/// disable_transforms = false
/// output = "hastGzip"
/// mode = "production"
/// globals = ["shared/theme.js"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundleConfig {
	/// Maximum nesting of extra files. Defaults to 10.
	#[serde(default)]
	pub max_depth: Option<usize>,
	/// Keep sources as raw text instead of parsing them.
	#[serde(default)]
	pub disable_parsing: bool,
	/// Do not run source transformers.
	#[serde(default)]
	pub disable_transforms: bool,
	/// How parsed trees are written out: `tree`, `hastJson` or `hastGzip`.
	#[serde(default)]
	pub output: Option<OutputMode>,
	/// `development` fails on inconsistencies that `production` only warns
	/// about.
	#[serde(default)]
	pub mode: Option<Mode>,
	/// Globals entry files, relative to the project root. Their extra files
	/// are injected into every resolved variant.
	#[serde(default)]
	pub globals: Vec<PathBuf>,
}

impl BundleConfig {
	/// Find the config file under `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	pub fn load(root: &Path) -> BundleResult<Option<BundleConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path).map_err(|e| {
			BundleError::ReadFile {
				path: config_path.display().to_string(),
				reason: e.to_string(),
			}
		})?;
		let config: BundleConfig =
			toml::from_str(&content).map_err(|e| BundleError::ConfigParse(e.to_string()))?;

		Ok(Some(config))
	}

	/// Globals entry files resolved against `root`.
	pub fn globals_paths(&self, root: &Path) -> Vec<PathBuf> {
		self.globals.iter().map(|path| root.join(path)).collect()
	}
}
