use async_trait::async_trait;
use codebundle_core::BoxError;
use codebundle_core::ExternalImport;
use codebundle_core::Externals;
use codebundle_core::ExtraFile;
use codebundle_core::ExtraFiles;
use codebundle_core::ImportKind;
use codebundle_core::SourceLoad;
use codebundle_core::SourceLoader;
use codebundle_core::path::normalize_path;
use regex::Regex;
use url::Url;

/// Loads `file://` urls from disk and discovers the files each one imports.
///
/// Relative `import` / `export … from` specifiers and CSS `@import` rules
/// become extra files keyed by their specifier. Bare module specifiers
/// become externals.
pub struct FsSourceLoader {
	module_import: Regex,
	css_import: Regex,
}

/// What a single file imports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Imports {
	pub extra_files: ExtraFiles,
	pub externals: Externals,
}

impl FsSourceLoader {
	pub fn new() -> Result<Self, regex::Error> {
		Ok(Self {
			module_import: Regex::new(
				r#"(?m)^\s*(?:import|export)\s+(type\s+)?(?:([^'";]*?)\s*\bfrom\s*)?["']([^"']+)["']"#,
			)?,
			css_import: Regex::new(r#"@import\s+(?:url\(\s*)?["']([^"']+)["']"#)?,
		})
	}

	/// Find the imports of `source`, which was loaded from `url`.
	pub fn scan(&self, url: &Url, source: &str) -> Imports {
		let mut imports = Imports::default();

		for captures in self.module_import.captures_iter(source) {
			let Some(specifier) = captures.get(3).map(|m| m.as_str()) else {
				continue;
			};
			let is_type = captures.get(1).is_some();
			let clause = captures.get(2).map_or("", |m| m.as_str());

			if is_relative(specifier) {
				imports.add_file(url, specifier);
			} else if !specifier.contains("://") && !specifier.starts_with('/') {
				let module = imports.externals.entry(specifier.to_string()).or_default();
				for import in parse_clause(specifier, clause, is_type) {
					if !module.contains(&import) {
						module.push(import);
					}
				}
			}
		}

		for captures in self.css_import.captures_iter(source) {
			let specifier = &captures[1];
			if !specifier.contains("://") && !specifier.starts_with('/') {
				imports.add_file(url, specifier);
			}
		}

		imports
	}
}

impl Imports {
	fn add_file(&mut self, url: &Url, specifier: &str) {
		let Ok(resolved) = url.join(specifier) else {
			tracing::warn!(%url, specifier, "ignoring unresolvable import");
			return;
		};

		self.extra_files
			.entry(normalize_path(specifier))
			.or_insert_with(|| ExtraFile::Url(resolved.to_string()));
	}
}

#[async_trait]
impl SourceLoader for FsSourceLoader {
	async fn load_source(&self, url: &str) -> Result<SourceLoad, BoxError> {
		let parsed = Url::parse(url)?;
		if parsed.scheme() != "file" {
			return Err(format!("only `file://` urls can be loaded from disk: {url}").into());
		}

		let path = parsed
			.to_file_path()
			.map_err(|()| format!("not a local file path: {url}"))?;
		let source = tokio::fs::read_to_string(&path)
			.await
			.map_err(|e| format!("failed to read {}: {e}", path.display()))?;
		let imports = self.scan(&parsed, &source);
		tracing::debug!(
			url,
			files = imports.extra_files.len(),
			externals = imports.externals.len(),
			"loaded from disk"
		);

		Ok(SourceLoad {
			extra_files: (!imports.extra_files.is_empty()).then_some(imports.extra_files),
			externals: (!imports.externals.is_empty()).then_some(imports.externals),
			..SourceLoad::new(source)
		})
	}
}

fn is_relative(specifier: &str) -> bool {
	specifier.starts_with("./") || specifier.starts_with("../")
}

/// Split an import clause such as `React, { useState as useLocalState }`
/// into the symbols it imports. A clause-less import is a side effect of
/// the whole module.
fn parse_clause(module: &str, clause: &str, is_type: bool) -> Vec<ExternalImport> {
	let typed = |mut import: ExternalImport, is_type: bool| {
		import.is_type = is_type.then_some(true);
		import
	};
	let clause = clause.trim();
	if clause.is_empty() {
		return vec![ExternalImport::new(module, ImportKind::SideEffect)];
	}

	let (outer, named) = match (clause.find('{'), clause.rfind('}')) {
		(Some(open), Some(close)) if open < close => {
			(
				format!("{}{}", &clause[..open], &clause[close + 1..]),
				&clause[open + 1..close],
			)
		}
		_ => (clause.to_string(), ""),
	};

	let mut imports = Vec::new();
	for part in outer.split(',').map(str::trim).filter(|part| !part.is_empty()) {
		if let Some(namespace) = part.strip_prefix('*') {
			let name = namespace.trim().trim_start_matches("as").trim();
			imports.push(typed(ExternalImport::new(name, ImportKind::Namespace), is_type));
		} else {
			imports.push(typed(ExternalImport::new(part, ImportKind::Default), is_type));
		}
	}

	for part in named.split(',').map(str::trim).filter(|part| !part.is_empty()) {
		let (part, inline_type) = match part.strip_prefix("type ") {
			Some(rest) => (rest.trim(), true),
			None => (part, false),
		};
		let name = part.split(" as ").next().unwrap_or(part).trim();
		imports.push(typed(
			ExternalImport::new(name, ImportKind::Named),
			is_type || inline_type,
		));
	}

	imports
}
