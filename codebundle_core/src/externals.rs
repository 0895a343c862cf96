use std::collections::BTreeMap;

use derive_more::Deref;
use derive_more::DerefMut;
use serde::Deserialize;
use serde::Serialize;

/// How a symbol is imported from an external module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportKind {
	/// `import name from "module"`
	Default,
	/// `import { name } from "module"`
	Named,
	/// `import * as name from "module"`
	Namespace,
	/// `import "module"`
	SideEffect,
}

/// One symbol imported from an external module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalImport {
	pub name: String,
	#[serde(rename = "type")]
	pub kind: ImportKind,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_type: Option<bool>,
}

impl ExternalImport {
	pub fn new(name: impl Into<String>, kind: ImportKind) -> Self {
		Self {
			name: name.into(),
			kind,
			is_type: None,
		}
	}
}

/// Imported symbols keyed by module name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref, DerefMut)]
#[serde(transparent)]
pub struct Externals(BTreeMap<String, Vec<ExternalImport>>);

impl Externals {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_import(mut self, module: impl Into<String>, import: ExternalImport) -> Self {
		self.0.entry(module.into()).or_default().push(import);
		self
	}

	/// Append every import of `other` after the imports already present.
	pub fn extend_from(&mut self, other: &Self) {
		for (module, imports) in &other.0 {
			self.0
				.entry(module.clone())
				.or_default()
				.extend(imports.iter().cloned());
		}
	}

	/// The module names, used for the packaged variant.
	pub fn module_names(&self) -> Vec<String> {
		self.0.keys().cloned().collect()
	}
}

impl FromIterator<(String, Vec<ExternalImport>)> for Externals {
	fn from_iter<T: IntoIterator<Item = (String, Vec<ExternalImport>)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Merge externals contributed independently by each file. Imports of a
/// module seen in several inputs are concatenated in input order; identical
/// descriptors are kept.
pub fn merge_externals<'a>(inputs: impl IntoIterator<Item = &'a Externals>) -> Externals {
	let mut merged = Externals::new();
	for externals in inputs {
		merged.extend_from(externals);
	}
	merged
}
