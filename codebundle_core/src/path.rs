//! Pure path arithmetic for extra file keys and virtual file paths.
//!
//! Extra file keys are always `/` separated relative paths. Urls are only
//! ever joined through [`resolve_url`] so that `http`, `https` and `file`
//! identifiers behave the same.

use std::collections::BTreeMap;

use url::Url;

use crate::Variant;

/// Whether an extra file key is absolute, either a rooted path or a url.
pub fn is_absolute_key(key: &str) -> bool {
	key.starts_with('/') || key.starts_with('\\') || has_scheme(key)
}

/// Whether a value is an absolute resource identifier rather than a path
/// relative to the declaring file.
pub fn is_absolute_url(value: &str) -> bool {
	has_scheme(value) || value.starts_with('/')
}

fn has_scheme(value: &str) -> bool {
	Url::parse(value).is_ok_and(|url| !url.cannot_be_a_base())
}

/// Resolve a relative reference against the url of the file declaring it.
pub fn resolve_url(base: &str, relative: &str) -> Option<String> {
	if has_scheme(relative) {
		return Some(relative.to_string());
	}

	if let Ok(base) = Url::parse(base) {
		return base.join(relative).ok().map(String::from);
	}

	// Rooted paths without a scheme.
	if relative.starts_with('/') {
		return Some(normalize_path(relative));
	}
	let directory = directory_of(base);
	Some(normalize_path(&format!("{directory}{relative}")))
}

/// Collapse `.` and `..` segments. Leading `..` segments of a relative path
/// are kept; `..` never climbs above the root of an absolute path.
pub fn normalize_path(path: &str) -> String {
	let absolute = path.starts_with('/');
	let trailing_slash = path.ends_with('/') && path.len() > 1;
	let mut segments: Vec<&str> = Vec::new();

	for segment in path.split('/') {
		match segment {
			"" | "." => {}
			".." => {
				match segments.last() {
					Some(&last) if last != ".." => {
						segments.pop();
					}
					_ if absolute => {}
					_ => segments.push(".."),
				}
			}
			other => segments.push(other),
		}
	}

	let mut normalized = segments.join("/");
	if absolute {
		normalized.insert(0, '/');
	}
	if trailing_slash && !segments.is_empty() {
		normalized.push('/');
	}
	normalized
}

/// The directory part of a key including its trailing slash, or an empty
/// string for a bare file name.
pub fn directory_of(path: &str) -> &str {
	path.rfind('/').map_or("", |index| &path[..=index])
}

/// Rewrite `key`, relative to a file whose own key is `declaring_key`, so
/// that it is relative to the entry file instead.
///
/// ```rust
/// use codebundle_core::path::rebase_key;
///
/// assert_eq!(rebase_key("../a.js", "../index.js"), "../../index.js");
/// assert_eq!(rebase_key("lib/b.js", "./c.js"), "lib/c.js");
/// ```
pub fn rebase_key(declaring_key: &str, key: &str) -> String {
	normalize_path(&format!("{}{key}", directory_of(declaring_key)))
}

/// Number of directories a relative key climbs above the entry file.
pub fn back_navigation_depth(key: &str) -> usize {
	normalize_path(key)
		.split('/')
		.take_while(|segment| *segment == "..")
		.count()
}

/// The deepest climb of any key.
pub fn max_back_navigation<'a>(keys: impl IntoIterator<Item = &'a str>) -> usize {
	keys.into_iter()
		.map(back_navigation_depth)
		.max()
		.unwrap_or_default()
}

/// Placeholder directory names `a`, `b`, … `z`, `aa`, `ab`, … used to give
/// keys that climb above the entry file somewhere to land.
pub fn synthetic_directories(count: usize) -> Vec<String> {
	(0..count).map(synthetic_name).collect()
}

fn synthetic_name(index: usize) -> String {
	let mut name = Vec::new();
	let mut index = index + 1;
	while index > 0 {
		let remainder = (index - 1) % 26;
		name.push(b'a' + remainder as u8);
		index = (index - 1) / 26;
	}
	name.reverse();
	String::from_utf8_lossy(&name).into_owned()
}

/// `../` once per segment of the metadata prefix, the key offset that moves
/// a file from the sample directory to the virtual root.
pub fn metadata_back_path(metadata_prefix: Option<&str>) -> String {
	"../".repeat(prefix_segments(metadata_prefix).len())
}

fn prefix_segments(metadata_prefix: Option<&str>) -> Vec<&str> {
	metadata_prefix
		.map(|prefix| {
			prefix
				.split('/')
				.filter(|segment| !segment.is_empty() && *segment != ".")
				.collect()
		})
		.unwrap_or_default()
}

/// The absolute virtual path of the main file. Its directory is deep enough
/// that every extra key resolves inside the virtual root and ends with the
/// metadata prefix segments.
pub fn main_file_path<'a>(
	file_name: &str,
	extra_keys: impl IntoIterator<Item = &'a str>,
	metadata_prefix: Option<&str>,
) -> String {
	let prefix = prefix_segments(metadata_prefix);
	let depth = max_back_navigation(extra_keys);
	let mut directories = synthetic_directories(depth.saturating_sub(prefix.len()));
	directories.extend(prefix.iter().map(ToString::to_string));

	if directories.is_empty() {
		format!("/{file_name}")
	} else {
		format!("/{}/{file_name}", directories.join("/"))
	}
}

/// Absolute virtual paths for a variant's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPaths {
	pub main: String,
	/// Keyed by the extra file key.
	pub extra: BTreeMap<String, String>,
}

/// Lay out the main file and every extra file under one virtual root, even
/// when their urls share no common directory.
pub fn virtual_paths(variant: &Variant) -> Option<VirtualPaths> {
	let file_name = variant.file_name.as_deref()?;
	let keys: Vec<&str> = variant
		.extra_files
		.iter()
		.flat_map(|files| files.keys().map(String::as_str))
		.collect();
	let main = main_file_path(file_name, keys.iter().copied(), variant.metadata_prefix.as_deref());
	let extra = keys
		.iter()
		.map(|key| (key.to_string(), rebase_key(&main, key)))
		.collect();

	Some(VirtualPaths { main, extra })
}

/// The file name at the end of a url, ignoring any query or fragment.
pub fn file_name_from_url(url: &str) -> Option<String> {
	let path = match Url::parse(url) {
		Ok(parsed) => parsed.path().to_string(),
		Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
	};

	path.rsplit('/')
		.next()
		.filter(|name| !name.is_empty())
		.map(ToString::to_string)
}

/// Split a file name into stem and extension at the last `.`. Names without
/// a dot, or whose only dot is the first character, have no extension.
///
/// ```rust
/// use codebundle_core::path::split_extension;
///
/// assert_eq!(split_extension("theme.css"), ("theme", Some("css")));
/// assert_eq!(split_extension(".env"), (".env", None));
/// ```
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
	match name.rfind('.') {
		Some(0) | None => (name, None),
		Some(index) => (&name[..index], Some(&name[index + 1..])),
	}
}

/// The lowercase extension of the last path segment.
pub fn extension_of(file_name: &str) -> Option<String> {
	let name = file_name.rsplit('/').next().unwrap_or(file_name);
	split_extension(name).1.map(str::to_lowercase)
}
