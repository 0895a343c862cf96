//! Deltas between a baseline document and one of its transformed renditions.
//!
//! Two representations are supported:
//!
//! - [`LineDelta`] describes the change between two raw texts line by line.
//! - [`TreeDelta`] describes the change between two parsed trees
//!   structurally, so a transformed rendition that differs in a handful of
//!   nodes costs a handful of nodes to ship.
//!
//! Both are computed with [`similar`] and satisfy the same law: applying a
//! delta to the exact baseline it was computed against reproduces the
//! target exactly.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use similar::Algorithm;
use similar::DiffOp;
use similar::capture_diff_slices;

use crate::BundleError;
use crate::BundleResult;

/// A single step of a [`LineDelta`], consumed in order against the baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum LineOp {
	/// Copy the next `count` baseline lines.
	Keep { count: usize },
	/// Skip the next `count` baseline lines.
	Delete { count: usize },
	/// Emit new lines. Each line carries its own line terminator.
	Insert { lines: Vec<String> },
}

/// A line based delta between two raw texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineDelta(pub Vec<LineOp>);

impl LineDelta {
	pub fn compute(old: &str, new: &str) -> Self {
		let old_lines = split_lines(old);
		let new_lines = split_lines(new);
		let mut ops = Vec::new();

		for op in capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines) {
			match op {
				DiffOp::Equal { len, .. } => push_line_op(&mut ops, LineOp::Keep { count: len }),
				DiffOp::Delete { old_len, .. } => {
					push_line_op(&mut ops, LineOp::Delete { count: old_len });
				}
				DiffOp::Insert {
					new_index, new_len, ..
				} => {
					push_line_op(&mut ops, LineOp::Insert {
						lines: to_owned_lines(&new_lines[new_index..new_index + new_len]),
					});
				}
				DiffOp::Replace {
					old_len,
					new_index,
					new_len,
					..
				} => {
					push_line_op(&mut ops, LineOp::Delete { count: old_len });
					push_line_op(&mut ops, LineOp::Insert {
						lines: to_owned_lines(&new_lines[new_index..new_index + new_len]),
					});
				}
			}
		}

		Self(ops)
	}

	pub fn apply(&self, old: &str) -> BundleResult<String> {
		let old_lines = split_lines(old);
		let mut cursor = 0;
		let mut result = String::with_capacity(old.len());

		for op in &self.0 {
			match op {
				LineOp::Keep { count } => {
					let end = checked_end(cursor, *count, old_lines.len(), "keep")?;
					for line in &old_lines[cursor..end] {
						result.push_str(line);
					}
					cursor = end;
				}
				LineOp::Delete { count } => {
					cursor = checked_end(cursor, *count, old_lines.len(), "delete")?;
				}
				LineOp::Insert { lines } => {
					for line in lines {
						result.push_str(line);
					}
				}
			}
		}

		if cursor != old_lines.len() {
			return Err(BundleError::DeltaMismatch(format!(
				"line delta covers {cursor} of {} baseline lines",
				old_lines.len()
			)));
		}

		Ok(result)
	}

	pub fn is_empty(&self) -> bool {
		self.0.iter().all(|op| matches!(op, LineOp::Keep { .. }))
	}
}

fn split_lines(text: &str) -> Vec<&str> {
	text.split_inclusive('\n').collect()
}

fn to_owned_lines(lines: &[&str]) -> Vec<String> {
	lines.iter().map(ToString::to_string).collect()
}

fn push_line_op(ops: &mut Vec<LineOp>, op: LineOp) {
	let merged = match (ops.last_mut(), &op) {
		(Some(LineOp::Keep { count }), LineOp::Keep { count: more })
		| (Some(LineOp::Delete { count }), LineOp::Delete { count: more }) => {
			*count += more;
			true
		}
		(Some(LineOp::Insert { lines }), LineOp::Insert { lines: more }) => {
			lines.extend(more.iter().cloned());
			true
		}
		_ => false,
	};

	if !merged {
		ops.push(op);
	}
}

fn checked_end(cursor: usize, count: usize, len: usize, op: &str) -> BundleResult<usize> {
	let end = cursor + count;
	if end > len {
		return Err(BundleError::DeltaMismatch(format!(
			"{op} of {count} at {cursor} runs past the {len} available items"
		)));
	}

	Ok(end)
}

/// A single step of an array delta, consumed in order against the baseline
/// array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ArrayOp {
	Keep { count: usize },
	Delete { count: usize },
	Insert { values: Vec<Value> },
	/// Rewrite the next baseline element in place.
	Patch { delta: Box<TreeDelta> },
}

/// A structural delta between two JSON trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum TreeDelta {
	/// Replace the value outright.
	Replace { value: Value },
	/// Remove the listed keys and patch or insert the changed ones.
	Object {
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		removed: Vec<String>,
		#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
		changed: BTreeMap<String, TreeDelta>,
	},
	Array { ops: Vec<ArrayOp> },
}

impl TreeDelta {
	/// Compute the delta turning `old` into `new`, or `None` when they are
	/// equal.
	pub fn compute(old: &Value, new: &Value) -> Option<Self> {
		if old == new {
			return None;
		}

		match (old, new) {
			(Value::Object(old), Value::Object(new)) => Some(diff_objects(old, new)),
			(Value::Array(old), Value::Array(new)) => Some(diff_arrays(old, new)),
			_ => Some(Self::Replace { value: new.clone() }),
		}
	}

	/// A delta that reproduces `value` unchanged.
	pub fn identity(value: &Value) -> Self {
		match value {
			Value::Object(_) => {
				Self::Object {
					removed: Vec::new(),
					changed: BTreeMap::new(),
				}
			}
			Value::Array(items) => {
				Self::Array {
					ops: vec![ArrayOp::Keep { count: items.len() }],
				}
			}
			other => Self::Replace { value: other.clone() },
		}
	}

	pub fn apply(&self, old: &Value) -> BundleResult<Value> {
		match (self, old) {
			(Self::Replace { value }, _) => Ok(value.clone()),
			(Self::Object { removed, changed }, Value::Object(map)) => {
				let mut map = map.clone();
				for key in removed {
					map.remove(key);
				}
				for (key, delta) in changed {
					let value = match map.get(key) {
						Some(current) => delta.apply(current)?,
						None => delta.apply(&Value::Null)?,
					};
					map.insert(key.clone(), value);
				}
				Ok(Value::Object(map))
			}
			(Self::Array { ops }, Value::Array(items)) => apply_array(ops, items).map(Value::Array),
			(Self::Object { .. }, other) => {
				Err(BundleError::DeltaMismatch(format!(
					"object delta applied to {}",
					value_kind(other)
				)))
			}
			(Self::Array { .. }, other) => {
				Err(BundleError::DeltaMismatch(format!(
					"array delta applied to {}",
					value_kind(other)
				)))
			}
		}
	}
}

fn diff_objects(old: &Map<String, Value>, new: &Map<String, Value>) -> TreeDelta {
	let removed = old
		.keys()
		.filter(|key| !new.contains_key(*key))
		.cloned()
		.collect();
	let mut changed = BTreeMap::new();

	for (key, value) in new {
		let delta = match old.get(key) {
			Some(current) => TreeDelta::compute(current, value),
			None => Some(TreeDelta::Replace { value: value.clone() }),
		};
		if let Some(delta) = delta {
			changed.insert(key.clone(), delta);
		}
	}

	TreeDelta::Object { removed, changed }
}

fn diff_arrays(old: &[Value], new: &[Value]) -> TreeDelta {
	// Elements are aligned by their compact JSON so that unchanged siblings
	// are kept and only the differing runs are patched.
	let old_keys: Vec<String> = old.iter().map(Value::to_string).collect();
	let new_keys: Vec<String> = new.iter().map(Value::to_string).collect();
	let mut ops = Vec::new();

	for op in capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys) {
		match op {
			DiffOp::Equal { len, .. } => push_array_op(&mut ops, ArrayOp::Keep { count: len }),
			DiffOp::Delete { old_len, .. } => {
				push_array_op(&mut ops, ArrayOp::Delete { count: old_len });
			}
			DiffOp::Insert {
				new_index, new_len, ..
			} => {
				push_array_op(&mut ops, ArrayOp::Insert {
					values: new[new_index..new_index + new_len].to_vec(),
				});
			}
			DiffOp::Replace {
				old_index,
				old_len,
				new_index,
				new_len,
			} => {
				if old_len == new_len {
					for offset in 0..old_len {
						let delta = TreeDelta::compute(&old[old_index + offset], &new[new_index + offset]);
						let op = match delta {
							Some(delta) => ArrayOp::Patch { delta: Box::new(delta) },
							None => ArrayOp::Keep { count: 1 },
						};
						push_array_op(&mut ops, op);
					}
				} else {
					push_array_op(&mut ops, ArrayOp::Delete { count: old_len });
					push_array_op(&mut ops, ArrayOp::Insert {
						values: new[new_index..new_index + new_len].to_vec(),
					});
				}
			}
		}
	}

	TreeDelta::Array { ops }
}

fn push_array_op(ops: &mut Vec<ArrayOp>, op: ArrayOp) {
	let merged = match (ops.last_mut(), &op) {
		(Some(ArrayOp::Keep { count }), ArrayOp::Keep { count: more })
		| (Some(ArrayOp::Delete { count }), ArrayOp::Delete { count: more }) => {
			*count += more;
			true
		}
		(Some(ArrayOp::Insert { values }), ArrayOp::Insert { values: more }) => {
			values.extend(more.iter().cloned());
			true
		}
		_ => false,
	};

	if !merged {
		ops.push(op);
	}
}

fn apply_array(ops: &[ArrayOp], items: &[Value]) -> BundleResult<Vec<Value>> {
	let mut cursor = 0;
	let mut result = Vec::with_capacity(items.len());

	for op in ops {
		match op {
			ArrayOp::Keep { count } => {
				let end = checked_end(cursor, *count, items.len(), "keep")?;
				result.extend_from_slice(&items[cursor..end]);
				cursor = end;
			}
			ArrayOp::Delete { count } => {
				cursor = checked_end(cursor, *count, items.len(), "delete")?;
			}
			ArrayOp::Insert { values } => result.extend(values.iter().cloned()),
			ArrayOp::Patch { delta } => {
				let end = checked_end(cursor, 1, items.len(), "patch")?;
				result.push(delta.apply(&items[cursor])?);
				cursor = end;
			}
		}
	}

	if cursor != items.len() {
		return Err(BundleError::DeltaMismatch(format!(
			"array delta covers {cursor} of {} baseline items",
			items.len()
		)));
	}

	Ok(result)
}

fn value_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}
