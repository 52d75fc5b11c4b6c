//! Dotted data paths
//!
//! Provides [`DataPath`] for locating a field's value inside a nested payload,
//! plus the writer ([`write_path`]) and reader ([`read_path`]) that move values
//! between a flat field map and a nested JSON object.
//!
//! # The `profile` prefix
//!
//! The caller's top-level object already *is* the profile. A leading
//! [`PROFILE_PREFIX`] segment is therefore consumed at parse time and never
//! creates a nesting level: `profile.personal.age` and `personal.age` address
//! the same slot.

use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Leading segment that refers to the target object itself
pub const PROFILE_PREFIX: &str = "profile";

/// Parsed location inside a nested payload
///
/// Segments are stored after the [`PROFILE_PREFIX`] rule has been applied, so
/// two spellings of the same location compare equal.
///
/// # Examples
/// - `profile.personal.first_name` → `personal.first_name`
/// - `citizenship` → `citizenship`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataPath(Vec<String>);

impl DataPath {
    /// Parse a dotted path, failing fast on malformed input
    ///
    /// # Errors
    /// - [`PathError::Empty`] for `""`
    /// - [`PathError::EmptySegment`] for `a..b`, `.a`, `a.`
    /// - [`PathError::NoTarget`] when nothing remains after the prefix (`profile`)
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = raw
            .split('.')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment(raw.to_string()))
                } else {
                    Ok(seg.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if segments.first().map(String::as_str) == Some(PROFILE_PREFIX) {
            segments.remove(0);
        }

        if segments.is_empty() {
            return Err(PathError::NoTarget(raw.to_string()));
        }

        Ok(Self(segments))
    }

    /// Get path segments (prefix already removed)
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a parsed path; kept for API symmetry with `len`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get last segment, the key that receives the value
    #[inline]
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    /// Check if this path is a prefix of another
    ///
    /// # Examples
    /// - `personal` is prefix of `personal.age`
    /// - `personal` is NOT prefix of `personality`
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Check if paths overlap (one is prefix of the other)
    ///
    /// Overlapping paths cannot both be written: the deeper write replaces the
    /// shallower value with an object, or the shallower write discards the
    /// deeper object.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl Display for DataPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for DataPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Assign `value` at `path` inside `target`
///
/// Missing intermediate segments, and intermediates holding non-object values,
/// are (re)initialized as empty objects before descending. The leaf is always
/// overwritten. A non-object `target` is itself replaced by an empty object.
pub fn write_path(target: &mut Value, path: &DataPath, value: Value) {
    let Some((leaf, parents)) = path.segments().split_last() else {
        return;
    };

    let mut cursor = ensure_object(target);
    for segment in parents {
        let slot = cursor.entry(segment.clone()).or_insert(Value::Null);
        cursor = ensure_object(slot);
    }
    cursor.insert(leaf.clone(), value);
}

/// Read the value at `path` inside `source`
///
/// Returns `None` as soon as the cursor is not an object (including `null`) or
/// a key is missing. An explicit `null` at the leaf is returned as
/// `Some(&Value::Null)`.
#[must_use]
pub fn read_path<'a>(source: &'a Value, path: &DataPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(source, |cursor, segment| cursor.as_object()?.get(segment))
}

/// Parse `path` and write `value` there
///
/// # Errors
/// Returns the parse error for malformed paths; nothing is written.
pub fn set_nested(target: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    let path = DataPath::parse(path)?;
    write_path(target, &path, value);
    Ok(())
}

/// Parse `path` and read from `source`
///
/// Malformed paths read as not found.
#[must_use]
pub fn get_nested<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    let path = DataPath::parse(path).ok()?;
    read_path(source, &path)
}

fn ensure_object(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just set to an object"),
    }
}

/// Errors related to data paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path string is empty
    #[error("data path is empty")]
    Empty,

    /// Empty segment in path
    #[error("data path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Only the profile prefix was given
    #[error("data path '{0}' has no segment after the 'profile' prefix")]
    NoTarget(String),
}
