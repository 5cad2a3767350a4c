//! Structural paths and the ordered [`PathMatcher`].
//!
//! A [`Path`] is a sequence of non-empty components parsed from a delimited
//! string (default delimiter `/`). Two paths are equal iff their stored
//! strings are equal; component-level parsing only matters for matching and
//! editing operations.

use std::fmt;

/// A structural path: an ordered, non-empty-component sequence plus the
/// original string it was parsed from.
#[derive(Debug, Clone)]
pub struct Path {
    raw: String,
    delimiter: char,
    segments: Vec<String>,
}

impl Path {
    /// Parse a path using the default `/` delimiter.
    pub fn new(raw: impl Into<String>) -> Self {
        Self::with_delimiter(raw, '/')
    }

    /// Parse a path using a custom delimiter, discarding empty segments
    /// (so `"/a//b/"` and `"a/b"` both yield `["a", "b"]`).
    pub fn with_delimiter(raw: impl Into<String>, delimiter: char) -> Self {
        let raw = raw.into();
        let segments = raw
            .split(delimiter)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            raw,
            delimiter,
            segments,
        }
    }

    /// The path's segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The original string this path was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The last segment, if any.
    pub fn last_component(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The last component without its extension (the part before the final `.`).
    pub fn stem(&self) -> Option<&str> {
        self.last_component().map(|last| match last.rfind('.') {
            Some(0) | None => last,
            Some(idx) => &last[..idx],
        })
    }

    /// The extension of the last component (after the final `.`), if any and
    /// if it is not itself the whole (dotfile) name.
    pub fn extension(&self) -> Option<&str> {
        self.last_component().and_then(|last| match last.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&last[idx + 1..]),
        })
    }

    /// Whether this path's segments begin with `prefix`'s segments.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        prefix.segments.len() <= self.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Whether this path's segments end with `suffix`'s segments.
    pub fn ends_with(&self, suffix: &Path) -> bool {
        suffix.segments.len() <= self.segments.len()
            && self.segments[self.segments.len() - suffix.segments.len()..] == suffix.segments[..]
    }

    /// A new path with the first segment removed.
    pub fn removing_first(&self) -> Path {
        self.rebuild(self.segments.iter().skip(1).cloned().collect())
    }

    /// A new path with the last segment removed.
    pub fn removing_last(&self) -> Path {
        let len = self.segments.len().saturating_sub(1);
        self.rebuild(self.segments[..len].to_vec())
    }

    /// A new path with additional segments appended.
    pub fn appending(&self, components: impl IntoIterator<Item = impl Into<String>>) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(components.into_iter().map(Into::into));
        self.rebuild(segments)
    }

    fn rebuild(&self, segments: Vec<String>) -> Path {
        let raw = segments.join(&self.delimiter.to_string());
        Path {
            raw,
            delimiter: self.delimiter,
            segments,
        }
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Path {}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// One component of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathComponent {
    /// Matches exactly this literal segment.
    Constant(String),
    /// Matches any single segment, without binding it.
    Anything,
    /// Matches any single segment and binds it under `name`.
    Parameter(String),
    /// Matches and terminates the match successfully against one or more
    /// remaining request segments. A trailing catch-all with nothing left to
    /// consume does not match: `/files/**` matches `/files/a` but not `/files`.
    CatchAll,
}

impl PathComponent {
    fn parse(segment: &str) -> Self {
        if segment == "*" {
            PathComponent::Anything
        } else if segment == "**" {
            PathComponent::CatchAll
        } else if let Some(name) = segment.strip_prefix(':') {
            PathComponent::Parameter(name.to_string())
        } else if segment.starts_with('{') && segment.ends_with('}') && segment.len() >= 2 {
            PathComponent::Parameter(segment[1..segment.len() - 1].to_string())
        } else {
            PathComponent::Constant(segment.to_string())
        }
    }
}

/// The outcome of a successful [`PathMatcher::parse`] call: the bound
/// parameters (by name and by position) and the caller-supplied producer
/// value for the pattern that matched.
#[derive(Debug, Clone)]
pub struct MatchResult<R> {
    /// Named parameter bindings, in left-to-right order of appearance.
    pub params: Vec<(String, String)>,
    /// The value registered alongside the pattern that matched.
    pub producer: R,
}

impl<R> MatchResult<R> {
    /// Look up a named parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a parameter by its positional index among named parameters.
    pub fn param_at(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(|(_, v)| v.as_str())
    }
}

struct Entry<R> {
    pattern: Vec<PathComponent>,
    producer: R,
}

/// An ordered collection of `(pattern, producer)` pairs, matched first-wins.
///
/// Registration order is part of the documented contract: `constant` only
/// beats `anything` because it was registered earlier, never because of an
/// implicit specificity ranking. Callers must not rely on reordering.
pub struct PathMatcher<R> {
    delimiter: char,
    case_sensitive: bool,
    entries: Vec<Entry<R>>,
}

impl<R> Default for PathMatcher<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> PathMatcher<R> {
    /// An empty matcher using `/` as the delimiter, case-sensitive.
    pub fn new() -> Self {
        Self {
            delimiter: '/',
            case_sensitive: true,
            entries: Vec::new(),
        }
    }

    /// An empty matcher with case-insensitive `constant` matching.
    pub fn case_insensitive() -> Self {
        Self {
            delimiter: '/',
            case_sensitive: false,
            entries: Vec::new(),
        }
    }

    /// Register a pattern string, parsing it into [`PathComponent`]s.
    ///
    /// Empty segments (from leading/trailing/duplicated delimiters) are
    /// discarded, same as [`Path`] parsing.
    pub fn register(&mut self, pattern: &str, producer: R) {
        let components = pattern
            .split(self.delimiter)
            .filter(|s| !s.is_empty())
            .map(PathComponent::parse)
            .collect();
        self.entries.push(Entry {
            pattern: components,
            producer,
        });
    }

    /// Find the first registered pattern (in registration order) that
    /// matches `path`, returning its bound parameters and producer.
    pub fn parse(&self, path: &str) -> Option<MatchResult<&R>>
    where
        R: Sized,
    {
        let segments: Vec<&str> = path
            .split(self.delimiter)
            .filter(|s| !s.is_empty())
            .collect();

        for entry in &self.entries {
            if let Some(params) = self.match_pattern(&entry.pattern, &segments) {
                return Some(MatchResult {
                    params,
                    producer: &entry.producer,
                });
            }
        }
        None
    }

    /// Iterate over registered patterns in registration order (for
    /// diagnostics, e.g. listing installed routes).
    pub fn routes(&self) -> impl Iterator<Item = &[PathComponent]> {
        self.entries.iter().map(|e| e.pattern.as_slice())
    }

    fn match_pattern(
        &self,
        pattern: &[PathComponent],
        segments: &[&str],
    ) -> Option<Vec<(String, String)>> {
        let mut params = Vec::new();
        let mut si = 0usize;

        for (pi, component) in pattern.iter().enumerate() {
            if let PathComponent::CatchAll = component {
                return if si < segments.len() { Some(params) } else { None };
            }

            let Some(segment) = segments.get(si) else {
                return None;
            };

            match component {
                PathComponent::Constant(c) => {
                    let matches = if self.case_sensitive {
                        c == segment
                    } else {
                        c.eq_ignore_ascii_case(segment)
                    };
                    if !matches {
                        return None;
                    }
                }
                PathComponent::Anything => {}
                PathComponent::Parameter(name) => {
                    params.push((name.clone(), (*segment).to_string()));
                }
                PathComponent::CatchAll => unreachable!("handled above"),
            }

            si += 1;
            let _ = pi;
        }

        if si == segments.len() {
            Some(params)
        } else {
            None
        }
    }
}
