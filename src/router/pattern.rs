//! Route pattern compilation and matching.
//!
//! | Pattern                    | Example match            | Captured args                      |
//! |----------------------------|--------------------------|------------------------------------|
//! | `/users`                   | `/users`                 | *(none)*                           |
//! | `/users/:id`               | `/users/42`              | `id → "42"`                        |
//! | `/test/<user>/<name>`      | `/test/remote/pixel`     | `user → "remote"`, `name → "pixel"` |
//! | `/tiles/<int:z>/<float:s>` | `/tiles/3/1.5`           | `z → 3`, `s → 1.5`                 |
//! | `/files/*`                 | `/files/docs/readme.txt` | `wildcard → "/docs/readme.txt"`    |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.

use serde_json::{Number, Value};

use super::RouteError;
use crate::context::Arguments;

/// Value type of a path placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamKind {
    String,
    Int,
    Float,
    Uuid,
}

impl ParamKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "uuid" => Some(Self::Uuid),
            _ => None,
        }
    }

    // Convert one path segment, `None` if it does not fit the type.
    fn convert(self, segment: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(segment.to_owned())),
            Self::Int => segment.parse::<i64>().ok().map(Value::from),
            Self::Float => segment
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            Self::Uuid => is_uuid(segment).then(|| Value::String(segment.to_owned())),
        }
    }
}

// 8-4-4-4-12 hex digits.
fn is_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

// A single path segment, either a literal string or a named capture.
#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Static(String),
    Parameter { name: String, kind: ParamKind },
}

impl Segment {
    fn parse(pattern: &str, raw: &str) -> Result<Self, RouteError> {
        if let Some(name) = raw.strip_prefix(':') {
            return Self::parameter(pattern, name, ParamKind::String);
        }

        let Some(inner) = raw.strip_prefix('<').and_then(|s| s.strip_suffix('>')) else {
            if raw.contains(['<', '>']) {
                return Err(invalid(pattern, format!("unbalanced placeholder {raw:?}")));
            }
            return Ok(Segment::Static(raw.to_owned()));
        };

        match inner.split_once(':') {
            Some((kind, name)) => {
                let kind = ParamKind::parse(kind)
                    .ok_or_else(|| invalid(pattern, format!("unknown placeholder type {kind:?}")))?;
                Self::parameter(pattern, name, kind)
            }
            None => Self::parameter(pattern, inner, ParamKind::String),
        }
    }

    fn parameter(pattern: &str, name: &str, kind: ParamKind) -> Result<Self, RouteError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid(pattern, format!("invalid placeholder name {name:?}")));
        }
        Ok(Segment::Parameter {
            name: name.to_owned(),
            kind,
        })
    }
}

fn invalid(pattern: &str, reason: String) -> RouteError {
    RouteError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason,
    }
}

// Strip a trailing slash from anything but the root path.
pub(crate) fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

/// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    // Matches one exact path string, e.g. `/users`.
    Exact(String),
    // Matches a fixed number of segments where some are captures, e.g. `/users/<int:id>`.
    Parameterized { segments: Vec<Segment> },
    // Matches any path that starts with the given prefix, e.g. `/files/*`.
    Wildcard(String),
}

impl Pattern {
    /// Parse a route pattern string.
    ///
    /// The pattern is classified as follows (checked in order):
    ///
    /// 1. Ends with `/*` → [`Pattern::Wildcard`].
    /// 2. Contains `:` or `<` → [`Pattern::Parameterized`].
    /// 3. Otherwise → [`Pattern::Exact`].
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] for malformed placeholders or unknown
    /// placeholder types.
    pub(crate) fn parse(pattern: &str) -> Result<Self, RouteError> {
        if !pattern.starts_with('/') {
            return Err(invalid(pattern, "pattern must start with '/'".to_owned()));
        }
        let normalized = normalize(pattern);

        if let Some(prefix) = normalized.strip_suffix("/*") {
            return Ok(Pattern::Wildcard(prefix.to_owned()));
        }

        if normalized.contains([':', '<', '>']) {
            let segments = normalized
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| Segment::parse(pattern, s))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Pattern::Parameterized { segments });
        }

        Ok(Pattern::Exact(normalized.to_owned()))
    }

    // Try to match `path`, returning the captured arguments on success.
    pub(crate) fn matches(&self, path: &str) -> Option<Arguments> {
        let path = normalize(path);

        match self {
            Pattern::Exact(p) => (p == path).then(Arguments::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut args = Arguments::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) => {
                            if s != path_seg {
                                return None;
                            }
                        }
                        Segment::Parameter { name, kind } => {
                            args.insert(name.clone(), kind.convert(path_seg)?);
                        }
                    }
                }
                Some(args)
            }
            Pattern::Wildcard(prefix) => {
                let suffix = path.strip_prefix(prefix.as_str())?;
                if !suffix.is_empty() && !suffix.starts_with('/') {
                    return None;
                }
                let mut args = Arguments::new();
                args.insert("wildcard", suffix);
                Some(args)
            }
        }
    }
}
