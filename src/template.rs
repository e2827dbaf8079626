//! Route template compiler.
//!
//! A template like `/users/:id/ships/:type` is compiled once, at
//! registration time, into a segment-wise matcher plus an ordered list of
//! parameter descriptors. Matching at request time is a single split of the
//! concrete path — no backtracking, no per-request allocation beyond the
//! extracted values.
//!
//! Template syntax is deliberately small: a segment is either a literal,
//! matched verbatim, or `:name`, matching any non-empty run of
//! non-separator characters. Nothing else — no wildcards, no inline
//! patterns.
//!
//! The descriptor list is collected in the same left-to-right pass that
//! builds the matcher, so descriptor order always equals template order.
//! Extraction re-splits the concrete path and reads off recorded segment
//! indices, which keeps two adjacent parameters apart by position alone.

use std::fmt;

/// One compiled template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Must equal the concrete path segment verbatim.
    Literal(String),
    /// Matches any non-empty segment; the value is captured.
    Param(String),
}

/// Position and name of one `:name` segment within a template.
///
/// `position` is the index among *all* segments of the template, which is
/// exactly what extraction needs when it re-splits a concrete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParamDescriptor {
    pub position: usize,
    pub name: String,
}

/// A compiled route template: matcher plus ordered parameter descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompiledPath {
    segments: Vec<Segment>,
    params: Vec<ParamDescriptor>,
}

/// Rejected template at registration time.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template must start with '/': `{0}`")]
    MissingLeadingSlash(String),
    #[error("empty segment in template `{0}`")]
    EmptySegment(String),
    #[error("parameter `:{0}` has no name")]
    UnnamedParam(String),
    #[error("duplicate parameter name `{0}`")]
    DuplicateParam(String),
}

impl CompiledPath {
    /// Compiles a template in one left-to-right pass.
    ///
    /// The root template `/` compiles to zero segments and matches only the
    /// root path.
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        let Some(rest) = template.strip_prefix('/') else {
            return Err(TemplateError::MissingLeadingSlash(template.to_owned()));
        };

        let mut segments = Vec::new();
        let mut params = Vec::new();

        if !rest.is_empty() {
            for (position, raw) in rest.split('/').enumerate() {
                if raw.is_empty() {
                    return Err(TemplateError::EmptySegment(template.to_owned()));
                }
                match raw.strip_prefix(':') {
                    Some("") => return Err(TemplateError::UnnamedParam(template.to_owned())),
                    Some(name) => {
                        if params.iter().any(|p: &ParamDescriptor| p.name == name) {
                            return Err(TemplateError::DuplicateParam(name.to_owned()));
                        }
                        params.push(ParamDescriptor { position, name: name.to_owned() });
                        segments.push(Segment::Param(name.to_owned()));
                    }
                    None => segments.push(Segment::Literal(raw.to_owned())),
                }
            }
        }

        Ok(Self { segments, params })
    }

    /// Number of `:name` segments. Used for deterministic route selection:
    /// fewer parameters means more specific.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Whether `path` matches this template exactly, end to end.
    ///
    /// A trailing `?query` on the concrete path is tolerated and ignored.
    pub fn matches(&self, path: &str) -> bool {
        let Some(concrete) = split_path(path) else {
            return false;
        };
        if concrete.len() != self.segments.len() {
            return false;
        }
        self.segments.iter().zip(&concrete).all(|(seg, got)| match seg {
            Segment::Literal(lit) => lit == got,
            Segment::Param(_) => !got.is_empty(),
        })
    }

    /// Extracts parameter values from a path already known to match.
    ///
    /// Re-splits the concrete path and reads off the recorded positions,
    /// yielding `(name, value)` pairs in template-declared order.
    pub fn extract<'p>(&self, path: &'p str) -> Vec<(&str, &'p str)> {
        let Some(concrete) = split_path(path) else {
            return Vec::new();
        };
        self.params
            .iter()
            .filter_map(|p| concrete.get(p.position).map(|v| (p.name.as_str(), *v)))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn descriptors(&self) -> &[ParamDescriptor] {
        &self.params
    }
}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            match seg {
                Segment::Literal(lit) => write!(f, "/{lit}")?,
                Segment::Param(name) => write!(f, "/:{name}")?,
            }
        }
        if self.segments.is_empty() {
            f.write_str("/")?;
        }
        Ok(())
    }
}

/// Splits a concrete request path into segments, dropping any query string.
///
/// Returns `None` for paths that do not start with `/` — those can never
/// match a template. The root path `/` yields an empty segment list.
fn split_path(path: &str) -> Option<Vec<&str>> {
    let path = path.split('?').next().unwrap_or(path);
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    Some(rest.split('/').collect())
}
