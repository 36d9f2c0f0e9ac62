//! Route template compilation and matching.
//!
//! A template such as `/posts/{id}/comments/{comment}` is split into literal
//! and placeholder segments and compiled into an anchored regex where every
//! placeholder captures exactly one non-empty segment. Placeholder names are
//! kept in capture order so extraction is positional.
use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::{RoutingError, RoutingResult};

/// Extracted route parameters, ordered by name.
pub type RouteParams = BTreeMap<String, String>;

static PLACEHOLDER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid placeholder regex"));

/// One `/`-separated piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

/// Result of matching a path against one pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchResult {
    matched: bool,
    params: RouteParams,
}

impl MatchResult {
    pub fn matched(params: RouteParams) -> Self {
        Self {
            matched: true,
            params,
        }
    }

    pub fn unmatched() -> Self {
        Self::default()
    }

    pub fn is_match(&self) -> bool {
        self.matched
    }

    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    pub fn into_params(self) -> RouteParams {
        self.params
    }
}

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    template: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
    regex: Regex,
}

impl CompiledPattern {
    /// Compile a template, rejecting malformed ones with every problem found.
    pub fn compile(template: &str) -> RoutingResult<Self> {
        let violations = template_violations(template);
        if !violations.is_empty() {
            return Err(RoutingError::InvalidPattern {
                pattern: template.to_string(),
                reason: violations.join("; "),
            });
        }

        let segments = split_segments(template);
        let param_names = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect();
        let regex = Regex::new(&regex_source(&segments)).map_err(|e| {
            RoutingError::InvalidPattern {
                pattern: template.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            template: template.to_string(),
            segments,
            param_names,
            regex,
        })
    }

    /// Rebuild a pattern from a previously compiled regex and parameter list
    /// without re-validating the template. The stored regex and names must be
    /// exactly what `template` compiles to.
    pub fn from_parts(
        template: &str,
        regex_source_text: &str,
        param_names: Vec<String>,
    ) -> RoutingResult<Self> {
        let mismatch = |reason: &str| RoutingError::InvalidPattern {
            pattern: template.to_string(),
            reason: reason.to_string(),
        };

        let segments = split_segments(template);
        if regex_source(&segments) != regex_source_text {
            return Err(mismatch("stored regex does not match the template"));
        }
        let expected_names = segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name),
            Segment::Literal(_) => None,
        });
        if !expected_names.eq(param_names.iter()) {
            return Err(mismatch("stored parameter names do not match the template"));
        }

        let regex = Regex::new(regex_source_text).map_err(|e| mismatch(&e.to_string()))?;

        Ok(Self {
            template: template.to_string(),
            segments,
            param_names,
            regex,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn regex_source(&self) -> &str {
        self.regex.as_str()
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_static(&self) -> bool {
        self.param_names.is_empty()
    }

    /// Match a concrete request path. Captured values are percent-decoded.
    pub fn match_path(&self, path: &str) -> MatchResult {
        let Some(captures) = self.regex.captures(path) else {
            return MatchResult::unmatched();
        };

        let params = self
            .param_names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                captures
                    .get(i + 1)
                    .map(|m| (name.clone(), decode_segment(m.as_str())))
            })
            .collect();

        MatchResult::matched(params)
    }

    /// Substitute every placeholder with its value from `params`. An empty
    /// value counts as missing since a placeholder never matches an empty
    /// segment.
    ///
    /// Params not consumed by a placeholder are appended as a query string
    /// (sorted by key), followed by the pairs in `query`.
    pub fn generate_url(&self, params: &RouteParams, query: Option<&RouteParams>) -> RoutingResult<String> {
        let mut path = String::with_capacity(self.template.len());

        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Param(name) => {
                    let value = params.get(name).filter(|v| !v.is_empty()).ok_or_else(|| {
                        RoutingError::MissingRouteParameter {
                            route: self.template.clone(),
                            parameter: name.clone(),
                        }
                    })?;
                    path.push_str(&urlencoding::encode(value));
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }

        let extra = params
            .iter()
            .filter(|(key, _)| !self.param_names.contains(*key));
        let explicit = query.into_iter().flat_map(|q| q.iter());
        let mut pairs = extra.chain(explicit).peekable();

        if pairs.peek().is_some() {
            let query_string = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            path.push('?');
            path.push_str(&query_string);
        }

        Ok(path)
    }
}

/// Every syntax problem in a template. Empty means the template compiles.
pub fn template_violations(template: &str) -> Vec<String> {
    let mut violations = Vec::new();

    let Some(rest) = template.strip_prefix('/') else {
        violations.push(format!("path '{template}' must start with '/'"));
        return violations;
    };
    if rest.is_empty() {
        return violations;
    }

    let pieces: Vec<&str> = rest.split('/').collect();
    let mut seen = HashSet::new();

    for (index, piece) in pieces.iter().enumerate() {
        let is_last = index + 1 == pieces.len();
        if piece.is_empty() {
            // A single trailing slash is a literal, `//` is not.
            if !is_last {
                violations.push(format!("path '{template}' contains an empty segment"));
            }
            continue;
        }

        let has_braces = piece.contains('{') || piece.contains('}');
        if !has_braces {
            continue;
        }

        match piece
            .strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
        {
            Some(name) if !name.contains('{') && !name.contains('}') => {
                if name.is_empty() {
                    violations.push(format!("path '{template}' has an empty placeholder"));
                } else if !PLACEHOLDER_NAME.is_match(name) {
                    violations.push(format!("placeholder '{{{name}}}' has an invalid name"));
                } else if !seen.insert(name.to_string()) {
                    violations.push(format!("placeholder '{{{name}}}' is declared more than once"));
                }
            }
            _ => violations.push(format!(
                "segment '{piece}' must be either literal text or a single '{{name}}' placeholder"
            )),
        }
    }

    violations
}

fn split_segments(template: &str) -> Vec<Segment> {
    let rest = template.strip_prefix('/').unwrap_or(template);
    if rest.is_empty() {
        return Vec::new();
    }

    rest.split('/')
        .map(|piece| {
            match piece
                .strip_prefix('{')
                .and_then(|inner| inner.strip_suffix('}'))
            {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(piece.to_string()),
            }
        })
        .collect()
}

fn regex_source(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "^/$".to_string();
    }

    let mut source = String::from("^");
    for segment in segments {
        source.push('/');
        match segment {
            Segment::Literal(text) => source.push_str(&regex::escape(text)),
            Segment::Param(_) => source.push_str("([^/]+)"),
        }
    }
    source.push('$');
    source
}

fn decode_segment(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}
