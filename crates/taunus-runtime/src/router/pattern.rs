//! Route pattern compilation.
//!
//! Patterns use the colon syntax shared with the server-side router:
//!
//! - `/articles` - exact match
//! - `/articles/:slug` - named parameter (a single path segment)
//! - `/articles/:slug?` - optional trailing parameter
//! - `/articles(/page/:page)` - optional group
//! - `/files/*` - splat, captures the rest of the path including `/`

use super::error::RouterError;
use std::collections::HashMap;

/// Maximum allowed length for a route pattern string in bytes.
const MAX_PATTERN_LENGTH: usize = 1024;

/// Maximum allowed number of path segments in a route pattern.
const MAX_PATH_SEGMENTS: usize = 32;

/// Maximum allowed size for a compiled pattern regex (in bytes).
const MAX_REGEX_SIZE: usize = 1 << 20;

/// A capture slot in a compiled pattern, in the order its group opens.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Capture {
	Param(String),
	Splat,
}

/// The values captured by a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
	/// Named parameters. Optional parameters that did not participate are absent.
	pub params: HashMap<String, String>,
	/// Splat values in pattern order.
	pub splats: Vec<String>,
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
	pattern: String,
	regex: regex::Regex,
	captures: Vec<Capture>,
}

impl RoutePattern {
	/// Compiles a pattern string.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InvalidPattern`] if the pattern is too long, has
	/// too many segments, has unbalanced groups or fails to compile.
	pub fn new(pattern: &str) -> Result<Self, RouterError> {
		let invalid = |reason: String| RouterError::InvalidPattern {
			pattern: pattern.to_string(),
			reason,
		};

		if pattern.len() > MAX_PATTERN_LENGTH {
			return Err(invalid(format!(
				"length {} exceeds maximum of {} bytes",
				pattern.len(),
				MAX_PATTERN_LENGTH
			)));
		}

		let segment_count = pattern.split('/').count();
		if segment_count > MAX_PATH_SEGMENTS {
			return Err(invalid(format!(
				"{} path segments, exceeding maximum of {}",
				segment_count, MAX_PATH_SEGMENTS
			)));
		}

		let (source, captures) = Self::compile(pattern).map_err(invalid)?;

		let regex = regex::RegexBuilder::new(&source)
			.size_limit(MAX_REGEX_SIZE)
			.build()
			.map_err(|e| invalid(e.to_string()))?;

		Ok(Self {
			pattern: pattern.to_string(),
			regex,
			captures,
		})
	}

	fn compile(pattern: &str) -> Result<(String, Vec<Capture>), String> {
		let mut source = String::from("^");
		let mut captures = Vec::new();
		let mut depth = 0usize;
		let mut chars = pattern.chars().peekable();

		while let Some(c) = chars.next() {
			match c {
				':' => {
					let mut name = String::new();
					while let Some(&next) = chars.peek() {
						if next.is_ascii_alphanumeric() || next == '_' {
							name.push(next);
							chars.next();
						} else {
							break;
						}
					}
					if name.is_empty() {
						return Err("parameter without a name".to_string());
					}

					if chars.peek() == Some(&'?') {
						chars.next();
						// `/:name?` makes the leading slash optional as well
						if source.ends_with("\\/") {
							source.truncate(source.len() - 2);
							source.push_str("(?:\\/([^/]+))?");
						} else {
							source.push_str("([^/]+)?");
						}
					} else {
						source.push_str("([^/]+)");
					}
					captures.push(Capture::Param(name));
				}
				'*' => {
					source.push_str("(.*?)");
					captures.push(Capture::Splat);
				}
				'(' => {
					depth += 1;
					source.push_str("(?:");
				}
				')' => {
					if depth == 0 {
						return Err("unbalanced ')'".to_string());
					}
					depth -= 1;
					source.push_str(")?");
				}
				'/' | '.' | '+' | '?' | '[' | ']' | '^' | '$' | '|' | '\\' | '{' | '}' => {
					source.push('\\');
					source.push(c);
				}
				_ => source.push(c),
			}
		}

		if depth != 0 {
			return Err("unbalanced '('".to_string());
		}

		source.push('$');
		Ok((source, captures))
	}

	/// Returns the original pattern string.
	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	/// Returns the named parameters in pattern order.
	pub fn param_names(&self) -> Vec<&str> {
		self.captures
			.iter()
			.filter_map(|c| match c {
				Capture::Param(name) => Some(name.as_str()),
				Capture::Splat => None,
			})
			.collect()
	}

	/// Attempts to match a decoded pathname against this pattern.
	pub fn matches(&self, pathname: &str) -> Option<Captures> {
		let caps = self.regex.captures(pathname)?;
		let mut out = Captures::default();

		for (index, capture) in self.captures.iter().enumerate() {
			let value = caps.get(index + 1).map(|m| decode(m.as_str()));
			match capture {
				Capture::Param(name) => {
					if let Some(value) = value {
						out.params.insert(name.clone(), value);
					}
				}
				Capture::Splat => out.splats.push(value.unwrap_or_default()),
			}
		}

		Some(out)
	}

	/// Checks if this pattern would match the given pathname.
	pub fn is_match(&self, pathname: &str) -> bool {
		self.regex.is_match(pathname)
	}
}

fn decode(segment: &str) -> String {
	urlencoding::decode(segment)
		.map(|s| s.into_owned())
		.unwrap_or_else(|_| segment.to_string())
}

impl PartialEq for RoutePattern {
	fn eq(&self, other: &Self) -> bool {
		self.pattern == other.pattern
	}
}

impl Eq for RoutePattern {}

impl std::fmt::Display for RoutePattern {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.pattern)
	}
}
