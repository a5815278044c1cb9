//! Resource descriptors: URI templates plus parameters.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;

/// Identifies one resource to stream: a URI template and its parameters.
///
/// Templates name their parameters with `{name}`; `{{` and `}}` are literal
/// braces. A template may start with `protocol://` to pick a transport,
/// e.g. `settings://consul:token`. Without one the manager's default
/// protocol is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
	template: String,
	params: BTreeMap<String, String>,
}

impl Descriptor {
	/// Creates a descriptor with no parameters.
	pub fn new(template: impl Into<String>) -> Self {
		Self {
			template: template.into(),
			params: BTreeMap::new(),
		}
	}

	/// Adds one parameter.
	#[must_use]
	pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.insert(name.into(), value.into());
		self
	}

	/// Adds every parameter from `params`.
	#[must_use]
	pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.params.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
		self
	}

	/// The template as given to [`Descriptor::new`].
	pub fn template(&self) -> &str {
		&self.template
	}

	/// Resolves the template into a concrete URI.
	///
	/// The protocol comes from the literal template only; parameter values
	/// are always part of the path.
	pub fn resolve(&self, default_protocol: &str) -> Result<ResourceUri, ConfigError> {
		let template = self.template.as_str();
		let (protocol, body) = split_protocol(template).unwrap_or((default_protocol, template));
		let path = self.expand(body, template.len() - body.len())?;
		Ok(ResourceUri {
			protocol: protocol.to_owned(),
			path,
		})
	}

	/// Substitutes placeholders in `template`, which starts `base` bytes
	/// into the full template.
	fn expand(&self, template: &str, base: usize) -> Result<String, ConfigError> {
		let mut out = String::with_capacity(template.len());
		let mut chars = template.char_indices().peekable();

		while let Some((offset, ch)) = chars.next() {
			match ch {
				'{' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
					chars.next();
					out.push('{');
				}
				'}' if chars.peek().is_some_and(|&(_, next)| next == '}') => {
					chars.next();
					out.push('}');
				}
				'{' => {
					let start = offset + 1;
					let end = loop {
						match chars.next() {
							Some((end, '}')) => break end,
							Some((_, '{')) | None => return Err(self.malformed(base + offset)),
							Some(_) => {}
						}
					};
					let name = template[start..end].trim();
					if name.is_empty() {
						return Err(self.malformed(base + offset));
					}
					let value = self.params.get(name).ok_or_else(|| ConfigError::UnresolvedPlaceholder {
						name: name.to_owned(),
						template: self.template.clone(),
					})?;
					if value.is_empty() {
						return Err(ConfigError::EmptyParameter {
							name: name.to_owned(),
							template: self.template.clone(),
						});
					}
					out.push_str(value);
				}
				'}' => return Err(self.malformed(base + offset)),
				other => out.push(other),
			}
		}

		Ok(out)
	}

	fn malformed(&self, offset: usize) -> ConfigError {
		ConfigError::MalformedTemplate {
			offset,
			template: self.template.clone(),
		}
	}
}

fn split_protocol(uri: &str) -> Option<(&str, &str)> {
	let (protocol, rest) = uri.split_once("://")?;
	let valid = !protocol.is_empty() && protocol.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
	valid.then_some((protocol, rest))
}

/// A fully resolved resource URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceUri {
	protocol: String,
	path: String,
}

impl ResourceUri {
	/// Builds a URI from its parts; `path` excludes the `protocol://` prefix.
	pub fn new(protocol: impl Into<String>, path: impl Into<String>) -> Self {
		Self {
			protocol: protocol.into(),
			path: path.into(),
		}
	}

	/// Transport protocol, e.g. `consul` or `settings`.
	pub fn protocol(&self) -> &str {
		&self.protocol
	}

	/// Everything after `protocol://`.
	pub fn path(&self) -> &str {
		&self.path
	}
}

impl fmt::Display for ResourceUri {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}://{}", self.protocol, self.path)
	}
}
