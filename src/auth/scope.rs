//! Scope parsing shared by the token flows and stored auth configuration.

// std
use std::slice::Iter;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Scope requested when neither the caller nor the environment names one.
pub const DEFAULT_SCOPE: &str = "rest_webservices";

/// Errors emitted when parsing scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeError {
	/// The scope string contained nothing but quotes and whitespace.
	#[error("Scope cannot be empty.")]
	Empty,
}

/// Ordered, de-duplicated list of OAuth scopes.
///
/// Values are accepted the way they show up in shells and CI variables: surrounding single or
/// double quotes are stripped, entries are split on whitespace, and repeated entries keep their
/// first position. The wire and storage form is the space-delimited string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Scope(Arc<[String]>);
impl Scope {
	/// Parses a raw scope string.
	pub fn parse(raw: &str) -> Result<Self, ScopeError> {
		let mut scopes = Vec::<String>::new();

		for entry in strip_quotes(raw.trim()).split_whitespace() {
			if !scopes.iter().any(|existing| existing == entry) {
				scopes.push(entry.to_owned());
			}
		}

		if scopes.is_empty() {
			return Err(ScopeError::Empty);
		}

		Ok(Self(Arc::from(scopes)))
	}

	/// Picks the first non-blank candidate, falling back to [`DEFAULT_SCOPE`].
	pub fn resolve<'a, I>(candidates: I) -> Self
	where
		I: IntoIterator<Item = Option<&'a str>>,
	{
		candidates
			.into_iter()
			.flatten()
			.find_map(|candidate| Self::parse(candidate).ok())
			.unwrap_or_default()
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the scope list contains `scope`.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.iter().any(|candidate| candidate == scope)
	}

	/// Iterator over scopes in request order.
	pub fn iter(&self) -> Iter<'_, String> {
		self.0.iter()
	}

	/// Returns the space-delimited representation.
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}
}
impl Default for Scope {
	fn default() -> Self {
		Self(Arc::from([DEFAULT_SCOPE.to_owned()]))
	}
}
impl Debug for Scope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Scope").field(&self.0).finish()
	}
}
impl Display for Scope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for Scope {
	type Err = ScopeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl Serialize for Scope {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.normalized())
	}
}
impl<'de> Deserialize<'de> for Scope {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Scope::parse(&raw).map_err(DeError::custom)
	}
}

fn strip_quotes(value: &str) -> &str {
	for quote in ['"', '\''] {
		if let Some(inner) =
			value.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote))
		{
			return inner;
		}
	}

	value
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scopes_strip_quotes_and_dedupe_in_order() {
		let scope = Scope::parse("\"restlets rest_webservices restlets\"")
			.expect("Quoted scope string should parse.");

		assert_eq!(scope.normalized(), "restlets rest_webservices");
		assert_eq!(scope.len(), 2);
		assert!(scope.contains("restlets"));

		let single = Scope::parse("'rest_webservices'").expect("Single quotes should be stripped.");

		assert_eq!(single.normalized(), "rest_webservices");
	}

	#[test]
	fn blank_scopes_are_rejected() {
		assert_eq!(Scope::parse("   "), Err(ScopeError::Empty));
		assert_eq!(Scope::parse("\"\""), Err(ScopeError::Empty));
	}

	#[test]
	fn resolve_prefers_first_usable_candidate() {
		assert_eq!(Scope::resolve([None, Some("  "), Some("restlets")]).normalized(), "restlets");
		assert_eq!(Scope::resolve([None, None]).normalized(), DEFAULT_SCOPE);
	}

	#[test]
	fn serde_uses_space_delimited_string() {
		let scope = Scope::parse("restlets rest_webservices").expect("Scope should parse.");
		let json = serde_json::to_string(&scope).expect("Scope should serialize.");

		assert_eq!(json, "\"restlets rest_webservices\"");

		let back: Scope = serde_json::from_str(&json).expect("Scope should deserialize.");

		assert_eq!(back, scope);
	}
}
