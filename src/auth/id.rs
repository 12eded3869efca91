//! Strongly typed identifiers for credential names and NetSuite accounts.

// std
use std::{borrow::Borrow, ops::Deref, sync::LazyLock};
// crates.io
use regex::Regex;
// self
use crate::_prelude::*;

macro_rules! identifier {
	($name:ident, $kind:literal, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `value` and wraps it.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				check($kind, value.into()).map(Self)
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				self.0.as_str()
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.0.as_str()
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				self.0.as_str()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				Display::fmt(&self.0, f)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({:?})", stringify!($name), self.0)
			}
		}
	};
}

const MAX_IDENTIFIER_LEN: usize = 128;

static SANDBOX_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)^(.+)-(sb|rp)(\d+)$").expect("Sandbox suffix pattern is valid.")
});

/// Rejected identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Nothing was provided.
	#[error("{kind} must not be empty.")]
	Empty {
		/// `authId` or `accountId`.
		kind: &'static str,
	},
	/// Whitespace anywhere in the value.
	#[error("{kind} must not contain whitespace.")]
	ContainsWhitespace {
		/// `authId` or `accountId`.
		kind: &'static str,
	},
	/// Longer than the stored-name limit.
	#[error("{kind} is longer than {max} bytes.")]
	TooLong {
		/// `authId` or `accountId`.
		kind: &'static str,
		/// Limit in bytes.
		max: usize,
	},
}

identifier! { AuthId, "authId", "Caller-chosen name of one stored credential record." }
identifier! { AccountId, "accountId", "NetSuite account identifier as typed by the user or sent by the login callback." }

impl AccountId {
	/// Returns the form the datacenter discovery endpoint expects.
	///
	/// Sandbox and release-preview suffixes written as `-sb1`/`-rp2` become `_SB1`/`_RP2`;
	/// every other value is passed through unchanged.
	pub fn datacenter_form(&self) -> String {
		match SANDBOX_SUFFIX.captures(&self.0) {
			Some(caps) => format!("{}_{}{}", &caps[1], caps[2].to_ascii_uppercase(), &caps[3]),
			None => self.0.clone(),
		}
	}
}

fn check(kind: &'static str, value: String) -> Result<String, IdentifierError> {
	match value {
		v if v.is_empty() => Err(IdentifierError::Empty { kind }),
		v if v.contains(char::is_whitespace) => Err(IdentifierError::ContainsWhitespace { kind }),
		v if v.len() > MAX_IDENTIFIER_LEN =>
			Err(IdentifierError::TooLong { kind, max: MAX_IDENTIFIER_LEN }),
		v => Ok(v),
	}
}
