//! Domain identifiers and secret wrappers shared across the session engine.

// self
use crate::{_prelude::*, error::ConfigError};

/// Opaque server identifier: the portal base URL for institute/custom servers, or an
/// organization id for secure-internet. Validated to be non-empty and whitespace-free.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerId(String);
impl ServerId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
		let value = value.into();

		if value.is_empty() {
			return Err(ConfigError::InvalidServerId { reason: "identifier cannot be empty" });
		}
		if value.chars().any(char::is_whitespace) {
			return Err(ConfigError::InvalidServerId {
				reason: "identifier cannot contain whitespace",
			});
		}

		Ok(Self(value))
	}
}
impl AsRef<str> for ServerId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<ServerId> for String {
	fn from(value: ServerId) -> Self {
		value.0
	}
}
impl TryFrom<String> for ServerId {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Debug for ServerId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ServerId({})", self.0)
	}
}
impl Display for ServerId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Classifies the portal relationship for a [`ServerId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerType {
	/// A single institute-operated portal.
	Institute,
	/// A federated server reached through a secure-internet organization id.
	SecureInternet,
	/// A server the caller configured manually, outside any discovery catalog.
	Custom,
}
impl ServerType {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Institute => "institute",
			Self::SecureInternet => "secure_internet",
			Self::Custom => "custom",
		}
	}
}
impl Display for ServerType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Redacted secret wrapper that keeps bearer/refresh token material out of
/// `Debug`/`Display` output and therefore out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn server_id_rejects_empty_and_whitespace() {
		assert!(ServerId::new("").is_err());
		assert!(ServerId::new("has space").is_err());

		let id = ServerId::new("https://vpn.example.com/").expect("Valid id should parse.");

		assert_eq!(id.as_ref(), "https://vpn.example.com/");
	}

	#[test]
	fn token_secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn server_type_labels_are_stable() {
		assert_eq!(ServerType::Institute.as_str(), "institute");
		assert_eq!(ServerType::SecureInternet.as_str(), "secure_internet");
		assert_eq!(ServerType::Custom.as_str(), "custom");
	}
}
