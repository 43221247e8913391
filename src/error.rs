//! Error taxonomy shared across the endpoint cache, OAuth engine, session, and
//! configuration negotiator.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Transport failure (DNS, TCP, TLS) while calling a portal endpoint.
	#[error("Network error while calling {url}.")]
	Network {
		/// URL the request was aimed at.
		url: String,
		/// Underlying transport failure.
		#[source]
		source: BoxError,
	},
	/// HTTP status >= 400 returned by a portal endpoint.
	#[error("Portal returned HTTP {status} for {url}.")]
	Status {
		/// Offending URL.
		url: String,
		/// HTTP status code.
		status: u16,
		/// Response body, if any, captured for diagnostics.
		body: String,
	},
	/// The `/.well-known/vpn-user-portal` document failed to parse or validate.
	#[error("Well-known endpoint document at {base} is invalid: {reason}.")]
	EndpointInvalid {
		/// Well-known base URL that produced the invalid document.
		base: String,
		/// Human-readable reason, e.g. a scheme or host mismatch.
		reason: String,
	},
	/// Token refresh failed, or no refresh token was available.
	#[error("Tokens are invalid and must be re-authorized.")]
	TokensInvalid {
		/// Underlying cause, when the refresher itself failed.
		#[source]
		cause: Option<BoxError>,
	},
	/// Re-authorization was required but forbidden by `disable_authorize`.
	#[error("Re-authorization is disabled for this server.")]
	AuthorizeDisabled,
	/// The authorization callback arrived without a `code` query parameter.
	#[error("Authorization callback is missing the `code` parameter.")]
	AuthMissingCode,
	/// The authorization callback's `state` did not match the originating request.
	#[error("Authorization callback state does not match the request.")]
	AuthStateMismatch,
	/// A concurrent authorization attempt is already running on this session.
	#[error("An authorization attempt is already in progress for this session.")]
	AuthorizationInProgress,
	/// `connect` was called with an empty protocol set.
	#[error("At least one protocol must be requested.")]
	NoProtocols,
	/// `connect` was called with a protocol the negotiator does not recognize.
	#[error("Unknown protocol requested: {protocol}.")]
	UnknownProtocol {
		/// Offending protocol label as supplied by the caller.
		protocol: String,
	},
	/// The portal's `connect` response carried a `Content-Type` the negotiator cannot map.
	#[error("Portal returned an unrecognized content type: {content_type}.")]
	InvalidContentType {
		/// Raw `Content-Type` header value.
		content_type: String,
	},
	/// The portal's `connect` response `Content-Type` named a protocol family that was
	/// never requested (e.g. a WireGuard response to an OpenVPN-only request).
	#[error("Portal returned a {returned} response for a request that did not include it.")]
	ProtocolMismatch {
		/// Protocol family named by the response `Content-Type`.
		returned: String,
	},
	/// The operation's future was dropped or aborted before completion.
	#[error("Operation was cancelled.")]
	Cancelled,
	/// Local configuration or validation problem (malformed URL, JSON decode failure).
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Wraps a transport failure observed while calling `url`.
	pub fn network(url: impl Into<String>, source: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { url: url.into(), source: Box::new(source) }
	}

	/// Wraps an HTTP status failure observed while calling `url`.
	pub fn status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
		Self::Status { url: url.into(), status, body: body.into() }
	}

	/// Returns `true` when the failure is an HTTP 401 surfaced by a portal endpoint.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::Status { status: 401, .. })
	}
}

/// Configuration and validation failures that are never retryable without a code or
/// server-configuration change.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A supplied or server-returned URL could not be parsed.
	#[error("Invalid URL `{value}`.")]
	InvalidUrl {
		/// Offending URL string.
		value: String,
		/// Underlying parse failure.
		#[source]
		source: url::ParseError,
	},
	/// The JSON body of a portal response could not be decoded into the expected shape.
	#[error("Failed to decode JSON response from {url}.")]
	JsonDecode {
		/// URL whose response failed to decode.
		url: String,
		/// Structured parsing failure, including the failing field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A `ServerId` failed validation (empty or whitespace-containing).
	#[error("Server identifier is invalid: {reason}.")]
	InvalidServerId {
		/// Reason the identifier was rejected.
		reason: &'static str,
	},
	/// The `expires` header on a `connect` response was missing or not a valid HTTP-date.
	#[error("Connect response is missing a valid `expires` header.")]
	InvalidExpiresHeader,
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::HttpClientBuild { source: Box::new(e) }
	}
}
