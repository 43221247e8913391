//! Thread-safe, refresh-on-expiry token cell.

// self
use crate::{
	_prelude::*,
	domain::TokenSecret,
	http::HttpFuture,
};

/// Current access/refresh token pair plus absolute expiry.
#[derive(Clone)]
pub struct Token {
	/// Bearer credential attached to API requests.
	pub access: TokenSecret,
	/// Refresh credential, when the server issued one. Some older servers omit it on
	/// refresh responses, in which case the prior value must be retained.
	pub refresh: Option<TokenSecret>,
	/// Absolute wall-clock instant at which `access` expires.
	pub expires_at: OffsetDateTime,
}
impl Token {
	/// Returns `true` once `now >= expires_at`.
	pub fn is_expired(&self) -> bool {
		OffsetDateTime::now_utc() >= self.expires_at
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access", &self.access)
			.field("refresh", &self.refresh)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Result of a successful refresh-token exchange.
pub struct RefreshedToken {
	/// New access token.
	pub access: TokenSecret,
	/// New refresh token, when the server issued one.
	pub refresh: Option<TokenSecret>,
	/// New absolute expiry.
	pub expires_at: OffsetDateTime,
}

/// Performs the refresh-token grant against a token endpoint.
///
/// Implemented by [`super::engine::Engine`]; split out as a trait so [`TokenCell`] does
/// not need to know about HTTP transports, endpoints, or client ids.
pub trait Refresher: Send + Sync {
	/// Exchanges `refresh_token` for a new [`RefreshedToken`].
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> HttpFuture<'a, RefreshedToken>;
}

/// Receives every successfully stored [`Token`], fired before it becomes observable
/// through [`TokenCell::access_token`].
pub trait TokensUpdatedSink: Send + Sync {
	/// Called with the freshly stored token.
	fn tokens_updated(&self, token: &Token);
}

struct State {
	token: Token,
	/// Set by `set_token_renew`; forces the next `access_token` call to fail with
	/// `TokensInvalid` without attempting a refresh, signalling the caller to drive a
	/// full interactive re-authorization.
	force_invalid: bool,
}

/// Mutex-protected token record with refresh-on-expiry semantics.
///
/// `access_token` holds the lock across the refresh exchange, which serializes
/// concurrent authorized requests racing on expiry (correct) at the cost of blocking
/// other API calls while a refresh is in flight (acceptable per the concurrency model).
pub struct TokenCell {
	state: AsyncMutex<State>,
}
impl TokenCell {
	/// Seeds the cell with a starting token, e.g. tokens supplied at construction.
	pub fn new(token: Token) -> Self {
		Self { state: AsyncMutex::new(State { token, force_invalid: false }) }
	}

	/// Returns a fresh access token, refreshing through `refresher` when expired.
	///
	/// Fails with [`Error::TokensInvalid`] when the cell was marked for renewal, when no
	/// refresh token is available, or when the refresher itself fails.
	pub async fn access_token(
		&self,
		refresher: &dyn Refresher,
		sink: &dyn TokensUpdatedSink,
	) -> Result<String> {
		let mut guard = self.state.lock().await;

		if guard.force_invalid {
			return Err(Error::TokensInvalid { cause: None });
		}
		if !guard.token.is_expired() {
			return Ok(guard.token.access.expose().to_owned());
		}

		let Some(refresh) = guard.token.refresh.clone() else {
			return Err(Error::TokensInvalid { cause: None });
		};
		let refreshed = refresher.refresh(refresh.expose()).await.map_err(|source| {
			Error::TokensInvalid { cause: Some(Box::new(source)) }
		})?;
		let retained_refresh = refreshed.refresh.or_else(|| guard.token.refresh.clone());

		guard.token =
			Token { access: refreshed.access, refresh: retained_refresh, expires_at: refreshed.expires_at };
		sink.tokens_updated(&guard.token);

		Ok(guard.token.access.expose().to_owned())
	}

	/// Forces the next `access_token` call to refresh, regardless of the stored expiry.
	pub async fn set_token_expired(&self) {
		self.state.lock().await.token.expires_at = OffsetDateTime::now_utc();
	}

	/// Marks the token invalid so the next `access_token` call fails immediately,
	/// signalling the caller to drive a full interactive re-authorization.
	pub async fn set_token_renew(&self) {
		self.state.lock().await.force_invalid = true;
	}

	/// Bulk-replaces the stored token, e.g. after a successful (re-)authorization.
	pub async fn update_tokens(&self, token: Token, sink: &dyn TokensUpdatedSink) {
		let mut guard = self.state.lock().await;

		guard.force_invalid = false;
		guard.token = token;
		sink.tokens_updated(&guard.token);
	}

	/// Snapshots the current token without triggering a refresh.
	pub async fn snapshot(&self) -> Token {
		self.state.lock().await.token.clone()
	}
}
