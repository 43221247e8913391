//! The OAuth/PKCE engine (C4): ties authorization-URL construction, the loopback or
//! custom redirect policy, the code/refresh exchanges, and the [`TokenCell`] together
//! behind one per-Session instance.

// crates.io
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	domain::{ServerId, ServerType, TokenSecret},
	http::{HttpClient, HttpFuture, RequestOptions},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	oauth::{
		Callbacks, Token, TokenCell,
		loopback,
		pkce::{self, PkceMaterial},
		token::{RefreshedToken, Refresher, TokensUpdatedSink},
	},
};

/// How the engine obtains the authorization code after the browser redirect.
#[derive(Clone, Debug)]
pub enum RedirectMode {
	/// Bind a fresh loopback listener per attempt and serve `/callback` ourselves.
	Loopback,
	/// The caller's `Callbacks::trigger_auth` resolves to the final redirect URI
	/// (e.g. a custom URI scheme on mobile).
	Custom(Url),
}

#[derive(Deserialize)]
struct TokenResponseWire {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	expires_in: i64,
}

/// Per-Session OAuth engine: owns the [`TokenCell`] and drives (re-)authorization.
pub struct Engine<C: HttpClient> {
	client_id: String,
	authorization_endpoint: Url,
	token_endpoint: Url,
	redirect: RedirectMode,
	http: Arc<C>,
	cell: TokenCell,
	callbacks: Arc<dyn Callbacks>,
	server_id: ServerId,
	server_type: ServerType,
	in_progress: Mutex<bool>,
}
impl<C: HttpClient> Engine<C> {
	/// Builds a new engine seeded with an already-expired, refresh-less token so the
	/// first [`Engine::access_token`] call drives a full authorization unless
	/// `prior_tokens` is supplied.
	pub fn new(
		client_id: impl Into<String>,
		authorization_endpoint: Url,
		token_endpoint: Url,
		redirect: RedirectMode,
		http: Arc<C>,
		callbacks: Arc<dyn Callbacks>,
		server_id: ServerId,
		server_type: ServerType,
		prior_tokens: Option<Token>,
	) -> Self {
		let seed = prior_tokens.unwrap_or_else(|| Token {
			access: TokenSecret::new(""),
			refresh: None,
			expires_at: OffsetDateTime::now_utc(),
		});

		Self {
			client_id: client_id.into(),
			authorization_endpoint,
			token_endpoint,
			redirect,
			http,
			cell: TokenCell::new(seed),
			callbacks,
			server_id,
			server_type,
			in_progress: Mutex::new(false),
		}
	}

	/// Returns a fresh access token, refreshing through the token endpoint when
	/// expired. See [`TokenCell::access_token`] for the full contract.
	pub async fn access_token(&self) -> Result<String> {
		self.cell.access_token(self, &self.sink()).await
	}

	/// Forces the next [`Engine::access_token`] call to refresh.
	pub async fn set_token_expired(&self) {
		self.cell.set_token_expired().await;
	}

	/// Marks the token invalid, forcing the next [`Engine::access_token`] call to fail
	/// and signal full re-authorization.
	pub async fn set_token_renew(&self) {
		self.cell.set_token_renew().await;
	}

	/// Snapshots the current token without triggering a refresh.
	pub async fn snapshot(&self) -> Token {
		self.cell.snapshot().await
	}

	/// Drives the full authorization state machine described in §4.4 step 4: attempts
	/// [`Engine::access_token`] first, and only falls back to interactive
	/// authorization (or [`Error::AuthorizeDisabled`]) when that fails with
	/// [`Error::TokensInvalid`]. Returns `true` when the interactive branch actually ran
	/// (and `Callbacks::auth_done` fired), `false` when a valid token was already
	/// cached and no re-authorization was necessary.
	pub async fn authorize(
		&self,
		disable_authorize: bool,
		process_auth: Option<&(dyn Fn(Url) -> Url + Send + Sync)>,
	) -> Result<bool> {
		const KIND: FlowKind = FlowKind::Authorize;
		let span = FlowSpan::new(KIND, "authorize");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.authorize_inner(disable_authorize, process_auth)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn authorize_inner(
		&self,
		disable_authorize: bool,
		process_auth: Option<&(dyn Fn(Url) -> Url + Send + Sync)>,
	) -> Result<bool> {
		match self.access_token().await {
			Ok(_) => return Ok(false),
			Err(Error::TokensInvalid { .. }) => {},
			Err(e) => return Err(e),
		}

		if disable_authorize {
			return Err(Error::AuthorizeDisabled);
		}

		let _guard = self.enter_authorization()?;
		let pkce = pkce::generate();
		let (redirect_uri, listener) = self.prepare_redirect().await?;
		let auth_url = self.build_auth_url(&pkce, &redirect_uri);
		let auth_url = match process_auth {
			Some(transform) => transform(auth_url),
			None => auth_url,
		};
		let custom_redirect = listener.is_none();
		let triggered = self.callbacks.trigger_auth(&auth_url, custom_redirect).await?;
		let (code, state) = match (triggered, listener) {
			(Some(redirected), _) => loopback::extract_from_redirect_uri(&redirected)?,
			(None, Some(listener)) => loopback::await_callback(listener).await?,
			(None, None) => return Err(Error::AuthMissingCode),
		};

		if !pkce::states_match(&pkce.state, &state) {
			return Err(Error::AuthStateMismatch);
		}

		let token = self.exchange_code(&code, &pkce.verifier, &redirect_uri).await?;

		self.cell.update_tokens(token, &self.sink()).await;
		self.callbacks.auth_done(&self.server_id, self.server_type);

		Ok(true)
	}

	fn enter_authorization(&self) -> Result<InProgressGuard<'_>> {
		let mut in_progress = self.in_progress.lock();

		if *in_progress {
			return Err(Error::AuthorizationInProgress);
		}

		*in_progress = true;

		Ok(InProgressGuard { flag: &self.in_progress })
	}

	async fn prepare_redirect(&self) -> Result<(Url, Option<TcpListener>)> {
		match &self.redirect {
			RedirectMode::Custom(uri) => Ok((uri.clone(), None)),
			RedirectMode::Loopback => {
				let listener = TcpListener::bind("127.0.0.1:0")
					.await
					.map_err(|source| Error::network("127.0.0.1:0", source))?;
				let port = listener
					.local_addr()
					.map_err(|source| Error::network("127.0.0.1:0", source))?
					.port();
				let redirect_uri = Url::parse(&format!("http://127.0.0.1:{port}/callback"))
					.expect("Loopback redirect URI should always parse.");

				Ok((redirect_uri, Some(listener)))
			},
		}
	}

	fn build_auth_url(&self, pkce: &PkceMaterial, redirect_uri: &Url) -> Url {
		let mut url = self.authorization_endpoint.clone();

		{
			let mut pairs = url.query_pairs_mut();

			pairs.append_pair("response_type", "code");
			pairs.append_pair("client_id", &self.client_id);
			pairs.append_pair("scope", "config");
			pairs.append_pair("state", &pkce.state);
			pairs.append_pair("code_challenge_method", "S256");
			pairs.append_pair("code_challenge", &pkce.challenge);
			pairs.append_pair("redirect_uri", redirect_uri.as_str());
		}

		url
	}

	async fn exchange_code(&self, code: &str, verifier: &str, redirect_uri: &Url) -> Result<Token> {
		let form = vec![
			("grant_type".to_owned(), "authorization_code".to_owned()),
			("client_id".to_owned(), self.client_id.clone()),
			("code".to_owned(), code.to_owned()),
			("code_verifier".to_owned(), verifier.to_owned()),
			("redirect_uri".to_owned(), redirect_uri.to_string()),
		];
		let requested_at = OffsetDateTime::now_utc();
		let response =
			self.http.post(&self.token_endpoint, RequestOptions::default().with_form(form)).await?;
		let wire: TokenResponseWire = response.json(self.token_endpoint.as_str())?;

		Ok(Token {
			access: TokenSecret::new(wire.access_token),
			refresh: wire.refresh_token.map(TokenSecret::new),
			expires_at: requested_at + Duration::seconds(wire.expires_in),
		})
	}

	fn sink(&self) -> EngineSink<'_, C> {
		EngineSink(self)
	}
}
impl<C: HttpClient> Refresher for Engine<C> {
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> HttpFuture<'a, RefreshedToken> {
		const KIND: FlowKind = FlowKind::Refresh;

		Box::pin(async move {
			let span = FlowSpan::new(KIND, "refresh");

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span
				.instrument(async move {
					let form = vec![
						("grant_type".to_owned(), "refresh_token".to_owned()),
						("refresh_token".to_owned(), refresh_token.to_owned()),
					];
					let requested_at = OffsetDateTime::now_utc();
					let response = self
						.http
						.post(&self.token_endpoint, RequestOptions::default().with_form(form))
						.await?;
					let wire: TokenResponseWire = response.json(self.token_endpoint.as_str())?;

					Ok(RefreshedToken {
						access: TokenSecret::new(wire.access_token),
						refresh: wire.refresh_token.map(TokenSecret::new),
						expires_at: requested_at + Duration::seconds(wire.expires_in),
					})
				})
				.await;

			match &result {
				Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
				Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
			}

			result
		})
	}
}

struct EngineSink<'a, C: HttpClient>(&'a Engine<C>);
impl<C: HttpClient> TokensUpdatedSink for EngineSink<'_, C> {
	fn tokens_updated(&self, token: &Token) {
		self.0.callbacks.tokens_updated(&self.0.server_id, self.0.server_type, token);
	}
}

struct InProgressGuard<'a> {
	flag: &'a Mutex<bool>,
}
impl Drop for InProgressGuard<'_> {
	fn drop(&mut self) {
		*self.flag.lock() = false;
	}
}
