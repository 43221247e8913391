//! Session (C5): binds a server's identity, the OAuth engine, and the API endpoint
//! to a callable surface (`info`, `connect`, `disconnect`), routing every request
//! through the authorized-with-retry wrapper described in §4.4.

// self
use crate::{
	_prelude::*,
	domain::{ServerId, ServerType, TokenSecret},
	endpoint::EndpointCache,
	http::{HttpClient, HttpFuture, Method, RequestOptions, join_path},
	negotiate::{self, ConnectData, Protocol, ProtocolTag, ProxySpec, WireGuardPostProcessor},
	oauth::{Callbacks, Engine, RedirectMode, Token},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	profile::{Profile, ProfileList},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Short-lived timeout applied to `disconnect`, which the caller should not block on.
const DISCONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Immutable per-Session server identity and policy, supplied by the caller.
///
/// `process_auth` rewrites the built authorization URL before it leaves the process
/// (e.g. through a federation where-are-you-from template); `set_authorize_time`
/// fires only when the interactive authorization branch actually ran, the same scope
/// as `Callbacks::auth_done` — reusing an already-valid cached token does not fire it;
/// `disable_authorize` forbids the interactive flow entirely, surfacing
/// [`Error::AuthorizeDisabled`] instead.
pub struct ServerData {
	/// Opaque server identifier: the portal base URL for institute/custom servers, or
	/// an organization id for secure-internet.
	pub id: ServerId,
	/// Classifies the portal relationship.
	pub server_type: ServerType,
	/// Base URL whose `/.well-known/vpn-user-portal` yields the API endpoints.
	pub base_wk: Url,
	/// Base URL whose well-known document yields the authorization+token endpoints.
	/// Equal to `base_wk` except for secure-internet servers whose current location
	/// differs from the user's home location.
	pub base_auth_wk: Url,
	/// Redirect policy for the OAuth engine; loopback unless the caller supplies a
	/// custom out-of-band redirect URI.
	pub redirect: RedirectMode,
	/// Optional transformer applied to the built authorization URL before use.
	pub process_auth: Option<Box<dyn Fn(Url) -> Url + Send + Sync>>,
	/// Optional sink invoked after an interactive (re-)authorization, matching
	/// `Callbacks::auth_done`'s scope.
	pub set_authorize_time: Option<Box<dyn Fn() + Send + Sync>>,
	/// Forbids the interactive authorization flow when set.
	pub disable_authorize: bool,
}
impl ServerData {
	/// Builds server data whose authorization document comes from the same base URL
	/// as the API document (institute and custom servers).
	pub fn new(id: ServerId, server_type: ServerType, base_wk: Url) -> Self {
		let base_auth_wk = base_wk.clone();

		Self {
			id,
			server_type,
			base_wk,
			base_auth_wk,
			redirect: RedirectMode::Loopback,
			process_auth: None,
			set_authorize_time: None,
			disable_authorize: false,
		}
	}

	/// Overrides the authorization well-known base URL, for secure-internet servers
	/// whose current location differs from the home location.
	pub fn with_auth_base(mut self, base_auth_wk: Url) -> Self {
		self.base_auth_wk = base_auth_wk;

		self
	}

	/// Configures an out-of-band custom redirect URI instead of the loopback policy.
	pub fn with_custom_redirect(mut self, redirect_uri: Url) -> Self {
		self.redirect = RedirectMode::Custom(redirect_uri);

		self
	}

	/// Forbids the interactive authorization flow.
	pub fn with_disable_authorize(mut self, disable_authorize: bool) -> Self {
		self.disable_authorize = disable_authorize;

		self
	}
}
impl Debug for ServerData {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServerData")
			.field("id", &self.id)
			.field("server_type", &self.server_type)
			.field("base_wk", &self.base_wk.as_str())
			.field("base_auth_wk", &self.base_auth_wk.as_str())
			.field("disable_authorize", &self.disable_authorize)
			.finish_non_exhaustive()
	}
}

/// Binds a server's identity, OAuth engine, and API endpoint into a callable surface.
///
/// A Session exclusively owns its OAuth engine; the endpoint cache is shared,
/// non-owning state consulted during construction. See the crate-level docs for the
/// full ownership graph.
pub struct Session<C: HttpClient, W: WireGuardPostProcessor> {
	id: ServerId,
	server_type: ServerType,
	api: Url,
	http: Arc<C>,
	engine: Engine<C>,
	wireguard: Arc<W>,
	disable_authorize: bool,
	process_auth: Option<Box<dyn Fn(Url) -> Url + Send + Sync>>,
	set_authorize_time: Option<Box<dyn Fn() + Send + Sync>>,
}
impl<C: HttpClient, W: WireGuardPostProcessor> Session<C, W> {
	/// Constructs a Session per §4.4: resolves endpoints via `cache`, builds the OAuth
	/// engine, seeds `prior_tokens` if supplied, and drives [`Session::authorize`] —
	/// which is a no-op when `prior_tokens` already yields a valid access token.
	pub async fn new(
		client_id: impl Into<String>,
		server_data: ServerData,
		callbacks: Arc<dyn Callbacks>,
		http: Arc<C>,
		cache: Arc<EndpointCache<C>>,
		wireguard: Arc<W>,
		prior_tokens: Option<Token>,
	) -> Result<Self> {
		let api_doc = cache.get(&server_data.base_wk).await?;
		let auth_pair = if server_data.base_auth_wk == server_data.base_wk {
			api_doc.endpoints.clone()
		} else {
			cache.get(&server_data.base_auth_wk).await?.endpoints
		};
		let engine = Engine::new(
			client_id,
			auth_pair.authorization,
			auth_pair.token,
			server_data.redirect,
			http.clone(),
			callbacks,
			server_data.id.clone(),
			server_data.server_type,
			prior_tokens,
		);

		let mut session = Self {
			id: server_data.id,
			server_type: server_data.server_type,
			api: api_doc.endpoints.api,
			http,
			engine,
			wireguard,
			disable_authorize: server_data.disable_authorize,
			process_auth: server_data.process_auth,
			set_authorize_time: server_data.set_authorize_time,
		};

		session.authorize().await?;

		Ok(session)
	}

	/// The server identifier this Session was constructed for.
	pub fn id(&self) -> &ServerId {
		&self.id
	}

	/// The server type this Session was constructed for.
	pub fn server_type(&self) -> ServerType {
		self.server_type
	}

	/// `GET <api>/info`, decoding `info.profile_list` into the domain type.
	pub async fn info(&self) -> Result<ProfileList> {
		const KIND: FlowKind = FlowKind::Info;
		let span = FlowSpan::new(KIND, "info");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let url = join_path(&self.api, "info")?;
		let result = span
			.instrument(self.authorized_request(|| async {
				let opts = self.bearer_options().await?;
				let response = self.http.do_request(Method::Get, &url, opts).await?;
				let wire: InfoResponseWire = response.json(url.as_str())?;

				Ok(ProfileList::new(wire.info.profile_list))
			}))
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// `POST <api>/disconnect` with a short 5-second timeout. Non-401 failures are at
	/// most logged; per §7 this is the one call site that swallows errors.
	pub async fn disconnect(&self) {
		const KIND: FlowKind = FlowKind::Disconnect;
		let span = FlowSpan::new(KIND, "disconnect");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let url = join_path(&self.api, "disconnect")?;

				self.authorized_request(|| async {
					let opts = self.bearer_options().await?.with_timeout(DISCONNECT_TIMEOUT);

					self.http.post(&url, opts).await
				})
				.await
			})
			.await;

		match result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(err) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				#[cfg(feature = "tracing")]
				tracing::warn!(server_id = %self.id, error = %err, "Disconnect request failed.");
				#[cfg(not(feature = "tracing"))]
				let _ = err;
			},
		}
	}

	/// Negotiates and requests a VPN configuration for `profile` per §4.5.
	pub async fn connect<S: AsRef<str>>(
		&self,
		profile: &Profile,
		protocols: &[S],
		prefer_tcp: bool,
	) -> Result<ConnectData> {
		const KIND: FlowKind = FlowKind::Connect;
		let span = FlowSpan::new(KIND, "connect");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.connect_inner(profile, protocols, prefer_tcp)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn connect_inner<S: AsRef<str>>(
		&self,
		profile: &Profile,
		protocols: &[S],
		prefer_tcp: bool,
	) -> Result<ConnectData> {
		let protocols = negotiate::validate_protocols(protocols)?;
		let keypair = protocols.contains(&Protocol::WireGuard).then(negotiate::generate_keypair);
		let url = join_path(&self.api, "connect")?;

		let response = self
			.authorized_request(|| async {
				let mut form = vec![
					("profile_id".to_owned(), profile.id.clone()),
					("prefer_tcp".to_owned(), if prefer_tcp { "yes" } else { "no" }.to_owned()),
				];
				let mut opts = self.bearer_options().await?;

				if let Some(keypair) = &keypair {
					form.push(("public_key".to_owned(), keypair.public_base64.clone()));
				}
				for accept in negotiate::accept_headers(&protocols, prefer_tcp) {
					opts = opts.with_header("Accept", accept);
				}

				self.http.post(&url, opts.with_form(form)).await
			})
			.await?;

		let content_type = response.header("content-type").unwrap_or_default();
		let protocol = negotiate::map_content_type(content_type)?;
		let expires = negotiate::parse_expires(response.header("expires"))?;
		let body = response.text();

		let (configuration, proxy): (String, Option<ProxySpec>) = match protocol {
			ProtocolTag::OpenVpn => (negotiate::finalize_openvpn_config(&body), None),
			ProtocolTag::WireGuard | ProtocolTag::WireGuardOverTcp => {
				let keypair = keypair.ok_or_else(|| Error::ProtocolMismatch {
					returned: content_type.to_owned(),
				})?;
				let tcp_proxied = matches!(protocol, ProtocolTag::WireGuardOverTcp);

				self.wireguard.process(body, &keypair.private_base64, tcp_proxied).await?
			},
		};

		Ok(ConnectData { configuration, protocol, expires, proxy })
	}

	/// Fetches a fresh access token and returns request options carrying it as a
	/// bearer `Authorization` header. Called inside the closure passed to
	/// [`Session::authorized_request`] so a refresh forced by a prior attempt is
	/// picked up on replay.
	async fn bearer_options(&self) -> Result<RequestOptions> {
		let access = self.engine.access_token().await?;

		Ok(RequestOptions::default().with_header("Authorization", format!("Bearer {access}")))
	}

	/// The authorized-with-retry wrapper (§4.4): attaches a fresh bearer token,
	/// performs `request`, and on `401` or `TokensInvalid` cycles through
	/// refresh/re-authorization before replaying the request exactly once.
	async fn authorized_request<F, Fut, T>(&self, request: F) -> Result<T>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		match request().await {
			Ok(value) => Ok(value),
			Err(err) if err.is_unauthorized() => {
				self.engine.set_token_expired().await;

				request().await
			},
			Err(Error::TokensInvalid { .. }) => {
				self.engine.set_token_renew().await;
				self.authorize().await?;

				request().await
			},
			Err(err) => Err(err),
		}
	}

	/// Acquires a fresh access token and authorizes the loopback/custom interactive
	/// flow when none is available, per §4.4 step 4. `set_authorize_time` fires only
	/// when the interactive branch actually ran, mirroring the scope of
	/// `Callbacks::auth_done` — reusing an already-valid cached token does not count
	/// as a re-authorization.
	async fn authorize(&self) -> Result<()> {
		let reauthorized =
			self.engine.authorize(self.disable_authorize, self.process_auth.as_deref()).await?;

		if reauthorized {
			if let Some(sink) = &self.set_authorize_time {
				sink();
			}
		}

		Ok(())
	}
}
impl<C: HttpClient, W: WireGuardPostProcessor> Debug for Session<C, W> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("server_type", &self.server_type)
			.field("api", &self.api.as_str())
			.finish_non_exhaustive()
	}
}

#[cfg(feature = "reqwest")]
impl Session<ReqwestHttpClient, NoopWireGuardPostProcessor> {
	/// Constructs a Session using the process-wide reqwest transport and endpoint
	/// cache, with a no-op WireGuard post-processor — convenient when the caller
	/// supplies their own processor out of band or only needs OpenVPN.
	pub async fn with_defaults(
		client_id: impl Into<String>,
		server_data: ServerData,
		callbacks: Arc<dyn Callbacks>,
		prior_tokens: Option<Token>,
	) -> Result<Self> {
		let http = Arc::new(ReqwestHttpClient::default());
		let cache = EndpointCache::global();

		Self::new(
			client_id,
			server_data,
			callbacks,
			http,
			cache,
			Arc::new(NoopWireGuardPostProcessor),
			prior_tokens,
		)
		.await
	}
}

/// A [`WireGuardPostProcessor`] that returns the raw configuration untouched and
/// never proxies over TCP. Exists so callers who only need OpenVPN, or who run the
/// real post-processor out of band, are not forced to implement the trait.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopWireGuardPostProcessor;
impl WireGuardPostProcessor for NoopWireGuardPostProcessor {
	fn process<'a>(
		&'a self,
		configuration: String,
		_private_key: &'a TokenSecret,
		_tcp_proxied: bool,
	) -> HttpFuture<'a, (String, Option<ProxySpec>)> {
		Box::pin(async move { Ok((configuration, None)) })
	}
}

#[derive(Deserialize)]
struct InfoResponseWire {
	info: InfoWire,
}

#[derive(Deserialize)]
struct InfoWire {
	profile_list: Vec<Profile>,
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{http::ReqwestHttpClient, oauth::callbacks::test_support::RecordingCallbacks};

	fn server_data(base: Url) -> ServerData {
		ServerData::new(
			ServerId::new(base.as_str()).expect("Server id fixture should be valid."),
			ServerType::Institute,
			base,
		)
	}

	fn well_known_body(base: &str) -> String {
		format!(
			r#"{{"api":{{"http://eduvpn.org/api#3":{{"api_endpoint":"{base}/api","authorization_endpoint":"{base}/auth","token_endpoint":"{base}/token"}}}},"v":"3.0"}}"#
		)
	}

	async fn new_session(
		server: &httpmock::MockServer,
		callbacks: Arc<RecordingCallbacks>,
		prior_tokens: Option<Token>,
	) -> Result<Session<ReqwestHttpClient, NoopWireGuardPostProcessor>> {
		let base = server.url("");
		let http = Arc::new(ReqwestHttpClient::default());
		let cache = Arc::new(EndpointCache::new(http.clone()));

		Session::new(
			"test-client",
			server_data(Url::parse(&base).expect("Mock base URL should parse.")),
			callbacks,
			http,
			cache,
			Arc::new(NoopWireGuardPostProcessor),
			prior_tokens,
		)
		.await
	}

	fn expired_token(refresh: Option<&str>) -> Token {
		Token {
			access: TokenSecret::new("expiredA"),
			refresh: refresh.map(TokenSecret::new),
			expires_at: OffsetDateTime::now_utc() - Duration::seconds(1),
		}
	}

	#[tokio::test]
	async fn fresh_authorize_refreshes_prior_tokens() {
		let server = httpmock::MockServer::start();

		server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200)
				.header("content-type", "application/json")
				.body(well_known_body(&server.url("")));
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"validA","refresh_token":"validR","expires_in":3600}"#);
		});

		let callbacks = Arc::new(RecordingCallbacks::default());
		let session =
			new_session(&server, callbacks.clone(), Some(expired_token(Some("expiredR"))))
				.await
				.expect("Session should refresh prior tokens.");

		assert_eq!(session.id().as_ref(), server.url(""));
		assert_eq!(callbacks.tokens_updated_calls.lock().len(), 1);
	}

	#[tokio::test]
	async fn info_retries_once_on_a_single_401() {
		let server = httpmock::MockServer::start();

		server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200)
				.header("content-type", "application/json")
				.body(well_known_body(&server.url("")));
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"validA","refresh_token":"validR","expires_in":3600}"#);
		});

		let first_info = server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/api/info").header("Authorization", "Bearer validA");
			then.status(401).body("unauthorized");
		});

		let callbacks = Arc::new(RecordingCallbacks::default());
		let session = new_session(&server, callbacks, Some(expired_token(Some("expiredR"))))
			.await
			.expect("Session construction should succeed.");

		let err = session.info().await.expect_err("Second 401 should surface.");

		assert!(err.is_unauthorized());
		first_info.assert_hits(2);
	}

	#[tokio::test]
	async fn connect_with_no_protocols_performs_no_network_io() {
		let server = httpmock::MockServer::start();

		server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200)
				.header("content-type", "application/json")
				.body(well_known_body(&server.url("")));
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"validA","refresh_token":"validR","expires_in":3600}"#);
		});
		let connect_mock =
			server.mock(|when, then| {
				when.method(httpmock::Method::POST).path("/api/connect");
				then.status(500);
			});

		let callbacks = Arc::new(RecordingCallbacks::default());
		let session = new_session(&server, callbacks, Some(expired_token(Some("expiredR"))))
			.await
			.expect("Session construction should succeed.");
		let profile = Profile {
			id: "p1".into(),
			display_name: "Internet".into(),
			protocols: vec!["openvpn".into()],
			default_gateway: false,
			dns_search_domains: vec![],
		};
		let err = session
			.connect::<&str>(&profile, &[], false)
			.await
			.expect_err("Empty protocol set should fail.");

		assert!(matches!(err, Error::NoProtocols));
		connect_mock.assert_hits(0);
	}

	#[derive(Default)]
	struct FakeBrowserCallbacks {
		auth_done_calls: Mutex<Vec<(ServerId, ServerType)>>,
		tokens_updated_calls: Mutex<Vec<(ServerId, ServerType)>>,
	}
	impl Callbacks for FakeBrowserCallbacks {
		fn trigger_auth<'a>(
			&'a self,
			auth_url: &'a Url,
			custom_redirect: bool,
		) -> HttpFuture<'a, Option<Url>> {
			Box::pin(async move {
				assert!(custom_redirect, "Custom redirect mode should report custom_redirect = true.");

				let state = auth_url
					.query_pairs()
					.find(|(key, _)| key == "state")
					.map(|(_, value)| value.into_owned())
					.expect("Authorization URL should carry a state parameter.");
				let mut redirect = Url::parse("https://app.example.com/callback")
					.expect("Fake browser redirect URI should parse.");

				redirect.query_pairs_mut().append_pair("code", "fakeauthcode").append_pair("state", &state);

				Ok(Some(redirect))
			})
		}

		fn auth_done(&self, server_id: &ServerId, server_type: ServerType) {
			self.auth_done_calls.lock().push((server_id.clone(), server_type));
		}

		fn tokens_updated(&self, server_id: &ServerId, server_type: ServerType, _token: &Token) {
			self.tokens_updated_calls.lock().push((server_id.clone(), server_type));
		}
	}

	#[derive(Default)]
	struct RecordingWireGuardPostProcessor {
		calls: Mutex<Vec<(String, bool)>>,
	}
	impl WireGuardPostProcessor for RecordingWireGuardPostProcessor {
		fn process<'a>(
			&'a self,
			configuration: String,
			private_key: &'a TokenSecret,
			tcp_proxied: bool,
		) -> HttpFuture<'a, (String, Option<ProxySpec>)> {
			Box::pin(async move {
				self.calls.lock().push((private_key.expose().to_owned(), tcp_proxied));

				let proxy = tcp_proxied.then(|| ProxySpec {
					listen: "127.0.0.1:51820".into(),
					source_port: 51820,
					peer: "https://proxyendpoint".into(),
				});

				Ok((configuration, proxy))
			})
		}
	}

	#[tokio::test]
	async fn s2_no_refresh_drives_interactive_authorization_end_to_end() {
		let server = httpmock::MockServer::start();

		server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200)
				.header("content-type", "application/json")
				.body(well_known_body(&server.url("")));
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"validA","refresh_token":"validR","expires_in":3600}"#);
		});

		let callbacks = Arc::new(FakeBrowserCallbacks::default());
		let http = Arc::new(ReqwestHttpClient::default());
		let cache = Arc::new(EndpointCache::new(http.clone()));
		let base = Url::parse(&server.url("")).expect("Mock base URL should parse.");
		let data = server_data(base).with_custom_redirect(
			Url::parse("https://app.example.com/callback").expect("Custom redirect URI should parse."),
		);

		let session = Session::new(
			"test-client",
			data,
			callbacks.clone(),
			http,
			cache,
			Arc::new(NoopWireGuardPostProcessor),
			Some(expired_token(None)),
		)
		.await
		.expect("Interactive authorization should succeed.");

		assert_eq!(session.id().as_ref(), server.url(""));
		assert_eq!(callbacks.auth_done_calls.lock().len(), 1);
		assert_eq!(callbacks.tokens_updated_calls.lock().len(), 1);
	}

	#[tokio::test]
	async fn s4_wireguard_connect_returns_generated_keypair_with_no_proxy() {
		let server = httpmock::MockServer::start();

		server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200)
				.header("content-type", "application/json")
				.body(well_known_body(&server.url("")));
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"validA","refresh_token":"validR","expires_in":3600}"#);
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/api/connect");
			then.status(200)
				.header("content-type", "application/x-wireguard-profile")
				.header("expires", "Sat, 01 Jan 2000 00:00:00 GMT")
				.body("[Interface]\nAddress = 10.0.0.2/32");
		});

		let http = Arc::new(ReqwestHttpClient::default());
		let cache = Arc::new(EndpointCache::new(http.clone()));
		let base = Url::parse(&server.url("")).expect("Mock base URL should parse.");
		let wireguard = Arc::new(RecordingWireGuardPostProcessor::default());
		let session = Session::new(
			"test-client",
			server_data(base),
			Arc::new(RecordingCallbacks::default()),
			http,
			cache,
			wireguard.clone(),
			Some(expired_token(Some("expiredR"))),
		)
		.await
		.expect("Session construction should succeed.");
		let profile = Profile {
			id: "p1".into(),
			display_name: "Internet".into(),
			protocols: vec!["openvpn".into(), "wireguard".into()],
			default_gateway: false,
			dns_search_domains: vec![],
		};

		let data = session
			.connect(&profile, &["openvpn", "wireguard"], false)
			.await
			.expect("WireGuard connect should succeed.");

		assert!(matches!(data.protocol, ProtocolTag::WireGuard));
		assert_eq!(data.configuration, "[Interface]\nAddress = 10.0.0.2/32");
		assert!(data.proxy.is_none());

		let calls = wireguard.calls.lock();

		assert_eq!(calls.len(), 1);
		assert!(!calls[0].0.is_empty(), "Generated private key should reach the post-processor.");
		assert!(!calls[0].1, "Plain WireGuard connect should not be TCP-proxied.");
	}

	#[tokio::test]
	async fn s5_wireguard_over_tcp_connect_returns_a_proxy_spec() {
		let server = httpmock::MockServer::start();

		server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200)
				.header("content-type", "application/json")
				.body(well_known_body(&server.url("")));
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"validA","refresh_token":"validR","expires_in":3600}"#);
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/api/connect");
			then.status(200)
				.header("content-type", "application/x-wireguard+tcp-profile")
				.header("expires", "Sat, 01 Jan 2000 00:00:00 GMT")
				.body("[Interface]\nAddress = 10.0.0.2/32\n[Peer]\nProxyEndpoint = https://proxyendpoint");
		});

		let http = Arc::new(ReqwestHttpClient::default());
		let cache = Arc::new(EndpointCache::new(http.clone()));
		let base = Url::parse(&server.url("")).expect("Mock base URL should parse.");
		let wireguard = Arc::new(RecordingWireGuardPostProcessor::default());
		let session = Session::new(
			"test-client",
			server_data(base),
			Arc::new(RecordingCallbacks::default()),
			http,
			cache,
			wireguard.clone(),
			Some(expired_token(Some("expiredR"))),
		)
		.await
		.expect("Session construction should succeed.");
		let profile = Profile {
			id: "p1".into(),
			display_name: "Internet".into(),
			protocols: vec!["wireguard".into()],
			default_gateway: false,
			dns_search_domains: vec![],
		};

		let data = session
			.connect(&profile, &["wireguard"], true)
			.await
			.expect("WireGuard-over-TCP connect should succeed.");

		assert!(matches!(data.protocol, ProtocolTag::WireGuardOverTcp));

		let proxy = data.proxy.expect("TCP-proxied connect should yield a ProxySpec.");

		assert_eq!(proxy.peer, "https://proxyendpoint");
		assert!(proxy.listen.contains("127.0.0.1"));
		assert!(proxy.source_port > 0);

		let calls = wireguard.calls.lock();

		assert_eq!(calls.len(), 1);
		assert!(calls[0].1, "prefer_tcp = true should report tcp_proxied = true to the post-processor.");
	}

	#[tokio::test]
	async fn connect_openvpn_appends_script_security() {
		let server = httpmock::MockServer::start();

		server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200)
				.header("content-type", "application/json")
				.body(well_known_body(&server.url("")));
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"validA","refresh_token":"validR","expires_in":3600}"#);
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/api/connect");
			then.status(200)
				.header("content-type", "application/x-openvpn-profile")
				.header("expires", "Sat, 01 Jan 2000 00:00:00 GMT")
				.body("openvpnconfig");
		});

		let callbacks = Arc::new(RecordingCallbacks::default());
		let session = new_session(&server, callbacks, Some(expired_token(Some("expiredR"))))
			.await
			.expect("Session construction should succeed.");
		let profile = Profile {
			id: "p1".into(),
			display_name: "Internet".into(),
			protocols: vec!["openvpn".into()],
			default_gateway: false,
			dns_search_domains: vec![],
		};
		let data = session
			.connect(&profile, &["openvpn"], false)
			.await
			.expect("OpenVPN connect should succeed.");

		assert_eq!(data.configuration, "openvpnconfig\nscript-security 0");
		assert!(matches!(data.protocol, ProtocolTag::OpenVpn));
		assert!(data.proxy.is_none());
	}

	#[tokio::test]
	async fn connect_rejects_a_wireguard_response_to_an_openvpn_only_request() {
		let server = httpmock::MockServer::start();

		server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200)
				.header("content-type", "application/json")
				.body(well_known_body(&server.url("")));
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"validA","refresh_token":"validR","expires_in":3600}"#);
		});
		server.mock(|when, then| {
			when.method(httpmock::Method::POST).path("/api/connect");
			then.status(200)
				.header("content-type", "application/x-wireguard-profile")
				.header("expires", "Sat, 01 Jan 2000 00:00:00 GMT")
				.body("[Interface]\nAddress = 10.0.0.2/32");
		});

		let callbacks = Arc::new(RecordingCallbacks::default());
		let session = new_session(&server, callbacks, Some(expired_token(Some("expiredR"))))
			.await
			.expect("Session construction should succeed.");
		let profile = Profile {
			id: "p1".into(),
			display_name: "Internet".into(),
			protocols: vec!["openvpn".into()],
			default_gateway: false,
			dns_search_domains: vec![],
		};

		let err = session
			.connect(&profile, &["openvpn"], false)
			.await
			.expect_err("A WireGuard response to an OpenVPN-only request should be rejected.");

		assert!(matches!(err, Error::ProtocolMismatch { .. }));
	}
}
