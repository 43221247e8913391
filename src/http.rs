//! Uniform HTTP client wrapper (C3): `GET`/`POST` with optional headers/body/timeout,
//! per-response status classification, and URL-path joining.
//!
//! Every HTTP-performing component in this crate — the endpoint cache, the OAuth
//! engine's token exchanges, and the session's authorized API calls — goes through a
//! single [`HttpClient`] implementation so status/network-error classification and
//! default timeouts stay in one place.

// std
use std::pin::Pin;
// self
use crate::_prelude::*;

const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// HTTP method supported by the wrapper. The portal API only ever needs these two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
}

/// Per-request options recognized by [`HttpClient::do_request`].
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Extra headers to attach, keyed by header name with one or more values.
	pub headers: HashMap<String, Vec<String>>,
	/// Form-encoded body fields. When present the request is sent as
	/// `application/x-www-form-urlencoded` unless a `Content-Type` header overrides it.
	pub form: Option<Vec<(String, String)>>,
	/// Request timeout; defaults to 30 seconds when unset.
	pub timeout: Option<std::time::Duration>,
}
impl RequestOptions {
	/// Starts building options with a single header value.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.entry(name.into()).or_default().push(value.into());

		self
	}

	/// Sets the form body fields.
	pub fn with_form(mut self, form: Vec<(String, String)>) -> Self {
		self.form = Some(form);

		self
	}

	/// Overrides the default request timeout.
	pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}

/// Response returned by a successful (status < 400) request.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers, lower-cased names mapped to their raw values.
	pub headers: HashMap<String, String>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Returns a header value by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns the body decoded as UTF-8 text; invalid sequences are replaced.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON into `T`, preserving the failing field path on error.
	pub fn json<T>(&self, url: &str) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| {
			Error::Config(crate::error::ConfigError::JsonDecode { url: url.to_owned(), source })
		})
	}
}

/// Boxed future alias used by [`HttpClient`] so the trait stays dyn-compatible.
pub type HttpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Abstraction over HTTP transports used by every component that performs I/O.
pub trait HttpClient
where
	Self: Send + Sync + 'static,
{
	/// Performs a request, returning [`Error::Status`] for status >= 400 and
	/// [`Error::Network`] for transport failures.
	fn do_request<'a>(
		&'a self,
		method: Method,
		url: &'a Url,
		opts: RequestOptions,
	) -> HttpFuture<'a, HttpResponse>;

	/// Convenience `GET` with default options.
	fn get<'a>(&'a self, url: &'a Url) -> HttpFuture<'a, HttpResponse> {
		self.do_request(Method::Get, url, RequestOptions::default())
	}

	/// Convenience `POST`.
	fn post<'a>(&'a self, url: &'a Url, opts: RequestOptions) -> HttpFuture<'a, HttpResponse> {
		self.do_request(Method::Post, url, opts)
	}
}

/// Joins a base URL and a relative path segment without doubling or stripping slashes.
///
/// `base` may or may not carry a trailing slash; `path` may or may not carry a leading
/// one. The result always has exactly one `/` between the two components.
pub fn join_path(base: &Url, path: &str) -> Result<Url> {
	let base_str = base.as_str().trim_end_matches('/');
	let path_str = path.trim_start_matches('/');
	let joined = format!("{base_str}/{path_str}");

	Url::parse(&joined).map_err(|source| {
		Error::Config(crate::error::ConfigError::InvalidUrl { value: joined, source })
	})
}

/// Thin wrapper around [`ReqwestClient`] implementing [`HttpClient`].
///
/// Does not follow redirects: OAuth/portal endpoints are expected to respond directly,
/// and silently following an `http`-to-`https` redirect would undermine the scheme
/// invariants enforced elsewhere in the crate.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestHttpClient {
	fn default() -> Self {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Default reqwest client configuration should always build.");

		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestHttpClient {
	fn do_request<'a>(
		&'a self,
		method: Method,
		url: &'a Url,
		opts: RequestOptions,
	) -> HttpFuture<'a, HttpResponse> {
		Box::pin(async move {
			let reqwest_method = match method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
			};
			let mut builder = self
				.0
				.request(reqwest_method, url.clone())
				.timeout(opts.timeout.unwrap_or(DEFAULT_TIMEOUT));

			for (name, values) in &opts.headers {
				for value in values {
					builder = builder.header(name, value);
				}
			}
			if let Some(form) = &opts.form {
				builder = builder.form(form);
			}

			let response =
				builder.send().await.map_err(|source| Error::network(url.as_str(), source))?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.map(|(name, value)| {
					(name.as_str().to_ascii_lowercase(), value.to_str().unwrap_or("").to_owned())
				})
				.collect::<HashMap<_, _>>();
			let body = response
				.bytes()
				.await
				.map_err(|source| Error::network(url.as_str(), source))?
				.to_vec();

			if status >= 400 {
				return Err(Error::status(url.as_str(), status, String::from_utf8_lossy(&body)));
			}

			Ok(HttpResponse { status, headers, body })
		})
	}
}
