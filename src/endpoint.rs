//! Well-known endpoint document parsing/validation (C1) and the process-wide,
//! freshness-windowed cache that fronts it (C2).

// std
use std::sync::OnceLock;
// self
use crate::{
	_prelude::*,
	http::{HttpClient, join_path},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Literal key of the v3 API sub-object in the well-known document, as published by
/// the portal (`http://eduvpn.org/api#3`). Not a real URL; it is just a version tag.
const V3_KEY: &str = "http://eduvpn.org/api#3";
/// Entries younger than this are served without a network round trip.
const FRESHNESS_WINDOW: Duration = Duration::minutes(10);

#[derive(Deserialize)]
struct RawDocument {
	api: HashMap<String, RawV3Endpoints>,
}

#[derive(Deserialize)]
struct RawV3Endpoints {
	api_endpoint: String,
	authorization_endpoint: String,
	token_endpoint: String,
}

/// Validated `{api, authorization, token}` triple extracted from a well-known document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointTriple {
	/// API base URL; every session, info, connect, and disconnect call is rooted here.
	pub api: Url,
	/// Authorization endpoint used to build the PKCE authorization URL.
	pub authorization: Url,
	/// Token endpoint used for both the code exchange and refresh grants.
	pub token: Url,
}
impl EndpointTriple {
	fn parse(raw: &RawV3Endpoints, base: &Url) -> Result<Self> {
		let parse_one = |value: &str| {
			Url::parse(value).map_err(|_| Error::EndpointInvalid {
				base: base.to_string(),
				reason: format!("endpoint URL `{value}` does not parse"),
			})
		};
		let api = parse_one(&raw.api_endpoint)?;
		let authorization = parse_one(&raw.authorization_endpoint)?;
		let token = parse_one(&raw.token_endpoint)?;

		if api.scheme() != "https" {
			return Err(Error::EndpointInvalid {
				base: base.to_string(),
				reason: "api endpoint must use https".into(),
			});
		}
		if api.scheme() != authorization.scheme() || api.scheme() != token.scheme() {
			return Err(Error::EndpointInvalid {
				base: base.to_string(),
				reason: "api, authorization, and token endpoints must share a scheme".into(),
			});
		}
		// Stricter variant per the resolved open question in the design notes: enforce
		// host equality too, not just scheme equality, to guard against mixed-origin
		// authorization endpoints.
		if api.host_str() != authorization.host_str() || api.host_str() != token.host_str() {
			return Err(Error::EndpointInvalid {
				base: base.to_string(),
				reason: "api, authorization, and token endpoints must share a host".into(),
			});
		}

		Ok(Self { api, authorization, token })
	}
}

/// Parsed and validated well-known document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointDocument {
	/// The validated v3 endpoint triple.
	pub endpoints: EndpointTriple,
}

struct CacheEntry {
	doc: EndpointDocument,
	fetched_at: OffsetDateTime,
}

/// Per-base-URL memoization of well-known documents with a 10-minute freshness window.
///
/// At most one in-flight refetch per key is guaranteed via a `HashMap<Url,
/// Arc<AsyncMutex<()>>>` of singleflight guards, the same shape the rest of the crate
/// uses for serializing concurrent work on a shared key.
pub struct EndpointCache<C: HttpClient> {
	http: Arc<C>,
	entries: Mutex<HashMap<Url, CacheEntry>>,
	inflight: Mutex<HashMap<Url, Arc<AsyncMutex<()>>>>,
}
impl<C: HttpClient> EndpointCache<C> {
	/// Builds a cache backed by the given HTTP client. Prefer [`EndpointCache::global`]
	/// for the process-wide singleton; construct directly when injecting a cache for
	/// testability.
	pub fn new(http: Arc<C>) -> Self {
		Self { http, entries: Mutex::new(HashMap::new()), inflight: Mutex::new(HashMap::new()) }
	}

	/// Returns the cached document for `well_known_base`, fetching and validating it on
	/// a miss or after the 10-minute freshness window elapses. Failures never populate
	/// or clear the cache; the previous entry, if any, is retained untouched.
	pub async fn get(&self, well_known_base: &Url) -> Result<EndpointDocument> {
		if let Some(doc) = self.fresh_entry(well_known_base) {
			return Ok(doc);
		}

		let guard = {
			let mut inflight = self.inflight.lock();

			inflight.entry(well_known_base.clone()).or_insert_with(Default::default).clone()
		};
		let _permit = guard.lock().await;

		// Another caller may have refreshed the entry while we waited on the guard.
		if let Some(doc) = self.fresh_entry(well_known_base) {
			return Ok(doc);
		}

		let doc = self.fetch(well_known_base).await?;

		self.entries.lock().insert(
			well_known_base.clone(),
			CacheEntry { doc: doc.clone(), fetched_at: OffsetDateTime::now_utc() },
		);

		Ok(doc)
	}

	fn fresh_entry(&self, well_known_base: &Url) -> Option<EndpointDocument> {
		let entries = self.entries.lock();
		let entry = entries.get(well_known_base)?;

		if OffsetDateTime::now_utc() - entry.fetched_at < FRESHNESS_WINDOW {
			Some(entry.doc.clone())
		} else {
			None
		}
	}

	async fn fetch(&self, base: &Url) -> Result<EndpointDocument> {
		let url = join_path(base, ".well-known/vpn-user-portal")?;
		let response = self.http.get(&url).await?;
		let raw: RawDocument = response.json(url.as_str())?;
		let v3 = raw.api.get(V3_KEY).ok_or_else(|| Error::EndpointInvalid {
			base: base.to_string(),
			reason: format!("document is missing the `{V3_KEY}` entry"),
		})?;
		let endpoints = EndpointTriple::parse(v3, base)?;

		Ok(EndpointDocument { endpoints })
	}
}

#[cfg(feature = "reqwest")]
static GLOBAL: OnceLock<Arc<EndpointCache<ReqwestHttpClient>>> = OnceLock::new();

#[cfg(feature = "reqwest")]
impl EndpointCache<ReqwestHttpClient> {
	/// Returns the lazily-initialized, process-wide cache shared by every [`Session`](crate::session::Session)
	/// constructed with the default reqwest transport.
	pub fn global() -> Arc<Self> {
		GLOBAL.get_or_init(|| Arc::new(Self::new(Arc::new(ReqwestHttpClient::default())))).clone()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::http::ReqwestHttpClient;

	fn v3_body(api: &str, auth: &str, token: &str) -> String {
		format!(
			r#"{{"api":{{"{V3_KEY}":{{"api_endpoint":"{api}","authorization_endpoint":"{auth}","token_endpoint":"{token}"}}}},"v":"3.0"}}"#
		)
	}

	#[tokio::test]
	async fn validates_scheme_and_host_consistency() {
		let server = httpmock::MockServer::start();
		let base = server.url("");
		let body =
			v3_body("http://evil.example.com/api", "https://vpn.example.com/auth", "https://vpn.example.com/token");

		server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200).header("content-type", "application/json").body(&body);
		});

		let http = Arc::new(ReqwestHttpClient::default());
		let cache = EndpointCache::new(http);
		let base_url = Url::parse(&base).expect("Mock base URL should parse.");
		let err = cache.get(&base_url).await.expect_err("Mismatched scheme should be rejected.");

		assert!(matches!(err, Error::EndpointInvalid { .. }));
	}

	#[tokio::test]
	async fn caches_repeat_lookups_within_the_freshness_window() {
		let server = httpmock::MockServer::start();
		let base = server.url("");
		let endpoint = format!("{base}/api");
		let body = v3_body(&endpoint, &format!("{endpoint}/auth"), &format!("{endpoint}/token"));
		// httpmock counts hits on the mock itself.
		let mock = server.mock(|when, then| {
			when.method(httpmock::Method::GET).path("/.well-known/vpn-user-portal");
			then.status(200).header("content-type", "application/json").body(&body);
		});

		let http = Arc::new(ReqwestHttpClient::default());
		let cache = EndpointCache::new(http);
		let base_url = Url::parse(&base).expect("Mock base URL should parse.");
		let first = cache.get(&base_url).await.expect("First fetch should succeed.");
		let second = cache.get(&base_url).await.expect("Second fetch should hit the cache.");

		assert_eq!(first, second);
		mock.assert_hits(1);
	}
}
