//! Walks through requesting a WireGuard configuration for a chosen profile, supplying
//! a custom [`WireGuardPostProcessor`] that stands in for the external text-format
//! rewriting described in the crate's top-level documentation.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use portal_session_core::{
	domain::{ServerId, ServerType, TokenSecret},
	http::{HttpFuture, ReqwestHttpClient},
	negotiate::ProxySpec,
	oauth::{Callbacks, Token},
	profile::Profile,
	session::{ServerData, Session},
};
use url::Url;

struct SilentCallbacks;
impl Callbacks for SilentCallbacks {
	fn trigger_auth<'a>(
		&'a self,
		_auth_url: &'a Url,
		_custom_redirect: bool,
	) -> HttpFuture<'a, Option<Url>> {
		Box::pin(async move { Ok(None) })
	}

	fn auth_done(&self, _server_id: &ServerId, _server_type: ServerType) {}

	fn tokens_updated(&self, _server_id: &ServerId, _server_type: ServerType, _token: &Token) {}
}

/// Stands in for the real post-processor: a production caller would inject the
/// private key into the WireGuard text format and, when `tcp_proxied` is set, bind
/// the local UDP-to-TCP proxy described in the crate's top-level documentation.
struct DemoWireGuardPostProcessor;
impl portal_session_core::negotiate::WireGuardPostProcessor for DemoWireGuardPostProcessor {
	fn process<'a>(
		&'a self,
		configuration: String,
		_private_key: &'a TokenSecret,
		tcp_proxied: bool,
	) -> HttpFuture<'a, (String, Option<ProxySpec>)> {
		Box::pin(async move {
			let proxy = tcp_proxied.then(|| ProxySpec {
				listen: "127.0.0.1:51820".into(),
				source_port: 51820,
				peer: "https://proxy.example.com".into(),
			});

			Ok((configuration, proxy))
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let base = Url::parse("https://vpn.example.com/")?;
	let server_data = ServerData::new(ServerId::new(base.as_str())?, ServerType::Institute, base);
	let callbacks: Arc<dyn Callbacks> = Arc::new(SilentCallbacks);
	let http = Arc::new(ReqwestHttpClient::default());
	let cache = portal_session_core::endpoint::EndpointCache::global();
	let session = Session::new(
		"demo-client",
		server_data,
		callbacks,
		http,
		cache,
		Arc::new(DemoWireGuardPostProcessor),
		None,
	)
	.await?;

	let profiles = session.info().await?;
	let profile = profiles
		.iter()
		.find(|p| p.supports("wireguard"))
		.cloned()
		.unwrap_or_else(|| Profile {
			id: "default".into(),
			display_name: "Default".into(),
			protocols: vec!["wireguard".into()],
			default_gateway: true,
			dns_search_domains: vec![],
		});
	let data = session.connect(&profile, &["wireguard"], true).await?;

	println!("Negotiated {:?}, expires {}.", data.protocol, data.expires);

	if let Some(proxy) = &data.proxy {
		println!("TCP proxy listening on {} toward {}.", proxy.listen, proxy.peer);
	}

	Ok(())
}
