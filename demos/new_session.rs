//! Walks through constructing a [`Session`] against an institute-access portal and
//! fetching its profile list, using the loopback redirect policy.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use portal_session_core::{
	domain::{ServerId, ServerType},
	http::{HttpFuture, ReqwestHttpClient},
	oauth::{Callbacks, Token},
	session::{NoopWireGuardPostProcessor, ServerData, Session},
};
use url::Url;

/// A minimal [`Callbacks`] implementation that prints what a real application would
/// otherwise open in a browser and persist to disk.
struct PrintingCallbacks;
impl Callbacks for PrintingCallbacks {
	fn trigger_auth<'a>(
		&'a self,
		auth_url: &'a Url,
		custom_redirect: bool,
	) -> HttpFuture<'a, Option<Url>> {
		Box::pin(async move {
			println!("Open {auth_url} in a browser (custom_redirect={custom_redirect}).");

			Ok(None)
		})
	}

	fn auth_done(&self, server_id: &ServerId, server_type: ServerType) {
		println!("Authorized {server_id} ({server_type}).");
	}

	fn tokens_updated(&self, server_id: &ServerId, server_type: ServerType, _token: &Token) {
		println!("Persist the new token for {server_id} ({server_type}).");
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let base = Url::parse("https://vpn.example.com/")?;
	let server_data = ServerData::new(ServerId::new(base.as_str())?, ServerType::Institute, base);
	let callbacks: Arc<dyn Callbacks> = Arc::new(PrintingCallbacks);

	// A real application persists tokens and re-supplies them here; omitting `prior_tokens`
	// drives the interactive authorization flow via `PrintingCallbacks::trigger_auth`.
	let session = Session::<ReqwestHttpClient, NoopWireGuardPostProcessor>::with_defaults(
		"demo-client",
		server_data,
		callbacks,
		None,
	)
	.await?;

	let profiles = session.info().await?;

	for profile in profiles.iter() {
		println!("{} ({}): {:?}", profile.display_name, profile.id, profile.protocols);
	}

	Ok(())
}
