//! Caller-facing `Callbacks` contract (§9): `trigger_auth` is the only member that
//! performs I/O and may fail; `auth_done` and `tokens_updated` are synchronous
//! notification hooks.

// self
use crate::{
	_prelude::*,
	domain::{ServerId, ServerType},
	http::HttpFuture,
	oauth::Token,
};

/// Abstract capability set an end-user application supplies to a [`Session`](crate::session::Session).
///
/// `trigger_auth` must cause the user's browser to open `auth_url`. When
/// `custom_redirect` is `true` it should resolve to `Some(redirect_uri)` once the
/// application has captured the full callback URI by its own means (e.g. a custom
/// URI scheme); when `false` the engine itself serves the loopback `/callback` and
/// `trigger_auth` should resolve to `None` as soon as the browser has been launched.
pub trait Callbacks
where
	Self: Send + Sync,
{
	/// Launches the user's browser at `auth_url` and, for a custom redirect policy,
	/// resolves to the final callback URI.
	fn trigger_auth<'a>(
		&'a self,
		auth_url: &'a Url,
		custom_redirect: bool,
	) -> HttpFuture<'a, Option<Url>>;

	/// Called once a (re-)authorization attempt completes successfully.
	fn auth_done(&self, server_id: &ServerId, server_type: ServerType);

	/// Called with every token the engine stores, before it becomes observable
	/// through [`crate::oauth::TokenCell::access_token`]. The caller is responsible
	/// for persisting it; this crate never writes tokens to disk.
	fn tokens_updated(&self, server_id: &ServerId, server_type: ServerType, token: &Token);
}
