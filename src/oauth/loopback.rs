//! Local loopback HTTP callback receiver (§4.1, §9).
//!
//! Scoped to one authorization attempt: the listener is bound by [`super::engine::Engine`]
//! right before the authorization URL is built, and [`await_callback`] serves exactly
//! one matching request on `/callback` before returning. Any other request receives a
//! small HTML page telling the user they may close the tab, and the loop continues
//! waiting for the real callback. Dropping the future driving this call (cancellation)
//! closes the listener and aborts any in-flight read, per the crate's cancellation
//! model.

// crates.io
use tokio::{
	io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
	net::TcpListener,
};
// self
use crate::_prelude::*;

const CLOSE_TAB_BODY: &str = "<html><body>You may close this tab.</body></html>";

/// Extracts `code` and `state` from a request path+query string (`/callback?code=...`).
fn parse_callback_query(request_target: &str) -> HashMap<String, String> {
	let query = request_target.splitn(2, '?').nth(1).unwrap_or("");

	url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

/// Serves the loopback listener until exactly one request targeting `/callback`
/// arrives, returning its `code` and `state` query parameters.
///
/// Fails with [`Error::AuthMissingCode`] if the matching request lacks a `code`
/// parameter. A missing `state` is tolerated here and surfaced later by the state
/// comparison in [`super::pkce::states_match`], consistent with [`Error::AuthStateMismatch`]
/// being the state-specific failure mode.
pub async fn await_callback(listener: TcpListener) -> Result<(String, String)> {
	loop {
		let (stream, _peer) = listener
			.accept()
			.await
			.map_err(|source| Error::network("127.0.0.1 (loopback callback)", source))?;
		let mut reader = BufReader::new(stream);
		let mut request_line = String::new();

		reader
			.read_line(&mut request_line)
			.await
			.map_err(|source| Error::network("127.0.0.1 (loopback callback)", source))?;

		// Drain the remaining headers; the callback never carries a body we need.
		loop {
			let mut line = String::new();
			let n = reader
				.read_line(&mut line)
				.await
				.map_err(|source| Error::network("127.0.0.1 (loopback callback)", source))?;

			if n == 0 || line == "\r\n" || line == "\n" {
				break;
			}
		}

		let request_target = request_line.split_whitespace().nth(1).unwrap_or("");
		let stream = reader.into_inner();

		if !request_target.starts_with("/callback") {
			respond(stream, 404, CLOSE_TAB_BODY).await?;
			continue;
		}

		let params = parse_callback_query(request_target);
		let code = params.get("code").cloned();
		let state = params.get("state").cloned().unwrap_or_default();

		respond(stream, 200, CLOSE_TAB_BODY).await?;

		return match code {
			Some(code) => Ok((code, state)),
			None => Err(Error::AuthMissingCode),
		};
	}
}

async fn respond(
	mut stream: impl tokio::io::AsyncWrite + Unpin,
	status: u16,
	body: &str,
) -> Result<()> {
	let reason = if status == 200 { "OK" } else { "Not Found" };
	let response = format!(
		"HTTP/1.1 {status} {reason}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
		body.len()
	);

	stream
		.write_all(response.as_bytes())
		.await
		.map_err(|source| Error::network("127.0.0.1 (loopback callback)", source))
}

/// Extracts `code` and `state` from a full redirect URI, used for the custom-redirect
/// policy where the caller's own means (not the loopback listener) delivers it.
pub fn extract_from_redirect_uri(uri: &Url) -> Result<(String, String)> {
	let mut code = None;
	let mut state = None;

	for (key, value) in uri.query_pairs() {
		match key.as_ref() {
			"code" => code = Some(value.into_owned()),
			"state" => state = Some(value.into_owned()),
			_ => {},
		}
	}

	code.map(|code| (code, state.unwrap_or_default())).ok_or(Error::AuthMissingCode)
}
