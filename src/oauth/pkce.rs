//! PKCE state/verifier/challenge generation.

// crates.io
use oauth2::{CsrfToken, PkceCodeChallenge};
// self
use crate::_prelude::*;

/// One in-flight authorization attempt's cryptographic material.
///
/// `state` and `verifier` are independent, cryptographically-random 32-byte values,
/// base64-url (no padding) encoded — 43 characters each, generated via the `oauth2`
/// crate's own CSRF-token and PKCE helpers rather than hand-rolled randomness.
pub struct PkceMaterial {
	/// Anti-CSRF value echoed back by the authorization server.
	pub state: String,
	/// Secret verifier exchanged for the authorization code.
	pub verifier: String,
	/// `base64url(SHA-256(verifier))`, sent as `code_challenge`.
	pub challenge: String,
}

/// Generates fresh `state`/`verifier`/`challenge` material for one authorization
/// attempt.
pub fn generate() -> PkceMaterial {
	let state = CsrfToken::new_random();
	let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

	PkceMaterial {
		state: state.secret().clone(),
		verifier: verifier.secret().clone(),
		challenge: challenge.as_str().to_owned(),
	}
}

/// Constant-time comparison of the callback's `state` against the session's value.
pub fn states_match(expected: &str, received: &str) -> bool {
	use subtle_compare::constant_time_eq;

	constant_time_eq(expected.as_bytes(), received.as_bytes())
}

mod subtle_compare {
	/// Minimal constant-time byte comparison; avoids pulling in a dedicated
	/// constant-time-compare crate for a single 43-byte comparison.
	pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
		if a.len() != b.len() {
			return false;
		}

		a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
	}
}
