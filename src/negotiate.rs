//! Configuration negotiator (C6): `Accept`-header selection from the caller's
//! requested protocol set, content-type classification of the `connect` response,
//! WireGuard key-pair generation, and the external post-processor handoff.
//!
//! The WireGuard/OpenVPN text-format rewriting itself is an external collaborator
//! (see the crate's top-level documentation) — this module only defines the
//! [`WireGuardPostProcessor`] interface the core calls into, and never performs the
//! rewriting.

// self
use crate::{_prelude::*, domain::TokenSecret, http::HttpFuture};

/// Protocol the caller may request from [`Session::connect`](crate::session::Session::connect).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
	/// WireGuard, optionally proxied over TCP.
	WireGuard,
	/// OpenVPN.
	OpenVpn,
}
impl Protocol {
	/// Parses a caller-supplied protocol label, case-insensitively.
	///
	/// Returns `None` for anything the negotiator does not recognize; callers map
	/// that to [`Error::UnknownProtocol`].
	pub fn parse(label: &str) -> Option<Self> {
		if label.eq_ignore_ascii_case("wireguard") {
			Some(Self::WireGuard)
		} else if label.eq_ignore_ascii_case("openvpn") {
			Some(Self::OpenVpn)
		} else {
			None
		}
	}
}
impl Display for Protocol {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Self::WireGuard => "wireguard",
			Self::OpenVpn => "openvpn",
		})
	}
}

/// Protocol tag attached to a successful [`ConnectData`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolTag {
	/// Plain (UDP) WireGuard.
	WireGuard,
	/// WireGuard tunneled over a local TCP proxy.
	WireGuardOverTcp,
	/// OpenVPN.
	OpenVpn,
}

const ACCEPT_WIREGUARD: &str = "application/x-wireguard-profile";
const ACCEPT_WIREGUARD_TCP: &str = "application/x-wireguard+tcp-profile";
const ACCEPT_OPENVPN: &str = "application/x-openvpn-profile";

/// Validates the requested protocol set and parses it into [`Protocol`] values.
///
/// Rejects an empty set with [`Error::NoProtocols`] and any unrecognized label with
/// [`Error::UnknownProtocol`], in that order, before any network I/O is performed.
pub fn validate_protocols<S: AsRef<str>>(requested: &[S]) -> Result<Vec<Protocol>> {
	if requested.is_empty() {
		return Err(Error::NoProtocols);
	}

	requested
		.iter()
		.map(|label| {
			Protocol::parse(label.as_ref())
				.ok_or_else(|| Error::UnknownProtocol { protocol: label.as_ref().to_owned() })
		})
		.collect()
}

/// Builds the `Accept` header values for the requested protocol set, per §4.5: a
/// plain WireGuard accept header is added unless `prefer_tcp` is set, the TCP-proxied
/// WireGuard accept header is always added when WireGuard is requested, and an
/// OpenVPN accept header is added when OpenVPN is requested.
pub fn accept_headers(protocols: &[Protocol], prefer_tcp: bool) -> Vec<&'static str> {
	let mut headers = Vec::with_capacity(protocols.len() + 1);

	if protocols.contains(&Protocol::WireGuard) {
		if !prefer_tcp {
			headers.push(ACCEPT_WIREGUARD);
		}

		headers.push(ACCEPT_WIREGUARD_TCP);
	}
	if protocols.contains(&Protocol::OpenVpn) {
		headers.push(ACCEPT_OPENVPN);
	}

	headers
}

/// Maps a `Content-Type` response header to the resulting [`ProtocolTag`], or
/// [`Error::InvalidContentType`] for anything the negotiator does not recognize.
pub fn map_content_type(content_type: &str) -> Result<ProtocolTag> {
	let essence = content_type.split(';').next().unwrap_or(content_type).trim();

	match essence {
		ACCEPT_WIREGUARD => Ok(ProtocolTag::WireGuard),
		ACCEPT_WIREGUARD_TCP => Ok(ProtocolTag::WireGuardOverTcp),
		ACCEPT_OPENVPN => Ok(ProtocolTag::OpenVpn),
		_ => Err(Error::InvalidContentType { content_type: content_type.to_owned() }),
	}
}

/// Parses the `expires` response header, an RFC 2822 (HTTP-date) timestamp.
pub fn parse_expires(header: Option<&str>) -> Result<OffsetDateTime> {
	let header = header.ok_or(crate::error::ConfigError::InvalidExpiresHeader)?;

	OffsetDateTime::parse(header, &time::format_description::well_known::Rfc2822)
		.map_err(|_| crate::error::ConfigError::InvalidExpiresHeader.into())
}

/// A freshly generated Curve25519 key pair for a WireGuard `connect` request.
pub struct WireGuardKeyPair {
	/// Standard (padded) base64 encoding of the private key, handed to the external
	/// post-processor — never logged.
	pub private_base64: TokenSecret,
	/// Standard (padded) base64 encoding of the public key, sent as the `public_key`
	/// form field.
	pub public_base64: String,
}

/// Generates a fresh Curve25519 key pair using the ecosystem-standard `x25519-dalek`
/// crate. The core only produces the key pair; injecting it into a WireGuard
/// configuration text is the external post-processor's job.
pub fn generate_keypair() -> WireGuardKeyPair {
	use base64::{Engine as _, engine::general_purpose::STANDARD};
	use rand::Rng;
	use x25519_dalek::{PublicKey, StaticSecret};

	let mut bytes = [0u8; 32];

	rand::rng().fill(&mut bytes);

	let secret = StaticSecret::from(bytes);
	let public = PublicKey::from(&secret);

	WireGuardKeyPair {
		private_base64: TokenSecret::new(STANDARD.encode(secret.to_bytes())),
		public_base64: STANDARD.encode(public.to_bytes()),
	}
}

/// A local UDP-to-TCP proxy endpoint extracted by the external post-processor when a
/// WireGuard configuration is TCP-proxied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxySpec {
	/// Local address the proxy listens on, e.g. `"127.0.0.1:51820"`.
	pub listen: String,
	/// Local UDP source port WireGuard should target.
	pub source_port: u16,
	/// The server-supplied `ProxyEndpoint` the proxy forwards to.
	pub peer: String,
}

/// External collaborator interface for WireGuard text-format post-processing (§6).
///
/// No implementation lives in this crate: the core only generates the key pair and
/// calls this interface with the raw server response, the private key, and whether
/// the profile negotiated a TCP-proxied transport. A real implementation injects the
/// private key into the configuration text and, when TCP-proxied, binds a local UDP
/// listener and returns the resulting [`ProxySpec`].
pub trait WireGuardPostProcessor
where
	Self: Send + Sync,
{
	/// Post-processes a raw WireGuard configuration, returning the final
	/// configuration text and, when TCP-proxied, the bound [`ProxySpec`].
	fn process<'a>(
		&'a self,
		configuration: String,
		private_key: &'a TokenSecret,
		tcp_proxied: bool,
	) -> HttpFuture<'a, (String, Option<ProxySpec>)>;
}

/// Result of a successful [`Session::connect`](crate::session::Session::connect) call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectData {
	/// Final configuration text.
	pub configuration: String,
	/// Negotiated protocol.
	pub protocol: ProtocolTag,
	/// Absolute expiry of the connection, parsed from the `expires` response header.
	pub expires: OffsetDateTime,
	/// Local proxy endpoint, present only for [`ProtocolTag::WireGuardOverTcp`].
	pub proxy: Option<ProxySpec>,
}

/// Appends the literal suffix eduVPN's OpenVPN profiles require: a trailing newline
/// and `script-security 0`.
pub fn finalize_openvpn_config(body: &str) -> String {
	format!("{body}\nscript-security 0")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn validate_protocols_rejects_empty_set() {
		let err = validate_protocols::<&str>(&[]).expect_err("Empty set should be rejected.");

		assert!(matches!(err, Error::NoProtocols));
	}

	#[test]
	fn validate_protocols_rejects_unknown_label() {
		let err = validate_protocols(&["openvpn", "wireguard", "carrier-pigeon"])
			.expect_err("Unknown protocol should be rejected.");

		assert!(matches!(err, Error::UnknownProtocol { protocol } if protocol == "carrier-pigeon"));
	}

	#[test]
	fn accept_headers_include_both_wireguard_variants_unless_tcp_preferred() {
		let protocols = vec![Protocol::WireGuard, Protocol::OpenVpn];

		assert_eq!(
			accept_headers(&protocols, false),
			vec![ACCEPT_WIREGUARD, ACCEPT_WIREGUARD_TCP, ACCEPT_OPENVPN]
		);
		assert_eq!(accept_headers(&protocols, true), vec![ACCEPT_WIREGUARD_TCP, ACCEPT_OPENVPN]);
	}

	#[test]
	fn map_content_type_recognizes_the_three_portal_mime_types() {
		assert_eq!(map_content_type(ACCEPT_WIREGUARD).unwrap(), ProtocolTag::WireGuard);
		assert_eq!(map_content_type(ACCEPT_WIREGUARD_TCP).unwrap(), ProtocolTag::WireGuardOverTcp);
		assert_eq!(map_content_type(ACCEPT_OPENVPN).unwrap(), ProtocolTag::OpenVpn);

		let err = map_content_type("text/plain").expect_err("Unknown content type should fail.");

		assert!(matches!(err, Error::InvalidContentType { .. }));
	}

	#[test]
	fn finalize_openvpn_config_appends_script_security() {
		let config = finalize_openvpn_config("remote vpn.example.com 1194");

		assert!(config.ends_with("\nscript-security 0"));
	}

	#[test]
	fn generate_keypair_produces_distinct_standard_base64_keys() {
		let a = generate_keypair();
		let b = generate_keypair();

		assert_ne!(a.public_base64, b.public_base64);
		assert_ne!(a.private_base64.expose(), b.private_base64.expose());
		assert_eq!(format!("{:?}", a.private_base64), "TokenSecret(\"<redacted>\")");
	}
}
