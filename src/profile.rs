//! Profile list domain types returned by `GET <api>/info`.
//!
//! Display-name language matching and search ranking are external collaborators (see
//! the crate's top-level documentation); this module only carries the raw data
//! through, picking a single display-name string when the portal returns a
//! language-keyed map.

// self
use crate::_prelude::*;

/// A single VPN profile offered by a portal.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Profile {
	/// Opaque profile identifier sent back as `profile_id` on `connect`.
	#[serde(rename = "profile_id")]
	pub id: String,
	/// Human-readable name, resolved to a single string from the portal's
	/// possibly-localized `display_name` field.
	#[serde(rename = "display_name", deserialize_with = "deserialize_display_name")]
	pub display_name: String,
	/// Protocols this profile supports, as returned by the portal (`"openvpn"`,
	/// `"wireguard"`).
	#[serde(rename = "vpn_proto_list")]
	pub protocols: Vec<String>,
	/// Whether this profile should route all traffic through the tunnel.
	#[serde(rename = "default_gateway", default)]
	pub default_gateway: bool,
	/// DNS search domains the tunnel should install, if any.
	#[serde(rename = "dns_search_domain_list", default)]
	pub dns_search_domains: Vec<String>,
}
impl Profile {
	/// Returns `true` when this profile advertises support for `protocol` (matched
	/// case-insensitively against the portal's raw protocol labels).
	pub fn supports(&self, protocol: &str) -> bool {
		self.protocols.iter().any(|p| p.eq_ignore_ascii_case(protocol))
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDisplayName {
	Plain(String),
	Localized(HashMap<String, String>),
}

fn deserialize_display_name<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
	D: serde::Deserializer<'de>,
{
	match RawDisplayName::deserialize(deserializer)? {
		RawDisplayName::Plain(value) => Ok(value),
		RawDisplayName::Localized(map) => Ok(map
			.get("en-US")
			.or_else(|| map.values().next())
			.cloned()
			.unwrap_or_default()),
	}
}

/// The full list of profiles returned by `GET <api>/info`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileList(Vec<Profile>);
impl ProfileList {
	/// Wraps a decoded profile list.
	pub fn new(profiles: Vec<Profile>) -> Self {
		Self(profiles)
	}

	/// Returns the profiles in portal-supplied order.
	pub fn iter(&self) -> impl Iterator<Item = &Profile> {
		self.0.iter()
	}

	/// Returns the number of profiles.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when the portal returned no profiles.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Looks up a profile by its opaque id.
	pub fn find(&self, id: &str) -> Option<&Profile> {
		self.0.iter().find(|profile| profile.id == id)
	}
}
impl From<ProfileList> for Vec<Profile> {
	fn from(value: ProfileList) -> Self {
		value.0
	}
}
impl IntoIterator for ProfileList {
	type IntoIter = std::vec::IntoIter<Profile>;
	type Item = Profile;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn deserializes_plain_display_name() {
		let profile: Profile = serde_json::from_str(
			r#"{"profile_id":"p1","display_name":"Internet","vpn_proto_list":["wireguard"]}"#,
		)
		.expect("Plain display_name should decode.");

		assert_eq!(profile.display_name, "Internet");
		assert!(profile.supports("WireGuard"));
		assert!(!profile.default_gateway);
	}

	#[test]
	fn deserializes_localized_display_name() {
		let profile: Profile = serde_json::from_str(
			r#"{"profile_id":"p1","display_name":{"en-US":"Internet","nl-NL":"Internet (nl)"},"vpn_proto_list":["openvpn"],"default_gateway":true}"#,
		)
		.expect("Localized display_name should decode.");

		assert_eq!(profile.display_name, "Internet");
		assert!(profile.default_gateway);
	}

	#[test]
	fn profile_list_finds_by_id() {
		let list = ProfileList::new(vec![Profile {
			id: "p1".into(),
			display_name: "Internet".into(),
			protocols: vec!["openvpn".into()],
			default_gateway: false,
			dns_search_domains: vec![],
		}]);

		assert!(list.find("p1").is_some());
		assert!(list.find("missing").is_none());
		assert_eq!(list.len(), 1);
	}
}
