// self
use crate::_prelude::*;

/// Provider-specific quirks that influence how device requests are shaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Character used to join scopes when constructing the `scope` parameter.
	pub scope_delimiter: char,
	/// Shows `verification_uri_complete` (code embedded) instead of the bare URI when present.
	pub prefer_complete_verification_uri: bool,
	/// Accepts Google's non-standard `verification_url` spelling.
	pub accept_verification_url_alias: bool,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self {
			scope_delimiter: ' ',
			prefer_complete_verification_uri: true,
			accept_verification_url_alias: true,
		}
	}
}
