//! OAuth parameter canonicalization
//!
//! Both the live session token negotiation and every signed API request build
//! a base string from the same sorted parameter set, but they encode it
//! differently:
//!
//! - [`negotiation_signature_fragment`] percent-encodes each key and value,
//!   joins them, then percent-encodes the joined string again.
//! - [`request_signature_fragment`] joins raw `key=value` pairs and
//!   percent-encodes the joined string once.
//!
//! The server checks each base string against its own encoding, so the two
//! must not be unified.

use std::collections::BTreeMap;
use std::fmt::Write;

/// Realm appended to every `Authorization` header
pub const REALM: &str = "limited_poa";

/// Percent-encode per RFC 3986
///
/// Unreserved characters (`A-Z a-z 0-9 - . _ ~`) pass through, every other
/// byte becomes `%XX` with upper-case hex.
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// OAuth parameters, ordered by key
///
/// Keys sort by byte value, independent of locale. A set embeds a fresh nonce
/// and timestamp and is rebuilt for every signed operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthParameterSet {
    params: BTreeMap<String, String>,
}

impl OAuthParameterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OAuthParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Base string fragment for the live session token request
///
/// `"&" + enc(enc(k1)=enc(v1)&enc(k2)=enc(v2)...)`, empty for an empty set.
pub fn negotiation_signature_fragment(params: &OAuthParameterSet) -> String {
    if params.is_empty() {
        return String::new();
    }

    let joined = params
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    format!("&{}", percent_encode(&joined))
}

/// Base string fragment for ordinary signed API requests
///
/// `"&" + enc(k1=v1&k2=v2...)`, empty for an empty set.
pub fn request_signature_fragment(params: &OAuthParameterSet) -> String {
    if params.is_empty() {
        return String::new();
    }

    let joined = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("&{}", percent_encode(&joined))
}

/// `Authorization` header value
///
/// `OAuth k1="v1", k2="v2", realm="limited_poa"`. Values are emitted as
/// given; signatures must already be percent-encoded. A `realm` entry in the
/// set is ignored, the header always ends with the fixed realm. An empty set
/// yields exactly `"OAuth "`.
pub fn authorization_header(params: &OAuthParameterSet) -> String {
    let mut header = String::from("OAuth ");
    if params.is_empty() {
        return header;
    }

    for (key, value) in params.iter().filter(|(key, _)| *key != "realm") {
        // Writing into a String cannot fail
        let _ = write!(header, "{key}=\"{value}\", ");
    }
    let _ = write!(header, "realm=\"{REALM}\"");
    header
}
