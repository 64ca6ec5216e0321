// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP Digest helpers.
//!
//! The HA1/response construction follows RFC 2617 without qop:
//! `HA1 = md5(user:realm:pass)`, `HA2 = md5(method:uri)`,
//! `response = md5(HA1:nonce:HA2)`. The realm is pinned so stored HA1
//! values in `passwd.md5` stay verifiable.
//!
//! [`auth_sub_field`] extracts one named parameter (`nonce="..."`) from a
//! raw Authorization header value, handling both quoted-string and token
//! forms.

/// Realm all Digest HA1 values are computed under.
///
/// Fixed for compatibility with existing `passwd.md5` stores.
pub const DIGEST_REALM: &str = "CUPS";

/// Compute the HA1 hash for a user/realm/password triple.
pub fn md5_ha1(username: &str, realm: &str, password: &str) -> String {
	format!("{:x}", md5::compute(format!("{username}:{realm}:{password}")))
}

/// Compute the final Digest response from a nonce, method name, resource
/// path, and a stored HA1 hex string.
pub fn md5_final(nonce: &str, method: &str, resource: &str, ha1: &str) -> String {
	let ha2 = format!("{:x}", md5::compute(format!("{method}:{resource}")));
	format!("{:x}", md5::compute(format!("{ha1}:{nonce}:{ha2}")))
}

/// Extract a named sub-field from a credentials header value such as
/// `Digest username="bob", nonce="host", response=...`.
///
/// The scheme token before the first whitespace is skipped; parameter
/// names compare case-insensitively; values may be quoted strings (no
/// escapes) or tokens terminated by a comma or whitespace.
pub fn auth_sub_field(value: &str, name: &str) -> Option<String> {
	let (_, mut rest) = value.split_once(char::is_whitespace)?;

	loop {
		rest = rest.trim_start_matches([' ', '\t', ',']);
		if rest.is_empty() {
			return None;
		}

		let eq = rest.find('=')?;
		let key = rest[..eq].trim();
		rest = &rest[eq + 1..];

		let field;
		if let Some(quoted) = rest.strip_prefix('"') {
			let end = quoted.find('"')?;
			field = &quoted[..end];
			rest = &quoted[end + 1..];
		} else {
			let end = rest
				.find([',', ' ', '\t'])
				.unwrap_or(rest.len());
			field = &rest[..end];
			rest = &rest[end..];
		}

		if key.eq_ignore_ascii_case(name) {
			return Some(field.to_string());
		}
	}
}

/// Constant-time equality for hex digest strings.
pub(crate) fn digests_match(a: &str, b: &str) -> bool {
	let a = a.as_bytes();
	let b = b.as_bytes();
	if a.len() != b.len() {
		return false;
	}
	a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
