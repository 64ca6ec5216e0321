// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password hashing for stored Unix password entries.
//!
//! [`cups_crypt`] hashes a cleartext password under the salt of a stored
//! hash so the two can be compared. `$1$` salts select the portable
//! FreeBSD MD5-crypt implementation below; anything else defers to the
//! platform's traditional `crypt(3)`, which is only linked when the
//! `legacy-crypt` feature is enabled. Without it, traditional hashes
//! yield `None` and verification fails closed.

/// Radix-64 alphabet used by crypt-style encodings.
const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Number of stretching rounds in MD5-crypt.
const ROUNDS: usize = 1000;

/// Hash `password` under the salt of a stored hash.
///
/// Returns `None` when the salt names a scheme that is unavailable in
/// this build.
pub fn cups_crypt(password: &str, salt: &str) -> Option<String> {
	if salt.starts_with("$1$") {
		Some(md5_crypt(password, salt))
	} else {
		legacy_crypt(password, salt)
	}
}

/// The FreeBSD MD5-crypt algorithm.
///
/// The salt segment is at most 8 characters between `$1$` and the next
/// `$`. Output is `$1$<segment>$` followed by 22 radix-64 characters of
/// the permuted digest.
fn md5_crypt(password: &str, salt: &str) -> String {
	let segment = salt[3..].split('$').next().unwrap_or("");
	let mut end = segment.len().min(8);
	while !segment.is_char_boundary(end) {
		end -= 1;
	}
	let segment = &segment[..end];

	let pw = password.as_bytes();

	let mut primary = md5::Context::new();
	primary.consume(pw);
	primary.consume(b"$1$");
	primary.consume(segment.as_bytes());

	let mut alternate = md5::Context::new();
	alternate.consume(pw);
	alternate.consume(segment.as_bytes());
	alternate.consume(pw);
	let alternate = alternate.compute();

	let mut remaining = pw.len();
	while remaining > 0 {
		primary.consume(&alternate[..remaining.min(16)]);
		remaining = remaining.saturating_sub(16);
	}

	let mut bit = pw.len();
	while bit > 0 {
		if bit & 1 == 1 {
			primary.consume([0u8]);
		} else {
			primary.consume(&pw[..1]);
		}
		bit >>= 1;
	}

	let mut digest = primary.compute().0;

	for round in 0..ROUNDS {
		let mut ctx = md5::Context::new();
		if round & 1 == 1 {
			ctx.consume(pw);
		} else {
			ctx.consume(digest);
		}
		if round % 3 != 0 {
			ctx.consume(segment.as_bytes());
		}
		if round % 7 != 0 {
			ctx.consume(pw);
		}
		if round & 1 == 1 {
			ctx.consume(digest);
		} else {
			ctx.consume(pw);
		}
		digest = ctx.compute().0;
	}

	let mut out = String::with_capacity(3 + segment.len() + 1 + 22);
	out.push_str("$1$");
	out.push_str(segment);
	out.push('$');

	for (a, b, c) in [(0, 6, 12), (1, 7, 13), (2, 8, 14), (3, 9, 15), (4, 10, 5)] {
		let group =
			(u32::from(digest[a]) << 16) | (u32::from(digest[b]) << 8) | u32::from(digest[c]);
		to64(&mut out, group, 4);
	}
	to64(&mut out, u32::from(digest[11]), 2);

	out
}

/// Radix-64 encode `value` into `n` characters, least significant first.
fn to64(out: &mut String, mut value: u32, n: usize) {
	for _ in 0..n {
		out.push(ITOA64[(value & 0x3f) as usize] as char);
		value >>= 6;
	}
}

#[cfg(all(unix, feature = "legacy-crypt"))]
fn legacy_crypt(password: &str, salt: &str) -> Option<String> {
	use std::ffi::{CStr, CString};
	use std::os::raw::c_char;

	#[link(name = "crypt")]
	extern "C" {
		fn crypt(key: *const c_char, salt: *const c_char) -> *mut c_char;
	}

	let key = CString::new(password).ok()?;
	let salt = CString::new(salt).ok()?;

	// crypt(3) returns a pointer into static storage; the engine's
	// one-request-at-a-time dispatch keeps this safe.
	unsafe {
		let hash = crypt(key.as_ptr(), salt.as_ptr());
		if hash.is_null() {
			None
		} else {
			Some(CStr::from_ptr(hash).to_string_lossy().into_owned())
		}
	}
}

#[cfg(not(all(unix, feature = "legacy-crypt")))]
fn legacy_crypt(_password: &str, _salt: &str) -> Option<String> {
	tracing::warn!("traditional crypt(3) hash encountered without the legacy-crypt feature");
	None
}
