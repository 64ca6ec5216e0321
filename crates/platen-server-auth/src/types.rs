// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for the authorization engine.
//!
//! This module defines the vocabulary the rest of the crate speaks:
//!
//! - [`HttpState`]: the request state delivered by the HTTP parser, with
//!   its mapping to method-limit bits and to the method name used in
//!   Digest response computation
//! - [`LimitMask`]: the per-location bitmask of HTTP methods a policy
//!   applies to, including the synthetic IPP bit
//! - Policy knobs: [`Order`], [`AuthLevel`], [`AuthType`], [`Satisfy`],
//!   [`Encryption`]
//! - [`Decision`]: the four-way outcome handed back to the HTTP layer
//! - [`IpWords`]: the 4-word canonical address form all mask arithmetic
//!   runs on (IPv4 lives in the low word only)
//! - [`RequestContext`]: the immutable per-request client view
//!
//! All policy attributes are computed before evaluation; the engine never
//! reaches back into the HTTP layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::location::LocationId;

// =============================================================================
// HTTP request states and method limits
// =============================================================================

bitflags::bitflags! {
	/// Bitmask of HTTP methods a location policy applies to.
	///
	/// `IPP` is a synthetic bit for policies limited to IPP operations
	/// rather than plain HTTP methods.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
	pub struct LimitMask: u16 {
		const GET     = 0x0001;
		const HEAD    = 0x0002;
		const OPTIONS = 0x0004;
		const POST    = 0x0008;
		const PUT     = 0x0010;
		const DELETE  = 0x0020;
		const TRACE   = 0x0040;
		const IPP     = 0x0080;
		const ALL     = 0x00ff;
	}
}

/// HTTP client request states, as delivered by the HTTP parser.
///
/// The send/receive sub-states share their base method's limit bit and
/// method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpState {
	Waiting,
	Options,
	Get,
	GetSend,
	Head,
	Post,
	PostRecv,
	PostSend,
	Put,
	PutRecv,
	Delete,
	Trace,
	Close,
	Status,
}

impl HttpState {
	/// The limit bit this request state falls under.
	///
	/// States with no method (waiting, close, status) match every policy.
	pub fn limit(self) -> LimitMask {
		match self {
			HttpState::Waiting | HttpState::Close | HttpState::Status => LimitMask::ALL,
			HttpState::Options => LimitMask::OPTIONS,
			HttpState::Get | HttpState::GetSend => LimitMask::GET,
			HttpState::Head => LimitMask::HEAD,
			HttpState::Post | HttpState::PostRecv | HttpState::PostSend => LimitMask::POST,
			HttpState::Put | HttpState::PutRecv => LimitMask::PUT,
			HttpState::Delete => LimitMask::DELETE,
			HttpState::Trace => LimitMask::TRACE,
		}
	}

	/// The method name used when computing a Digest response for this state.
	pub fn method_name(self) -> &'static str {
		match self {
			HttpState::Waiting => "WAITING",
			HttpState::Options => "OPTIONS",
			HttpState::Get | HttpState::GetSend => "GET",
			HttpState::Head => "HEAD",
			HttpState::Post | HttpState::PostRecv | HttpState::PostSend => "POST",
			HttpState::Put | HttpState::PutRecv => "PUT",
			HttpState::Delete => "DELETE",
			HttpState::Trace => "TRACE",
			HttpState::Close => "CLOSE",
			HttpState::Status => "STATUS",
		}
	}
}

// =============================================================================
// Policy knobs
// =============================================================================

/// Composition rule between a location's allow and deny mask lists.
///
/// The second phase always overwrites the first; it never short-circuits.
/// Under [`Order::DenyAllow`] an allow match therefore wins even when a
/// deny mask also matched, and vice versa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
	/// `Order Deny,Allow`: default Allow; deny masks first, then allow
	/// masks. Allow wins.
	#[default]
	DenyAllow,
	/// `Order Allow,Deny`: default Deny; allow masks first, then deny
	/// masks. Deny wins.
	AllowDeny,
}

/// Access level a location requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthLevel {
	#[default]
	Anonymous,
	User,
	Group,
}

impl fmt::Display for AuthLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuthLevel::Anonymous => write!(f, "ANON"),
			AuthLevel::User => write!(f, "USER"),
			AuthLevel::Group => write!(f, "GROUP"),
		}
	}
}

/// Credential scheme a location requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
	/// No scheme pinned; the configured default applies once credentials
	/// are actually needed.
	#[default]
	None,
	Basic,
	Digest,
	/// HTTP Basic verified against the MD5 password file.
	BasicDigest,
}

impl fmt::Display for AuthType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuthType::None => write!(f, "NONE"),
			AuthType::Basic => write!(f, "BASIC"),
			AuthType::Digest => write!(f, "DIGEST"),
			AuthType::BasicDigest => write!(f, "BASICDIGEST"),
		}
	}
}

/// Whether host-level access and credentials must both pass, or either
/// suffices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Satisfy {
	#[default]
	All,
	Any,
}

/// Minimum transport encryption a location requires.
///
/// Ordered so that `>= Required` selects exactly the levels that force an
/// upgrade on a cleartext connection.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Encryption {
	#[default]
	IfRequested,
	Never,
	Required,
}

// =============================================================================
// Decisions
// =============================================================================

/// Outcome of an authorization check, as consumed by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
	/// Request is authorized.
	Allow,
	/// Credentials are needed or did not verify; challenge the client.
	Unauthorized,
	/// Credentials will not be accepted from this client.
	Forbidden,
	/// The client must switch to a secured transport first.
	UpgradeRequired,
}

impl Decision {
	/// The HTTP status code this decision maps to.
	pub fn http_status(self) -> u16 {
		match self {
			Decision::Allow => 200,
			Decision::Unauthorized => 401,
			Decision::Forbidden => 403,
			Decision::UpgradeRequired => 426,
		}
	}
}

impl fmt::Display for Decision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Decision::Allow => write!(f, "OK"),
			Decision::Unauthorized => write!(f, "Unauthorized"),
			Decision::Forbidden => write!(f, "Forbidden"),
			Decision::UpgradeRequired => write!(f, "Upgrade Required"),
		}
	}
}

// =============================================================================
// Canonical addresses
// =============================================================================

/// Canonical 4-word address form used for all mask arithmetic.
///
/// IPv6 addresses occupy all four words, most significant first. IPv4
/// addresses live in word 3 with the upper words zeroed (not the
/// v4-mapped IPv6 form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpWords(pub [u32; 4]);

impl IpWords {
	/// The all-zero address. Also doubles as the "match everything"
	/// netmask complement.
	pub const ZERO: IpWords = IpWords([0; 4]);

	/// The all-ones netmask (exact-host match).
	pub const HOST_MASK: IpWords = IpWords([u32::MAX; 4]);

	/// Applies a netmask word-by-word.
	pub fn masked(self, netmask: IpWords) -> IpWords {
		IpWords([
			self.0[0] & netmask.0[0],
			self.0[1] & netmask.0[1],
			self.0[2] & netmask.0[2],
			self.0[3] & netmask.0[3],
		])
	}

	/// True when this address lies in `address`/`netmask`. The network
	/// address is expected to be pre-masked.
	pub fn in_network(self, address: IpWords, netmask: IpWords) -> bool {
		self.masked(netmask) == address
	}
}

impl From<IpAddr> for IpWords {
	fn from(addr: IpAddr) -> Self {
		match addr {
			IpAddr::V4(v4) => IpWords([0, 0, 0, u32::from_be_bytes(v4.octets())]),
			IpAddr::V6(v6) => {
				let o = v6.octets();
				IpWords([
					u32::from_be_bytes([o[0], o[1], o[2], o[3]]),
					u32::from_be_bytes([o[4], o[5], o[6], o[7]]),
					u32::from_be_bytes([o[8], o[9], o[10], o[11]]),
					u32::from_be_bytes([o[12], o[13], o[14], o[15]]),
				])
			}
		}
	}
}

// =============================================================================
// Request context
// =============================================================================

/// The immutable client view the engine evaluates.
///
/// Every field is extracted by the HTTP/IPP layer before the engine runs;
/// the engine never parses headers beyond sub-field lookup on the raw
/// `authorization` value.
#[derive(Debug, Clone)]
pub struct RequestContext {
	/// Request path (already percent-decoded by the HTTP layer).
	pub uri: String,
	/// HTTP request state.
	pub state: HttpState,
	/// Canonical client hostname, as resolved by the HTTP layer.
	pub hostname: String,
	/// Client socket address.
	pub address: IpAddr,
	/// True when the connection runs over a secured transport.
	pub encrypted: bool,
	/// Username extracted from the Authorization header; empty when the
	/// client presented none.
	pub username: String,
	/// Cleartext password (Basic) or response hash (Digest); empty when
	/// the client presented none.
	pub password: String,
	/// Raw Authorization header value, kept for sub-field lookup and for
	/// the local-certificate scheme check. When this begins with `Local`
	/// on a localhost connection, the engine trusts that the HTTP layer
	/// already validated the per-connection token.
	pub authorization: String,
	/// The `requesting-user-name` attribute of the parsed IPP request,
	/// when one was present.
	pub ipp_request_user: Option<String>,
	/// Best-matching location for this request, as determined by
	/// [`LocationTable::find_best`](crate::LocationTable::find_best).
	pub best: Option<LocationId>,
}

impl RequestContext {
	/// Creates a context with no credentials and no matched location.
	pub fn new(
		state: HttpState,
		uri: impl Into<String>,
		address: IpAddr,
		hostname: impl Into<String>,
	) -> Self {
		Self {
			uri: uri.into(),
			state,
			hostname: hostname.into(),
			address,
			encrypted: false,
			username: String::new(),
			password: String::new(),
			authorization: String::new(),
			ipp_request_user: None,
			best: None,
		}
	}

	/// Builder: set the extracted username and password/response.
	pub fn with_credentials(
		mut self,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		self.username = username.into();
		self.password = password.into();
		self
	}

	/// Builder: set the raw Authorization header value.
	pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
		self.authorization = authorization.into();
		self
	}

	/// Builder: mark the transport as secured.
	pub fn with_encrypted(mut self, encrypted: bool) -> Self {
		self.encrypted = encrypted;
		self
	}

	/// Builder: set the IPP `requesting-user-name` attribute.
	pub fn with_ipp_request_user(mut self, name: impl Into<String>) -> Self {
		self.ipp_request_user = Some(name.into());
		self
	}

	/// Builder: set the best-matching location.
	pub fn with_best(mut self, best: Option<LocationId>) -> Self {
		self.best = best;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::Ipv4Addr;
	use std::net::Ipv6Addr;

	mod limits {
		use super::*;

		#[test]
		fn methodless_states_match_all() {
			assert_eq!(HttpState::Waiting.limit(), LimitMask::ALL);
			assert_eq!(HttpState::Close.limit(), LimitMask::ALL);
			assert_eq!(HttpState::Status.limit(), LimitMask::ALL);
		}

		#[test]
		fn substates_share_the_base_method_bit() {
			assert_eq!(HttpState::GetSend.limit(), LimitMask::GET);
			assert_eq!(HttpState::PostRecv.limit(), LimitMask::POST);
			assert_eq!(HttpState::PostSend.limit(), LimitMask::POST);
			assert_eq!(HttpState::PutRecv.limit(), LimitMask::PUT);
		}

		#[test]
		fn all_contains_every_method_bit() {
			for bit in [
				LimitMask::GET,
				LimitMask::HEAD,
				LimitMask::OPTIONS,
				LimitMask::POST,
				LimitMask::PUT,
				LimitMask::DELETE,
				LimitMask::TRACE,
				LimitMask::IPP,
			] {
				assert!(LimitMask::ALL.contains(bit));
			}
		}

		#[test]
		fn method_names_follow_the_request_state() {
			assert_eq!(HttpState::GetSend.method_name(), "GET");
			assert_eq!(HttpState::PostRecv.method_name(), "POST");
			assert_eq!(HttpState::Waiting.method_name(), "WAITING");
		}
	}

	mod encryption_ordering {
		use super::*;

		#[test]
		fn only_required_reaches_the_upgrade_threshold() {
			assert!(Encryption::Required >= Encryption::Required);
			assert!(Encryption::Never < Encryption::Required);
			assert!(Encryption::IfRequested < Encryption::Required);
		}
	}

	mod ip_words {
		use super::*;

		#[test]
		fn ipv4_lands_in_the_low_word() {
			let words = IpWords::from(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
			assert_eq!(words, IpWords([0, 0, 0, 0x7f00_0001]));
		}

		#[test]
		fn ipv6_fills_all_four_words() {
			let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
			let words = IpWords::from(IpAddr::V6(addr));
			assert_eq!(words, IpWords([0x2001_0db8, 0, 0, 1]));
		}

		#[test]
		fn network_membership_is_word_wise() {
			let client = IpWords::from(IpAddr::V4(Ipv4Addr::new(192, 168, 3, 7)));
			let network = IpWords([0, 0, 0, 0xc0a8_0000]);
			let mask = IpWords([u32::MAX, u32::MAX, u32::MAX, 0xffff_0000]);
			assert!(client.in_network(network, mask));
			assert!(!client.in_network(network, IpWords::HOST_MASK));
		}
	}

	#[test]
	fn decision_status_codes() {
		assert_eq!(Decision::Allow.http_status(), 200);
		assert_eq!(Decision::Unauthorized.http_status(), 401);
		assert_eq!(Decision::Forbidden.http_status(), 403);
		assert_eq!(Decision::UpgradeRequired.http_status(), 426);
	}
}
