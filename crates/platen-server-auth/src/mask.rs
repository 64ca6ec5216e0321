// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host, network, and interface access masks.
//!
//! A location policy carries ordered `allow` and `deny` lists of
//! [`AuthMask`] predicates. Evaluation is strictly left-to-right with
//! first-match-wins semantics inside a list; composing the two lists is
//! the orchestrator's job (see [`Order`](crate::Order)).
//!
//! Masks are built from the configuration vocabulary:
//!
//! | Syntax | Meaning |
//! |---|---|
//! | `@LOCAL` | any local interface's network |
//! | `@IF(name)` | the named interface's network |
//! | `.domain.example` | hostname suffix match |
//! | `192.168.0.0/24`, `192.168.0.0/255.255.255.0`, `2001:db8::/32` | IP network |
//! | `host.example` | exact hostname |
//!
//! Bad mask syntax is rejected at configuration time; an unusable mask
//! never reaches request evaluation.

use std::net::IpAddr;

use crate::error::{AuthError, AuthResult};
use crate::types::IpWords;

// =============================================================================
// Network interfaces
// =============================================================================

/// Address family of a network interface binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
	V4,
	V6,
}

/// One local network interface binding, as reported by the enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
	pub name: String,
	/// Whether the interface is attached to a local (non-point-to-point)
	/// network. Only local interfaces participate in `@LOCAL` matching.
	pub is_local: bool,
	pub family: AddrFamily,
	pub address: IpWords,
	pub netmask: IpWords,
}

impl NetInterface {
	/// Convenience constructor for an IPv4 binding.
	pub fn v4(
		name: impl Into<String>,
		address: std::net::Ipv4Addr,
		netmask: std::net::Ipv4Addr,
		is_local: bool,
	) -> Self {
		Self {
			name: name.into(),
			is_local,
			family: AddrFamily::V4,
			address: IpWords::from(IpAddr::V4(address)),
			netmask: IpWords::from(IpAddr::V4(netmask)),
		}
	}

	/// Convenience constructor for an IPv6 binding.
	pub fn v6(
		name: impl Into<String>,
		address: std::net::Ipv6Addr,
		netmask: std::net::Ipv6Addr,
		is_local: bool,
	) -> Self {
		Self {
			name: name.into(),
			is_local,
			family: AddrFamily::V6,
			address: IpWords::from(IpAddr::V6(address)),
			netmask: IpWords::from(IpAddr::V6(netmask)),
		}
	}

	/// True when `address` lies in this interface's network. The
	/// interface's own netmask is applied to both sides; IPv4 bindings
	/// compare the low word only.
	pub fn contains(&self, address: &IpWords) -> bool {
		match self.family {
			AddrFamily::V4 => {
				let mask = self.netmask.0[3];
				(address.0[3] & mask) == (self.address.0[3] & mask)
			}
			AddrFamily::V6 => address.masked(self.netmask) == self.address.masked(self.netmask),
		}
	}
}

/// Source of the local network interface list.
///
/// [`interfaces`](Self::interfaces) re-enumerates on every call; the
/// `@LOCAL` mask relies on this to pick up hotplugged interfaces without
/// any cache invalidation protocol.
pub trait InterfaceProvider: Send + Sync {
	/// Enumerate the current interface bindings.
	fn interfaces(&self) -> Vec<NetInterface>;

	/// Look up a binding by interface name (case-insensitive).
	fn find(&self, name: &str) -> Option<NetInterface> {
		self.interfaces()
			.into_iter()
			.find(|iface| iface.name.eq_ignore_ascii_case(name))
	}
}

/// A fixed interface list.
///
/// The daemon wires in a platform enumerator; this implementation serves
/// deployments with a static network layout and the test suite.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaceProvider {
	interfaces: Vec<NetInterface>,
}

impl StaticInterfaceProvider {
	pub fn new(interfaces: Vec<NetInterface>) -> Self {
		Self { interfaces }
	}
}

impl InterfaceProvider for StaticInterfaceProvider {
	fn interfaces(&self) -> Vec<NetInterface> {
		self.interfaces.clone()
	}
}

// =============================================================================
// Access masks
// =============================================================================

/// One allow/deny predicate over a client's address and hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMask {
	/// IP network: matches when `(client & netmask) == address` over all
	/// four words. `address` is stored pre-masked.
	Ip { address: IpWords, netmask: IpWords },
	/// Hostname: case-insensitive exact match, or (when the string
	/// begins with `.`) case-insensitive suffix match.
	Name(String),
	/// Local interface: `*` for any local interface, otherwise an
	/// interface name. Matches when the client's address lies in the
	/// interface's network.
	Interface(String),
}

impl AuthMask {
	/// Parse a mask from the configuration vocabulary.
	pub fn parse(spec: &str) -> AuthResult<Self> {
		if spec.is_empty() {
			return Err(invalid(spec, "empty mask"));
		}

		if spec.eq_ignore_ascii_case("@LOCAL") {
			return Ok(AuthMask::Interface("*".to_string()));
		}

		if spec.len() >= 4 && spec.as_bytes()[..4].eq_ignore_ascii_case(b"@IF(") {
			let name = spec[4..].strip_suffix(')').unwrap_or(&spec[4..]);
			if name.is_empty() {
				return Err(invalid(spec, "empty interface name"));
			}
			return Ok(AuthMask::Interface(name.to_string()));
		}

		if spec.starts_with('.') {
			return Ok(AuthMask::Name(spec.to_string()));
		}

		if let Some((address, netmask)) = spec.split_once('/') {
			return Self::parse_network(spec, address, netmask);
		}

		if let Ok(address) = spec.parse::<IpAddr>() {
			return Ok(AuthMask::Ip {
				address: IpWords::from(address),
				netmask: IpWords::HOST_MASK,
			});
		}

		Ok(AuthMask::Name(spec.to_string()))
	}

	fn parse_network(spec: &str, address: &str, netmask: &str) -> AuthResult<Self> {
		let address: IpAddr = address
			.parse()
			.map_err(|_| invalid(spec, "bad network address"))?;

		let netmask = if let Ok(mask) = netmask.parse::<IpAddr>() {
			if address.is_ipv4() != mask.is_ipv4() {
				return Err(invalid(spec, "address and netmask families differ"));
			}
			IpWords::from(mask)
		} else {
			let prefix: u32 = netmask
				.parse()
				.map_err(|_| invalid(spec, "bad netmask or prefix length"))?;
			prefix_mask(&address, prefix)
				.ok_or_else(|| invalid(spec, "prefix length out of range"))?
		};

		Ok(AuthMask::Ip {
			address: IpWords::from(address).masked(netmask),
			netmask,
		})
	}

	/// Test this mask against one client.
	pub fn matches(
		&self,
		address: &IpWords,
		hostname: &str,
		interfaces: &dyn InterfaceProvider,
	) -> bool {
		match self {
			AuthMask::Ip {
				address: network,
				netmask,
			} => address.in_network(*network, *netmask),

			AuthMask::Name(name) => {
				if hostname.eq_ignore_ascii_case(name) {
					return true;
				}
				name.starts_with('.') && suffix_matches(hostname, name)
			}

			AuthMask::Interface(name) if name == "*" => interfaces
				.interfaces()
				.iter()
				.filter(|iface| iface.is_local)
				.any(|iface| iface.contains(address)),

			AuthMask::Interface(name) => interfaces
				.find(name)
				.is_some_and(|iface| iface.contains(address)),
		}
	}
}

/// Evaluate a mask list against one client: first match wins, an empty
/// or match-free list yields false.
pub fn check_masks(
	address: &IpWords,
	hostname: &str,
	masks: &[AuthMask],
	interfaces: &dyn InterfaceProvider,
) -> bool {
	masks
		.iter()
		.any(|mask| mask.matches(address, hostname, interfaces))
}

fn invalid(mask: &str, reason: &str) -> AuthError {
	tracing::error!(mask, reason, "rejecting access mask");
	AuthError::InvalidMask {
		mask: mask.to_string(),
		reason: reason.to_string(),
	}
}

fn suffix_matches(hostname: &str, suffix: &str) -> bool {
	let host = hostname.as_bytes();
	let suffix = suffix.as_bytes();
	host.len() >= suffix.len() && host[host.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

fn prefix_mask(address: &IpAddr, prefix: u32) -> Option<IpWords> {
	fn word(bits: u32) -> u32 {
		match bits {
			0 => 0,
			32.. => u32::MAX,
			_ => u32::MAX << (32 - bits),
		}
	}

	match address {
		IpAddr::V4(_) => {
			if prefix > 32 {
				return None;
			}
			Some(IpWords([u32::MAX, u32::MAX, u32::MAX, word(prefix)]))
		}
		IpAddr::V6(_) => {
			if prefix > 128 {
				return None;
			}
			Some(IpWords([
				word(prefix),
				word(prefix.saturating_sub(32)),
				word(prefix.saturating_sub(64)),
				word(prefix.saturating_sub(96)),
			]))
		}
	}
}
