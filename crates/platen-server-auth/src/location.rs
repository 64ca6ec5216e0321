// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Location policy records and the owning table.
//!
//! A [`Location`] binds a URL path prefix to a policy: which methods it
//! limits, how host masks compose, what credential scheme and principals
//! it requires. The [`LocationTable`] owns every record; callers address
//! records through [`LocationId`] index handles, which stay valid across
//! [`add`](LocationTable::add) and [`copy`](LocationTable::copy) and are
//! invalidated only by [`remove_all`](LocationTable::remove_all).
//!
//! Matching under `/printers/` and `/classes/` is case-insensitive
//! (printer queue names are), case-sensitive everywhere else.

use std::fmt;

use crate::mask::AuthMask;
use crate::types::{AuthLevel, AuthType, Encryption, HttpState, LimitMask, Order, Satisfy};

/// Path prefixes whose location matching ignores case.
const QUEUE_PREFIXES: [&str; 2] = ["/printers/", "/classes/"];

/// Stable handle to a [`Location`] inside a [`LocationTable`].
///
/// Valid until the table is cleared; never hold one across
/// [`LocationTable::remove_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationId(usize);

impl fmt::Display for LocationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// One authorization policy record, keyed by a URL path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
	path: String,
	/// Methods this policy applies to. New locations start with an empty
	/// mask and match nothing until the loader sets one.
	pub limit: LimitMask,
	/// IPP operation code, recorded for logging when `limit` carries the
	/// IPP bit.
	pub op: Option<u16>,
	pub order: Order,
	pub level: AuthLevel,
	pub auth_type: AuthType,
	pub satisfy: Satisfy,
	pub encryption: Encryption,
	/// Principals: `@OWNER`, `@SYSTEM`, `@group`, or a bare username.
	pub names: Vec<String>,
	pub allow: Vec<AuthMask>,
	pub deny: Vec<AuthMask>,
}

impl Location {
	/// Creates a record for `path` with everything else zeroed: empty
	/// limit mask, `Order::DenyAllow`, anonymous level, no credential
	/// scheme, satisfy-all, no encryption requirement, empty lists.
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			limit: LimitMask::empty(),
			op: None,
			order: Order::default(),
			level: AuthLevel::default(),
			auth_type: AuthType::default(),
			satisfy: Satisfy::default(),
			encryption: Encryption::default(),
			names: Vec::new(),
			allow: Vec::new(),
			deny: Vec::new(),
		}
	}

	/// The path prefix this policy is keyed by.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Builder: set the method limit mask.
	pub fn with_limit(mut self, limit: LimitMask) -> Self {
		self.limit = limit;
		self
	}

	/// Builder: set the IPP operation code.
	pub fn with_op(mut self, op: u16) -> Self {
		self.op = Some(op);
		self
	}

	/// Builder: set the allow/deny composition order.
	pub fn with_order(mut self, order: Order) -> Self {
		self.order = order;
		self
	}

	/// Builder: set the required access level.
	pub fn with_level(mut self, level: AuthLevel) -> Self {
		self.level = level;
		self
	}

	/// Builder: set the credential scheme.
	pub fn with_auth_type(mut self, auth_type: AuthType) -> Self {
		self.auth_type = auth_type;
		self
	}

	/// Builder: set the satisfy rule.
	pub fn with_satisfy(mut self, satisfy: Satisfy) -> Self {
		self.satisfy = satisfy;
		self
	}

	/// Builder: set the encryption requirement.
	pub fn with_encryption(mut self, encryption: Encryption) -> Self {
		self.encryption = encryption;
		self
	}

	/// Append a principal name.
	pub fn add_name(&mut self, name: impl Into<String>) {
		self.names.push(name.into());
	}

	/// Append an allow mask.
	pub fn add_allow(&mut self, mask: AuthMask) {
		self.allow.push(mask);
	}

	/// Append a deny mask.
	pub fn add_deny(&mut self, mask: AuthMask) {
		self.deny.push(mask);
	}
}

/// The ordered, owning collection of location policies.
///
/// Sealed after configuration load; reloads must be serialized with
/// request dispatch by the caller.
#[derive(Debug, Clone, Default)]
pub struct LocationTable {
	locations: Vec<Location>,
}

impl LocationTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a location and returns its handle. Duplicate paths are
	/// permitted; selection is purely by prefix length with earlier
	/// insertions winning ties.
	pub fn add(&mut self, location: Location) -> LocationId {
		tracing::debug!(path = %location.path, "added location");
		self.locations.push(location);
		LocationId(self.locations.len() - 1)
	}

	/// Look up a location by its exact path, ignoring case.
	pub fn find(&self, path: &str) -> Option<LocationId> {
		self.locations
			.iter()
			.position(|loc| loc.path.eq_ignore_ascii_case(path))
			.map(LocationId)
	}

	/// Find the location that best matches a request: the longest path
	/// prefix of `uri` whose limit mask covers the request state.
	///
	/// A trailing `.ppd` is stripped before matching when the path names
	/// a printer or class, so a driver-file request falls under its
	/// queue's policy. Locations whose path does not begin with `/` are
	/// never selected.
	pub fn find_best(&self, uri: &str, state: HttpState) -> Option<LocationId> {
		let mut uri = uri;
		if is_queue_scoped(uri) {
			uri = uri.strip_suffix(".ppd").unwrap_or(uri);
		}
		let queue_scoped = is_queue_scoped(uri);
		let limit = state.limit();

		let mut best = None;
		let mut best_len = 0;

		for (index, loc) in self.locations.iter().enumerate() {
			if !loc.path.starts_with('/')
				|| loc.path.len() <= best_len
				|| (loc.limit & limit).is_empty()
			{
				continue;
			}

			let matched = if queue_scoped {
				prefix_matches_ignore_case(uri, &loc.path)
			} else {
				uri.starts_with(loc.path.as_str())
			};

			if matched {
				best = Some(LocationId(index));
				best_len = loc.path.len();
			}
		}

		tracing::debug!(
			uri,
			best = best.map(|id| self.locations[id.0].path.as_str()).unwrap_or("NONE"),
			"location match"
		);

		best
	}

	/// Deep-copies a location and appends the copy, returning its handle.
	pub fn copy(&mut self, id: LocationId) -> Option<LocationId> {
		let copy = self.locations.get(id.0)?.clone();
		Some(self.add(copy))
	}

	pub fn get(&self, id: LocationId) -> Option<&Location> {
		self.locations.get(id.0)
	}

	pub fn get_mut(&mut self, id: LocationId) -> Option<&mut Location> {
		self.locations.get_mut(id.0)
	}

	pub fn len(&self) -> usize {
		self.locations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.locations.is_empty()
	}

	/// Iterate locations in insertion order with their handles.
	pub fn iter(&self) -> impl Iterator<Item = (LocationId, &Location)> {
		self.locations
			.iter()
			.enumerate()
			.map(|(index, loc)| (LocationId(index), loc))
	}

	/// Destroys every location. All previously issued handles become
	/// invalid.
	pub fn remove_all(&mut self) {
		self.locations.clear();
	}
}

fn is_queue_scoped(uri: &str) -> bool {
	QUEUE_PREFIXES.iter().any(|prefix| uri.starts_with(prefix))
}

fn prefix_matches_ignore_case(uri: &str, prefix: &str) -> bool {
	uri.len() >= prefix.len()
		&& uri.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn table(paths: &[&str]) -> LocationTable {
		let mut table = LocationTable::new();
		for path in paths {
			table.add(Location::new(*path).with_limit(LimitMask::ALL));
		}
		table
	}

	fn best_path<'a>(table: &'a LocationTable, uri: &str, state: HttpState) -> Option<&'a str> {
		table
			.find_best(uri, state)
			.and_then(|id| table.get(id))
			.map(Location::path)
	}

	mod find_best {
		use super::*;

		#[test]
		fn longest_prefix_wins() {
			let table = table(&["/", "/admin", "/admin/conf"]);
			assert_eq!(
				best_path(&table, "/admin/conf/platen.conf", HttpState::Get),
				Some("/admin/conf")
			);
			assert_eq!(best_path(&table, "/admin/log", HttpState::Get), Some("/admin"));
			assert_eq!(best_path(&table, "/jobs", HttpState::Get), Some("/"));
		}

		#[test]
		fn ppd_suffix_is_stripped_for_queue_paths() {
			let table = table(&["/", "/printers/", "/printers/foo"]);
			assert_eq!(
				best_path(&table, "/printers/foo.ppd", HttpState::Get),
				Some("/printers/foo")
			);
		}

		#[test]
		fn ppd_suffix_is_kept_outside_queue_paths() {
			let table = table(&["/", "/files/foo"]);
			assert_eq!(best_path(&table, "/files/foo.ppd", HttpState::Get), Some("/files/foo"));
			assert_eq!(best_path(&table, "/foo.ppd", HttpState::Get), Some("/"));
		}

		#[test]
		fn queue_paths_match_case_insensitively() {
			let table = table(&["/", "/printers/Foo"]);
			assert_eq!(
				best_path(&table, "/printers/foo", HttpState::Get),
				Some("/printers/Foo")
			);
			assert_eq!(
				best_path(&table, "/PRINTERS/FOO", HttpState::Get),
				Some("/printers/Foo")
			);
		}

		#[test]
		fn other_paths_match_case_sensitively() {
			let table = table(&["/", "/admin"]);
			assert_eq!(best_path(&table, "/Admin", HttpState::Get), Some("/"));
		}

		#[test]
		fn method_mask_filters_candidates() {
			let mut table = LocationTable::new();
			table.add(Location::new("/").with_limit(LimitMask::ALL));
			table.add(Location::new("/jobs").with_limit(LimitMask::POST));

			assert_eq!(best_path(&table, "/jobs/1", HttpState::Post), Some("/jobs"));
			assert_eq!(best_path(&table, "/jobs/1", HttpState::Get), Some("/"));
		}

		#[test]
		fn methodless_states_match_any_limit() {
			let mut table = LocationTable::new();
			table.add(Location::new("/jobs").with_limit(LimitMask::POST));
			assert_eq!(best_path(&table, "/jobs/1", HttpState::Status), Some("/jobs"));
		}

		#[test]
		fn equal_length_duplicates_first_insertion_wins() {
			let mut table = LocationTable::new();
			let first = table.add(
				Location::new("/admin")
					.with_limit(LimitMask::ALL)
					.with_level(AuthLevel::User),
			);
			table.add(Location::new("/admin").with_limit(LimitMask::ALL));

			assert_eq!(table.find_best("/admin/x", HttpState::Get), Some(first));
		}

		#[test]
		fn paths_not_starting_with_slash_are_never_selected() {
			let table = table(&["admin"]);
			assert_eq!(best_path(&table, "admin/x", HttpState::Get), None);
		}

		#[test]
		fn empty_table_has_no_match() {
			let table = LocationTable::new();
			assert_eq!(table.find_best("/", HttpState::Get), None);
		}
	}

	mod find {
		use super::*;

		#[test]
		fn exact_lookup_ignores_case() {
			let table = table(&["/admin", "/printers/"]);
			assert!(table.find("/ADMIN").is_some());
			assert!(table.find("/admin/conf").is_none());
		}
	}

	mod copy_and_remove {
		use super::*;

		#[test]
		fn copy_is_deep_and_independent() {
			let mut table = LocationTable::new();
			let original = table.add({
				let mut loc = Location::new("/printers/")
					.with_limit(LimitMask::ALL)
					.with_level(AuthLevel::User);
				loc.add_name("alice");
				loc.add_allow(AuthMask::Name(".example.com".to_string()));
				loc
			});

			let copy = table.copy(original).unwrap();
			assert_ne!(original, copy);

			table.get_mut(copy).unwrap().names.push("bob".to_string());
			table.get_mut(copy).unwrap().deny.push(AuthMask::Name("x".to_string()));

			let orig = table.get(original).unwrap();
			assert_eq!(orig.names, vec!["alice"]);
			assert!(orig.deny.is_empty());
			assert_eq!(table.get(copy).unwrap().names, vec!["alice", "bob"]);
		}

		#[test]
		fn copy_preserves_find_best_results() {
			let mut table = table(&["/", "/printers/"]);
			let id = table.find("/printers/").unwrap();
			table.copy(id).unwrap();

			// The original is still the selected match (first of equal length).
			assert_eq!(table.find_best("/printers/foo", HttpState::Get), Some(id));
		}

		#[test]
		fn copy_of_unknown_id_is_none() {
			let mut table = LocationTable::new();
			let id = table.add(Location::new("/"));
			table.remove_all();
			assert!(table.copy(id).is_none());
		}

		#[test]
		fn remove_all_restores_an_empty_table() {
			let mut table = table(&["/", "/admin"]);
			assert_eq!(table.len(), 2);
			table.remove_all();
			assert!(table.is_empty());
			assert_eq!(table.find_best("/admin", HttpState::Get), None);
		}
	}
}
