// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity resolution against the platform user database.
//!
//! The engine consumes the platform's passwd/group/shadow stores through
//! the [`UserDatabase`] trait and receives owned snapshots, so the
//! non-reentrant platform calls stay encapsulated here.
//!
//! [`check_group`] implements the membership rule: the named group's
//! member list, then the user's primary gid, then the MD5 password file
//! as a fallback, which lets that file define synthetic groups the
//! system does not know about.

use crate::passwd::Md5PasswdFile;

/// Snapshot of a passwd entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
	pub name: String,
	pub uid: u32,
	/// Primary group id.
	pub gid: u32,
	/// Stored password hash; often `x` when shadowed.
	pub passwd: String,
}

impl PasswdEntry {
	pub fn new(name: impl Into<String>, uid: u32, gid: u32) -> Self {
		Self {
			name: name.into(),
			uid,
			gid,
			passwd: String::new(),
		}
	}

	/// Builder: set the stored password hash.
	pub fn with_passwd(mut self, passwd: impl Into<String>) -> Self {
		self.passwd = passwd.into();
		self
	}
}

/// Snapshot of a group entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
	pub name: String,
	pub gid: u32,
	pub members: Vec<String>,
}

impl GroupEntry {
	pub fn new(name: impl Into<String>, gid: u32) -> Self {
		Self {
			name: name.into(),
			gid,
			members: Vec::new(),
		}
	}

	/// Builder: set the member list.
	pub fn with_members<I, S>(mut self, members: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.members = members.into_iter().map(Into::into).collect();
		self
	}
}

/// Snapshot of a shadow entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowEntry {
	pub name: String,
	pub passwd: String,
}

impl ShadowEntry {
	pub fn new(name: impl Into<String>, passwd: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			passwd: passwd.into(),
		}
	}
}

/// The platform user database, by capability.
///
/// Lookups return owned snapshots; implementations release any platform
/// handles before returning.
pub trait UserDatabase: Send + Sync {
	fn passwd(&self, name: &str) -> Option<PasswdEntry>;
	fn group(&self, name: &str) -> Option<GroupEntry>;
	fn shadow(&self, name: &str) -> Option<ShadowEntry>;
}

// =============================================================================
// System implementation
// =============================================================================

/// The real platform user database, over `getpwnam`/`getgrnam`/`getspnam`.
///
/// Each lookup is paired with the matching `end*` call; the platform calls
/// are not reentrant, which is fine for the engine's one-request-at-a-time
/// dispatch.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUserDatabase;

#[cfg(unix)]
impl UserDatabase for SystemUserDatabase {
	fn passwd(&self, name: &str) -> Option<PasswdEntry> {
		let cname = std::ffi::CString::new(name).ok()?;
		unsafe {
			let pw = libc::getpwnam(cname.as_ptr());
			let entry = if pw.is_null() {
				None
			} else {
				Some(PasswdEntry {
					name: owned_cstr((*pw).pw_name),
					uid: (*pw).pw_uid,
					gid: (*pw).pw_gid,
					passwd: owned_cstr((*pw).pw_passwd),
				})
			};
			libc::endpwent();
			entry
		}
	}

	fn group(&self, name: &str) -> Option<GroupEntry> {
		let cname = std::ffi::CString::new(name).ok()?;
		unsafe {
			let gr = libc::getgrnam(cname.as_ptr());
			let entry = if gr.is_null() {
				None
			} else {
				let mut members = Vec::new();
				let mut member = (*gr).gr_mem;
				while !member.is_null() && !(*member).is_null() {
					members.push(owned_cstr(*member));
					member = member.add(1);
				}
				Some(GroupEntry {
					name: owned_cstr((*gr).gr_name),
					gid: (*gr).gr_gid,
					members,
				})
			};
			libc::endgrent();
			entry
		}
	}

	#[cfg(target_os = "linux")]
	fn shadow(&self, name: &str) -> Option<ShadowEntry> {
		let cname = std::ffi::CString::new(name).ok()?;
		unsafe {
			let spw = libc::getspnam(cname.as_ptr());
			let entry = if spw.is_null() {
				None
			} else {
				Some(ShadowEntry {
					name: owned_cstr((*spw).sp_namp),
					passwd: owned_cstr((*spw).sp_pwdp),
				})
			};
			libc::endspent();
			entry
		}
	}

	#[cfg(not(target_os = "linux"))]
	fn shadow(&self, _name: &str) -> Option<ShadowEntry> {
		None
	}
}

#[cfg(unix)]
unsafe fn owned_cstr(ptr: *const std::os::raw::c_char) -> String {
	if ptr.is_null() {
		String::new()
	} else {
		std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
	}
}

// =============================================================================
// Static implementation
// =============================================================================

/// An in-memory user database.
///
/// Serves deployments that manage their principals entirely in
/// configuration, and the test suite.
#[derive(Debug, Clone, Default)]
pub struct StaticUserDatabase {
	users: Vec<PasswdEntry>,
	groups: Vec<GroupEntry>,
	shadows: Vec<ShadowEntry>,
}

impl StaticUserDatabase {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: add a passwd entry.
	pub fn with_user(mut self, user: PasswdEntry) -> Self {
		self.users.push(user);
		self
	}

	/// Builder: add a group entry.
	pub fn with_group(mut self, group: GroupEntry) -> Self {
		self.groups.push(group);
		self
	}

	/// Builder: add a shadow entry.
	pub fn with_shadow(mut self, shadow: ShadowEntry) -> Self {
		self.shadows.push(shadow);
		self
	}
}

impl UserDatabase for StaticUserDatabase {
	fn passwd(&self, name: &str) -> Option<PasswdEntry> {
		self.users.iter().find(|u| u.name == name).cloned()
	}

	fn group(&self, name: &str) -> Option<GroupEntry> {
		self.groups.iter().find(|g| g.name == name).cloned()
	}

	fn shadow(&self, name: &str) -> Option<ShadowEntry> {
		self.shadows.iter().find(|s| s.name == name).cloned()
	}
}

// =============================================================================
// Group membership
// =============================================================================

/// Check whether `username` belongs to `groupname`.
///
/// Order: the named group's member list (case-insensitive), then the
/// user's primary gid against the group's gid, then an MD5 password file
/// entry for `username:groupname`. The file fallback lets `passwd.md5`
/// define groups the system database does not carry.
pub fn check_group(
	db: &dyn UserDatabase,
	md5_passwd: &Md5PasswdFile,
	username: &str,
	user: Option<&PasswdEntry>,
	groupname: &str,
) -> bool {
	tracing::debug!(username, groupname, "checking group membership");

	let group = db.group(groupname);

	if let Some(group) = &group {
		if group
			.members
			.iter()
			.any(|member| member.eq_ignore_ascii_case(username))
		{
			return true;
		}

		if let Some(user) = user {
			if user.gid == group.gid {
				return true;
			}
		}
	}

	md5_passwd.lookup(username, Some(groupname)).is_some()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn lab_db() -> StaticUserDatabase {
		StaticUserDatabase::new()
			.with_user(PasswdEntry::new("alice", 1000, 100))
			.with_user(PasswdEntry::new("bob", 1001, 200))
			.with_group(GroupEntry::new("lp", 7).with_members(["alice"]))
			.with_group(GroupEntry::new("staff", 100))
	}

	fn empty_md5(dir: &std::path::Path) -> Md5PasswdFile {
		Md5PasswdFile::new(dir)
	}

	#[test]
	fn member_list_matches_case_insensitively() {
		let dir = tempfile::tempdir().unwrap();
		let db = lab_db();
		assert!(check_group(&db, &empty_md5(dir.path()), "ALICE", None, "lp"));
		assert!(!check_group(&db, &empty_md5(dir.path()), "bob", None, "lp"));
	}

	#[test]
	fn primary_gid_counts_as_membership() {
		let dir = tempfile::tempdir().unwrap();
		let db = lab_db();
		let alice = db.passwd("alice").unwrap();
		assert!(check_group(
			&db,
			&empty_md5(dir.path()),
			"alice",
			Some(&alice),
			"staff"
		));

		let bob = db.passwd("bob").unwrap();
		assert!(!check_group(
			&db,
			&empty_md5(dir.path()),
			"bob",
			Some(&bob),
			"staff"
		));
	}

	#[test]
	fn md5_file_defines_synthetic_groups() {
		let dir = tempfile::tempdir().unwrap();
		let mut file = std::fs::File::create(dir.path().join("passwd.md5")).unwrap();
		writeln!(file, "carol:operators:0123456789abcdef0123456789abcdef").unwrap();

		let db = lab_db();
		let md5 = Md5PasswdFile::new(dir.path());
		assert!(check_group(&db, &md5, "carol", None, "operators"));
		assert!(!check_group(&db, &md5, "carol", None, "lp"));
	}

	#[test]
	fn unknown_group_without_md5_entry_is_not_a_member() {
		let dir = tempfile::tempdir().unwrap();
		let db = lab_db();
		assert!(!check_group(
			&db,
			&empty_md5(dir.path()),
			"alice",
			None,
			"wheel"
		));
	}
}
