// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The MD5 password file.
//!
//! `passwd.md5` lives in the server root and holds one record per line,
//! `user:group:md5hex`, where the third field is the lowercase hex MD5
//! HA1 used by Digest and BasicDigest verification. The file is re-read
//! on every lookup; there is no cache to invalidate when an
//! administrator edits it.
//!
//! Malformed lines are logged and skipped. A file that cannot be opened
//! is logged at error level and treated as holding no entries, so
//! verification fails closed.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// File name of the MD5 password store inside the server root.
pub const MD5_PASSWD_FILE: &str = "passwd.md5";

/// Maximum length of each colon-separated field.
const MAX_FIELD_LEN: usize = 32;

/// Handle on the server's MD5 password file.
#[derive(Debug, Clone)]
pub struct Md5PasswdFile {
	path: PathBuf,
}

impl Md5PasswdFile {
	/// Point at the `passwd.md5` inside `server_root`.
	pub fn new(server_root: impl AsRef<Path>) -> Self {
		Self {
			path: server_root.as_ref().join(MD5_PASSWD_FILE),
		}
	}

	/// The underlying file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Find the stored MD5 hash for `username`, optionally constrained to
	/// one group. The first matching line wins.
	pub fn lookup(&self, username: &str, group: Option<&str>) -> Option<String> {
		let file = match File::open(&self.path) {
			Ok(file) => file,
			Err(err) => {
				tracing::error!(
					path = %self.path.display(),
					%err,
					"unable to open MD5 password file"
				);
				return None;
			}
		};

		for line in BufReader::new(file).lines() {
			let line = match line {
				Ok(line) => line,
				Err(err) => {
					tracing::error!(
						path = %self.path.display(),
						%err,
						"unable to read MD5 password file"
					);
					return None;
				}
			};

			let Some((user, file_group, passwd)) = parse_line(&line) else {
				tracing::error!(%line, "bad MD5 password line");
				continue;
			};

			if user == username && group.map_or(true, |g| g == file_group) {
				tracing::debug!(username, group = file_group, "found MD5 password entry");
				return Some(passwd.to_string());
			}
		}

		None
	}
}

/// Split a `user:group:md5hex` line. Fields must be non-empty and at most
/// 32 bytes.
fn parse_line(line: &str) -> Option<(&str, &str, &str)> {
	let mut fields = line.splitn(3, ':');
	let user = fields.next()?;
	let group = fields.next()?;
	let passwd = fields.next()?;

	for field in [user, group, passwd] {
		if field.is_empty() || field.len() > MAX_FIELD_LEN {
			return None;
		}
	}

	if passwd.chars().any(char::is_whitespace) {
		return None;
	}

	Some((user, group, passwd))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn store(contents: &str) -> (tempfile::TempDir, Md5PasswdFile) {
		let dir = tempfile::tempdir().unwrap();
		let mut file = File::create(dir.path().join(MD5_PASSWD_FILE)).unwrap();
		write!(file, "{contents}").unwrap();
		let passwd = Md5PasswdFile::new(dir.path());
		(dir, passwd)
	}

	const HASH_A: &str = "0123456789abcdef0123456789abcdef";
	const HASH_B: &str = "fedcba9876543210fedcba9876543210";

	#[test]
	fn finds_a_user_regardless_of_group() {
		let (_dir, passwd) = store(&format!("bob:lp:{HASH_A}\n"));
		assert_eq!(passwd.lookup("bob", None).as_deref(), Some(HASH_A));
	}

	#[test]
	fn group_constraint_must_match_exactly() {
		let (_dir, passwd) = store(&format!("bob:lp:{HASH_A}\nbob:admin:{HASH_B}\n"));
		assert_eq!(passwd.lookup("bob", Some("admin")).as_deref(), Some(HASH_B));
		assert_eq!(passwd.lookup("bob", Some("lp")).as_deref(), Some(HASH_A));
		assert!(passwd.lookup("bob", Some("staff")).is_none());
	}

	#[test]
	fn first_matching_line_wins() {
		let (_dir, passwd) = store(&format!("bob:lp:{HASH_A}\nbob:lp:{HASH_B}\n"));
		assert_eq!(passwd.lookup("bob", Some("lp")).as_deref(), Some(HASH_A));
	}

	#[test]
	fn usernames_match_case_sensitively() {
		let (_dir, passwd) = store(&format!("bob:lp:{HASH_A}\n"));
		assert!(passwd.lookup("Bob", None).is_none());
	}

	#[test]
	fn malformed_lines_are_skipped() {
		let (_dir, passwd) = store(&format!(
			"not-a-record\n:lp:{HASH_A}\nbob:lp\ntoolong{}:lp:{HASH_A}\nbob:lp:{HASH_A}\n",
			"x".repeat(MAX_FIELD_LEN)
		));
		assert_eq!(passwd.lookup("bob", Some("lp")).as_deref(), Some(HASH_A));
	}

	#[test]
	fn missing_file_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let passwd = Md5PasswdFile::new(dir.path());
		assert!(passwd.lookup("bob", None).is_none());
	}
}
