// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Engine configuration.
//!
//! [`AuthConfig`] carries the process-wide, configuration-time-immutable
//! values the engine needs: the server's own name, the server root (where
//! `passwd.md5` lives), the list of system groups `@SYSTEM` expands to,
//! and the default credential scheme for locations that do not pin one.
//!
//! The value is injected into [`Authorizer`](crate::Authorizer) at
//! construction and never mutated afterwards; configuration reloads build
//! a fresh engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::AuthType;

/// Environment variable overriding the server name.
pub const SERVER_NAME_ENV_VAR: &str = "PLATEN_SERVER_NAME";

/// Environment variable overriding the server root directory.
pub const SERVER_ROOT_ENV_VAR: &str = "PLATEN_SERVER_ROOT";

/// Environment variable overriding the system group list (comma-separated).
pub const SYSTEM_GROUPS_ENV_VAR: &str = "PLATEN_SYSTEM_GROUPS";

/// Default system groups `@SYSTEM` expands to.
pub const DEFAULT_SYSTEM_GROUPS: &[&str] = &["sys", "system", "root"];

/// Configuration for the authorization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
	/// The server's own canonical hostname. Requests from this name are
	/// treated as local when no policy matches.
	pub server_name: String,
	/// Server state directory; the MD5 password file lives here.
	pub server_root: PathBuf,
	/// Administrative groups the `@SYSTEM` placeholder expands to, in
	/// evaluation order.
	pub system_groups: Vec<String>,
	/// Credential scheme applied when a location's type is
	/// [`AuthType::None`] but credentials are required anyway.
	pub default_auth_type: AuthType,
}

impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			server_name: "localhost".to_string(),
			server_root: PathBuf::from("/etc/platen"),
			system_groups: DEFAULT_SYSTEM_GROUPS.iter().map(|g| g.to_string()).collect(),
			default_auth_type: AuthType::Basic,
		}
	}
}

impl AuthConfig {
	/// Create a configuration with default settings.
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a configuration from `PLATEN_*` environment variables,
	/// falling back to the defaults for anything unset.
	pub fn from_env() -> Self {
		let mut config = Self::default();

		if let Ok(name) = std::env::var(SERVER_NAME_ENV_VAR) {
			if !name.is_empty() {
				config.server_name = name;
			}
		}

		if let Ok(root) = std::env::var(SERVER_ROOT_ENV_VAR) {
			if !root.is_empty() {
				config.server_root = PathBuf::from(root);
			}
		}

		if let Ok(groups) = std::env::var(SYSTEM_GROUPS_ENV_VAR) {
			let groups: Vec<String> = groups
				.split(',')
				.map(str::trim)
				.filter(|g| !g.is_empty())
				.map(str::to_string)
				.collect();
			if !groups.is_empty() {
				config.system_groups = groups;
			}
		}

		config
	}

	/// Builder: set the server name.
	pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
		self.server_name = name.into();
		self
	}

	/// Builder: set the server root directory.
	pub fn with_server_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.server_root = root.into();
		self
	}

	/// Builder: replace the system group list.
	pub fn with_system_groups<I, S>(mut self, groups: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.system_groups = groups.into_iter().map(Into::into).collect();
		self
	}

	/// Builder: set the default credential scheme.
	pub fn with_default_auth_type(mut self, auth_type: AuthType) -> Self {
		self.default_auth_type = auth_type;
		self
	}
}
