// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The authorization orchestrator.
//!
//! [`Authorizer::is_authorized`] composes the pieces in a fixed order:
//!
//! 1. No matched location: permit local requests, forbid the rest
//! 2. Host/IP verdict from the location's allow/deny masks under its
//!    [`Order`](crate::Order) (localhost is always allowed)
//! 3. `Forbidden` when the host verdict is Deny under satisfy-all
//! 4. `UpgradeRequired` when encryption is required but absent
//! 5. Anonymous and unauthenticated-IPP shortcuts
//! 6. Missing credentials: challenge, unless host access suffices under
//!    satisfy-any
//! 7. Credential verification by scheme (Basic, Digest, BasicDigest)
//! 8. Principal checks: root bypass, `@OWNER`, `@SYSTEM`, `@group`,
//!    bare usernames, and group-membership for Basic group policies
//!
//! Every error on the credential path collapses into `Unauthorized`; the
//! engine never hands an error type to the HTTP layer.

use std::sync::Arc;

use tracing::instrument;

use crate::authenticate::{CryptAuthenticator, PasswordAuthenticator};
use crate::config::AuthConfig;
use crate::digest::{auth_sub_field, digests_match, md5_final, md5_ha1, DIGEST_REALM};
use crate::identity::{check_group, PasswdEntry, UserDatabase};
use crate::location::{Location, LocationId, LocationTable};
use crate::mask::{check_masks, InterfaceProvider};
use crate::passwd::Md5PasswdFile;
use crate::types::{
	AuthLevel, AuthType, Decision, Encryption, HttpState, IpWords, LimitMask, Order,
	RequestContext, Satisfy,
};

/// Host-level verdict from mask evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostVerdict {
	Allow,
	Deny,
}

/// The authorization engine.
///
/// Owns the sealed configuration and location table plus the collaborator
/// seams. One request is evaluated at a time; the engine keeps no
/// per-request state and takes no locks.
pub struct Authorizer {
	config: AuthConfig,
	locations: LocationTable,
	users: Arc<dyn UserDatabase>,
	interfaces: Arc<dyn InterfaceProvider>,
	password_auth: Arc<dyn PasswordAuthenticator>,
	md5_passwd: Md5PasswdFile,
}

impl Authorizer {
	/// Build an engine around an explicit credential backend.
	pub fn new(
		config: AuthConfig,
		locations: LocationTable,
		users: Arc<dyn UserDatabase>,
		interfaces: Arc<dyn InterfaceProvider>,
		password_auth: Arc<dyn PasswordAuthenticator>,
	) -> Self {
		let md5_passwd = Md5PasswdFile::new(&config.server_root);
		Self {
			config,
			locations,
			users,
			interfaces,
			password_auth,
			md5_passwd,
		}
	}

	/// Build an engine that verifies Basic credentials with the
	/// crypt-against-passwd/shadow fallback.
	pub fn with_crypt_fallback(
		config: AuthConfig,
		locations: LocationTable,
		users: Arc<dyn UserDatabase>,
		interfaces: Arc<dyn InterfaceProvider>,
	) -> Self {
		let password_auth = Arc::new(CryptAuthenticator::new(Arc::clone(&users)));
		Self::new(config, locations, users, interfaces, password_auth)
	}

	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	pub fn locations(&self) -> &LocationTable {
		&self.locations
	}

	/// Find the best-matching location for a request path and state.
	pub fn find_best(&self, uri: &str, state: HttpState) -> Option<LocationId> {
		self.locations.find_best(uri, state)
	}

	/// Decide whether the request is authorized.
	///
	/// `owner` is the owner of the addressed resource, for `@OWNER`
	/// principal checks.
	#[instrument(
		level = "debug",
		skip(self, req, owner),
		fields(uri = %req.uri, hostname = %req.hostname, username = %req.username)
	)]
	pub fn is_authorized(&self, req: &RequestContext, owner: Option<&str>) -> Decision {
		// With no policy for the request, access is allowed from the
		// local system and denied from everything else.
		let Some(best_id) = req.best else {
			return if req.hostname == "localhost" || req.hostname == self.config.server_name {
				Decision::Allow
			} else {
				Decision::Forbidden
			};
		};

		let Some(best) = self.locations.get(best_id) else {
			tracing::error!(%best_id, "request references an unknown location");
			return Decision::Forbidden;
		};

		tracing::debug!(
			location = best.path(),
			level = %best.level,
			auth_type = %best.auth_type,
			satisfy = ?best.satisfy,
			names = best.names.len(),
			"checking authorization"
		);

		if best.limit.contains(LimitMask::IPP) {
			tracing::debug!(op = ?best.op, "policy is IPP-limited");
		}

		let address = IpWords::from(req.address);
		let auth = self.host_verdict(best, &address, &req.hostname);

		tracing::debug!(verdict = ?auth, "host/address check");

		if auth == HostVerdict::Deny && best.satisfy == Satisfy::All {
			return Decision::Forbidden;
		}

		if best.encryption >= Encryption::Required && !req.encrypted {
			tracing::debug!("connection needs a transport security upgrade");
			return Decision::UpgradeRequired;
		}

		// Anonymous access, or a policy with nothing to enforce.
		if best.level == AuthLevel::Anonymous
			|| (best.auth_type == AuthType::None && best.names.is_empty())
		{
			return Decision::Allow;
		}

		// IPP operations may carry an unauthenticated username.
		if best.auth_type == AuthType::None && best.limit.contains(LimitMask::IPP) {
			if let Some(name) = &req.ipp_request_user {
				tracing::debug!(requesting_user = %name, "accepting IPP requesting-user-name");
				return Decision::Allow;
			}
		}

		if req.username.is_empty() {
			return if best.satisfy == Satisfy::All || auth == HostVerdict::Deny {
				Decision::Unauthorized
			} else {
				Decision::Allow
			};
		}

		let mut pw: Option<PasswdEntry> = None;

		let local_certificate = req.hostname.eq_ignore_ascii_case("localhost")
			&& req.authorization.starts_with("Local");

		if local_certificate {
			// The HTTP layer already validated the per-connection
			// certificate; resolve the account for the group checks below.
			pw = self.users.passwd(&req.username);
		} else {
			if req.password.is_empty() {
				return Decision::Unauthorized;
			}

			let auth_type = if best.auth_type != AuthType::None {
				best.auth_type
			} else {
				self.config.default_auth_type
			};

			match auth_type {
				AuthType::None => {}

				AuthType::Basic => {
					pw = self.users.passwd(&req.username);

					if let Err(err) = self.password_auth.authenticate(&req.username, &req.password)
					{
						tracing::warn!(
							username = %req.username,
							%err,
							"basic authentication failed"
						);
						return Decision::Unauthorized;
					}
				}

				AuthType::Digest => {
					let Some(nonce) = auth_sub_field(&req.authorization, "nonce") else {
						tracing::error!("no nonce value for Digest authentication");
						return Decision::Unauthorized;
					};

					// The nonce is bound to the client's hostname.
					if nonce != req.hostname {
						tracing::error!(
							expected = %req.hostname,
							got = %nonce,
							"digest nonce does not match the client"
						);
						return Decision::Unauthorized;
					}

					let Some(ha1) = self.find_md5_entry(best, &req.username) else {
						tracing::debug!(
							username = %req.username,
							"no matching user:group in the MD5 password file"
						);
						return Decision::Unauthorized;
					};

					let expected =
						md5_final(&nonce, req.state.method_name(), &req.uri, &ha1);

					if !digests_match(&expected, &req.password) {
						tracing::debug!(username = %req.username, "digest response mismatch");
						return Decision::Unauthorized;
					}
				}

				AuthType::BasicDigest => {
					let Some(ha1) = self.find_md5_entry(best, &req.username) else {
						tracing::debug!(
							username = %req.username,
							"no matching user:group in the MD5 password file"
						);
						return Decision::Unauthorized;
					};

					let basic = md5_ha1(&req.username, DIGEST_REALM, &req.password);
					if !digests_match(&ha1, &basic) {
						tracing::debug!(username = %req.username, "password hash mismatch");
						return Decision::Unauthorized;
					}
				}
			}
		}

		// Credentials are good. Root always passes the principal checks.
		if req.username == "root" {
			return Decision::Allow;
		}

		if best.level == AuthLevel::User {
			return self.user_allowed(best, &req.username, pw.as_ref(), owner);
		}

		// Group-level access with Basic credentials still needs a system
		// group membership; the digest schemes already proved it against
		// the MD5 password file.
		if best.auth_type == AuthType::Basic {
			return self.group_allowed(best, &req.username, pw.as_ref());
		}

		Decision::Allow
	}

	fn host_verdict(&self, best: &Location, address: &IpWords, hostname: &str) -> HostVerdict {
		// Access from the local host is always allowed.
		if hostname.eq_ignore_ascii_case("localhost") {
			return HostVerdict::Allow;
		}

		let interfaces = &*self.interfaces;
		let denied = || check_masks(address, hostname, &best.deny, interfaces);
		let allowed = || check_masks(address, hostname, &best.allow, interfaces);

		match best.order {
			Order::DenyAllow => {
				let mut auth = HostVerdict::Allow;
				if denied() {
					auth = HostVerdict::Deny;
				}
				if allowed() {
					auth = HostVerdict::Allow;
				}
				auth
			}
			Order::AllowDeny => {
				let mut auth = HostVerdict::Deny;
				if allowed() {
					auth = HostVerdict::Allow;
				}
				if denied() {
					auth = HostVerdict::Deny;
				}
				auth
			}
		}
	}

	/// Locate the stored HA1 for a digest-scheme user under the policy's
	/// groups.
	fn find_md5_entry(&self, best: &Location, username: &str) -> Option<String> {
		if !best.names.is_empty() && best.level == AuthLevel::Group {
			for name in &best.names {
				if name.eq_ignore_ascii_case("@SYSTEM") {
					for group in &self.config.system_groups {
						if let Some(hash) = self.md5_passwd.lookup(username, Some(group)) {
							return Some(hash);
						}
					}
				} else if let Some(hash) = self.md5_passwd.lookup(username, Some(name)) {
					return Some(hash);
				}
			}
			None
		} else {
			self.md5_passwd.lookup(username, None)
		}
	}

	fn user_allowed(
		&self,
		best: &Location,
		username: &str,
		pw: Option<&PasswdEntry>,
		owner: Option<&str>,
	) -> Decision {
		tracing::debug!("checking user membership");

		// No names: any authenticated user qualifies.
		if best.names.is_empty() {
			return Decision::Allow;
		}

		for name in &best.names {
			if name.eq_ignore_ascii_case("@OWNER") {
				if let Some(owner) = owner {
					if username.eq_ignore_ascii_case(owner) {
						return Decision::Allow;
					}
				}
			} else if name.eq_ignore_ascii_case("@SYSTEM") {
				for group in &self.config.system_groups {
					if check_group(&*self.users, &self.md5_passwd, username, pw, group) {
						return Decision::Allow;
					}
				}
			} else if let Some(group) = name.strip_prefix('@') {
				if check_group(&*self.users, &self.md5_passwd, username, pw, group) {
					return Decision::Allow;
				}
			} else if username.eq_ignore_ascii_case(name) {
				return Decision::Allow;
			}
		}

		Decision::Unauthorized
	}

	fn group_allowed(
		&self,
		best: &Location,
		username: &str,
		pw: Option<&PasswdEntry>,
	) -> Decision {
		tracing::debug!("checking group membership");

		for name in &best.names {
			if name.eq_ignore_ascii_case("@SYSTEM") {
				for group in &self.config.system_groups {
					if check_group(&*self.users, &self.md5_passwd, username, pw, group) {
						return Decision::Allow;
					}
				}
			} else if check_group(&*self.users, &self.md5_passwd, username, pw, name) {
				return Decision::Allow;
			}
		}

		tracing::debug!(username, "user is not in any required group");
		Decision::Unauthorized
	}
}
