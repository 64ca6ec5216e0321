// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Basic-credential verification backends.
//!
//! The orchestrator sees a single narrow seam, [`PasswordAuthenticator`]:
//! one call with a username and cleartext password. Three shapes plug
//! into it:
//!
//! - a host authentication service ([`HostAuthService`], the PAM-like
//!   start/authenticate/account-check lifecycle with a conversation
//!   callback), adapted by [`HostServiceAuthenticator`]
//! - platforms whose native interface already is a single call can
//!   implement the trait directly
//! - [`CryptAuthenticator`], the crypt-against-passwd/shadow fallback
//!   used when no host service is configured
//!
//! Every backend fails closed: any error maps to a 401 upstream.

use std::sync::Arc;

use crate::crypt::cups_crypt;
use crate::digest::digests_match;
use crate::error::CredentialError;
use crate::identity::UserDatabase;

/// Verifies a username/cleartext-password pair against some credential
/// store.
pub trait PasswordAuthenticator: Send + Sync {
	fn authenticate(&self, username: &str, password: &str) -> Result<(), CredentialError>;
}

// =============================================================================
// Host authentication service (PAM-shaped)
// =============================================================================

/// One message from the host authentication service to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt<'a> {
	/// Prompt whose answer may be echoed; answered with the username.
	EchoOn(&'a str),
	/// Prompt whose answer must not be echoed; answered with the password.
	EchoOff(&'a str),
	/// Informational text; no answer.
	TextInfo(&'a str),
	/// Error text; no answer.
	ErrorMsg(&'a str),
}

/// Answers service prompts during authentication.
pub trait Conversation {
	/// Answer one prompt. Informational prompts return `Ok(None)`.
	fn respond(&mut self, prompt: Prompt<'_>) -> Result<Option<String>, CredentialError>;
}

/// An in-progress host authentication transaction.
///
/// Dropping the session ends the transaction.
pub trait HostAuthSession {
	/// Run the authentication dialogue.
	fn authenticate(&mut self, conversation: &mut dyn Conversation) -> Result<(), CredentialError>;

	/// Verify that the authenticated account is valid and not expired.
	fn account_ok(&mut self) -> Result<(), CredentialError>;
}

/// A pluggable host authentication service.
pub trait HostAuthService: Send + Sync {
	type Session: HostAuthSession;

	/// Open a transaction for `username`.
	fn start(&self, username: &str) -> Result<Self::Session, CredentialError>;
}

/// Answers echo-on prompts with the username and echo-off prompts with
/// the password, the way the service expects login conversations to go.
struct CredentialConversation<'a> {
	username: &'a str,
	password: &'a str,
}

impl Conversation for CredentialConversation<'_> {
	fn respond(&mut self, prompt: Prompt<'_>) -> Result<Option<String>, CredentialError> {
		match prompt {
			Prompt::EchoOn(_) => Ok(Some(self.username.to_string())),
			Prompt::EchoOff(_) => Ok(Some(self.password.to_string())),
			Prompt::TextInfo(_) | Prompt::ErrorMsg(_) => Ok(None),
		}
	}
}

/// Adapts a [`HostAuthService`] to the [`PasswordAuthenticator`] seam.
pub struct HostServiceAuthenticator<S> {
	service: S,
}

impl<S: HostAuthService> HostServiceAuthenticator<S> {
	pub fn new(service: S) -> Self {
		Self { service }
	}
}

impl<S: HostAuthService> PasswordAuthenticator for HostServiceAuthenticator<S> {
	fn authenticate(&self, username: &str, password: &str) -> Result<(), CredentialError> {
		let mut session = self.service.start(username).map_err(|err| {
			tracing::error!(username, %err, "unable to start host authentication");
			err
		})?;

		let mut conversation = CredentialConversation { username, password };
		session.authenticate(&mut conversation).map_err(|err| {
			tracing::error!(username, %err, "host authentication failed");
			err
		})?;

		session.account_ok().map_err(|err| {
			tracing::error!(username, %err, "host account check failed");
			err
		})
	}
}

// =============================================================================
// Crypt fallback
// =============================================================================

/// Crypt-compare against the passwd and shadow stores.
///
/// Used when no host authentication service is configured. Blank stored
/// passwords never authenticate.
pub struct CryptAuthenticator {
	users: Arc<dyn UserDatabase>,
}

impl CryptAuthenticator {
	pub fn new(users: Arc<dyn UserDatabase>) -> Self {
		Self { users }
	}
}

impl PasswordAuthenticator for CryptAuthenticator {
	fn authenticate(&self, username: &str, password: &str) -> Result<(), CredentialError> {
		let Some(pw) = self.users.passwd(username) else {
			tracing::warn!(username, "unknown username; access denied");
			return Err(CredentialError::UnknownUser(username.to_string()));
		};

		let shadow = self.users.shadow(username);

		if shadow.is_none() && pw.passwd == "x" {
			tracing::warn!(username, "shadowed account with no shadow entry; access denied");
			return Err(CredentialError::NoPassword);
		}

		if pw.passwd.is_empty() && shadow.as_ref().map_or(true, |s| s.passwd.is_empty()) {
			tracing::warn!(username, "account has a blank password; access denied");
			return Err(CredentialError::NoPassword);
		}

		if let Some(hash) = cups_crypt(password, &pw.passwd) {
			if digests_match(&hash, &pw.passwd) {
				return Ok(());
			}
		}

		match shadow {
			Some(shadow) => {
				let hash =
					cups_crypt(password, &shadow.passwd).ok_or(CredentialError::BadPassword)?;
				if digests_match(&hash, &shadow.passwd) {
					Ok(())
				} else {
					Err(CredentialError::BadPassword)
				}
			}
			None => Err(CredentialError::BadPassword),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::identity::{PasswdEntry, ShadowEntry, StaticUserDatabase};

	// MD5-crypt of "secret" under salt "abcdefgh".
	const SECRET_HASH: &str = "$1$abcdefgh$cHJi5PXp/ki/ktXzqlk6I1";

	mod crypt_fallback {
		use super::*;

		fn authenticator(db: StaticUserDatabase) -> CryptAuthenticator {
			CryptAuthenticator::new(Arc::new(db))
		}

		#[test]
		fn passwd_hash_verifies() {
			let auth = authenticator(
				StaticUserDatabase::new()
					.with_user(PasswdEntry::new("alice", 1000, 100).with_passwd(SECRET_HASH)),
			);
			assert!(auth.authenticate("alice", "secret").is_ok());
			assert_eq!(
				auth.authenticate("alice", "wrong"),
				Err(CredentialError::BadPassword)
			);
		}

		#[test]
		fn shadow_hash_verifies_when_passwd_is_shadowed() {
			let auth = authenticator(
				StaticUserDatabase::new()
					.with_user(PasswdEntry::new("alice", 1000, 100).with_passwd("x"))
					.with_shadow(ShadowEntry::new("alice", SECRET_HASH)),
			);
			assert!(auth.authenticate("alice", "secret").is_ok());
			assert_eq!(
				auth.authenticate("alice", "wrong"),
				Err(CredentialError::BadPassword)
			);
		}

		#[test]
		fn unknown_user_is_rejected() {
			let auth = authenticator(StaticUserDatabase::new());
			assert_eq!(
				auth.authenticate("mallory", "secret"),
				Err(CredentialError::UnknownUser("mallory".to_string()))
			);
		}

		#[test]
		fn shadowed_account_without_shadow_entry_is_rejected() {
			let auth = authenticator(
				StaticUserDatabase::new()
					.with_user(PasswdEntry::new("alice", 1000, 100).with_passwd("x")),
			);
			assert_eq!(
				auth.authenticate("alice", "secret"),
				Err(CredentialError::NoPassword)
			);
		}

		#[test]
		fn blank_passwords_never_authenticate() {
			let auth = authenticator(
				StaticUserDatabase::new()
					.with_user(PasswdEntry::new("alice", 1000, 100))
					.with_shadow(ShadowEntry::new("alice", "")),
			);
			assert_eq!(
				auth.authenticate("alice", ""),
				Err(CredentialError::NoPassword)
			);
		}
	}

	mod host_service {
		use super::*;
		use std::sync::Mutex;

		/// Records the conversation and accepts one fixed credential pair.
		struct FakeService {
			expect_user: &'static str,
			expect_password: &'static str,
			fail_start: bool,
			fail_account: bool,
			transcript: Arc<Mutex<Vec<String>>>,
		}

		struct FakeSession {
			expect_user: String,
			expect_password: &'static str,
			fail_account: bool,
			transcript: Arc<Mutex<Vec<String>>>,
		}

		impl HostAuthService for FakeService {
			type Session = FakeSession;

			fn start(&self, username: &str) -> Result<FakeSession, CredentialError> {
				if self.fail_start {
					return Err(CredentialError::Service("start failed".to_string()));
				}
				if username != self.expect_user {
					return Err(CredentialError::UnknownUser(username.to_string()));
				}
				Ok(FakeSession {
					expect_user: username.to_string(),
					expect_password: self.expect_password,
					fail_account: self.fail_account,
					transcript: Arc::clone(&self.transcript),
				})
			}
		}

		impl HostAuthSession for FakeSession {
			fn authenticate(
				&mut self,
				conversation: &mut dyn Conversation,
			) -> Result<(), CredentialError> {
				let user = conversation.respond(Prompt::EchoOn("login:"))?;
				let pass = conversation.respond(Prompt::EchoOff("Password:"))?;
				conversation.respond(Prompt::TextInfo("checking"))?;

				let mut transcript = self.transcript.lock().unwrap();
				transcript.push(format!("user={}", user.as_deref().unwrap_or("")));
				transcript.push(format!("pass={}", pass.as_deref().unwrap_or("")));

				if user.as_deref() == Some(self.expect_user.as_str())
					&& pass.as_deref() == Some(self.expect_password)
				{
					Ok(())
				} else {
					Err(CredentialError::BadPassword)
				}
			}

			fn account_ok(&mut self) -> Result<(), CredentialError> {
				if self.fail_account {
					Err(CredentialError::AccountInvalid("expired".to_string()))
				} else {
					Ok(())
				}
			}
		}

		fn service(fail_start: bool, fail_account: bool) -> HostServiceAuthenticator<FakeService> {
			HostServiceAuthenticator::new(FakeService {
				expect_user: "alice",
				expect_password: "secret",
				fail_start,
				fail_account,
				transcript: Arc::new(Mutex::new(Vec::new())),
			})
		}

		#[test]
		fn conversation_supplies_username_and_password() {
			let transcript = Arc::new(Mutex::new(Vec::new()));
			let auth = HostServiceAuthenticator::new(FakeService {
				expect_user: "alice",
				expect_password: "secret",
				fail_start: false,
				fail_account: false,
				transcript: Arc::clone(&transcript),
			});

			assert!(auth.authenticate("alice", "secret").is_ok());
			assert_eq!(
				*transcript.lock().unwrap(),
				vec!["user=alice", "pass=secret"]
			);
		}

		#[test]
		fn bad_password_fails() {
			let auth = service(false, false);
			assert_eq!(
				auth.authenticate("alice", "wrong"),
				Err(CredentialError::BadPassword)
			);
		}

		#[test]
		fn start_failure_fails_closed() {
			let auth = service(true, false);
			assert!(matches!(
				auth.authenticate("alice", "secret"),
				Err(CredentialError::Service(_))
			));
		}

		#[test]
		fn account_check_failure_fails_closed() {
			let auth = service(false, true);
			assert!(matches!(
				auth.authenticate("alice", "secret"),
				Err(CredentialError::AccountInvalid(_))
			));
		}
	}
}
