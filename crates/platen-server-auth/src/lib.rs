// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization engine for the Platen print server.
//!
//! This crate decides, for each incoming HTTP/IPP request, whether the
//! request is accepted, rejected, or challenged for credentials. It is the
//! access-control core of the daemon; the HTTP layer feeds it one
//! [`RequestContext`] per request and maps the returned [`Decision`] to a
//! status code.
//!
//! # Overview
//!
//! - [`LocationTable`]: ordered collection of [`Location`] policy records
//!   keyed by URL path prefix, with longest-prefix/method-mask matching
//! - [`AuthMask`]: allow/deny predicates over IP networks, host/domain
//!   names, and local interfaces, evaluated strictly left-to-right
//! - [`Authorizer`]: the orchestrator composing host masks, transport
//!   encryption requirements, credential verification, and user/group
//!   policy under the configured satisfy rule
//! - [`UserDatabase`] / [`InterfaceProvider`] / [`PasswordAuthenticator`]:
//!   the seams to the platform user database, the network-interface
//!   enumerator, and the host authentication service
//!
//! # Decision flow
//!
//! ```text
//! Request → LocationTable::find_best(path, state)
//!         → Authorizer::is_authorized(ctx, owner)
//!             ├── host/IP allow-deny masks (Order, Satisfy)
//!             ├── encryption requirement (426 upgrade)
//!             ├── anonymous / unauthenticated-IPP shortcuts
//!             ├── credential verification (Basic / Digest / BasicDigest)
//!             └── principal checks (@OWNER, @SYSTEM, @group, user)
//!         → Decision (200 / 401 / 403 / 426)
//! ```
//!
//! The engine is synchronous and lock-free: the location table is sealed
//! once configuration is loaded, and reloads must be serialized with
//! request dispatch by the caller.

pub mod authenticate;
pub mod config;
pub mod crypt;
pub mod digest;
pub mod engine;
pub mod error;
pub mod identity;
pub mod location;
pub mod mask;
pub mod passwd;
pub mod types;

pub use authenticate::{
	Conversation, CryptAuthenticator, HostAuthService, HostAuthSession, HostServiceAuthenticator,
	PasswordAuthenticator, Prompt,
};
pub use config::AuthConfig;
pub use crypt::cups_crypt;
pub use digest::{auth_sub_field, md5_final, md5_ha1, DIGEST_REALM};
pub use engine::Authorizer;
pub use error::{AuthError, AuthResult, CredentialError};
pub use identity::{
	check_group, GroupEntry, PasswdEntry, ShadowEntry, StaticUserDatabase, UserDatabase,
};
pub use location::{Location, LocationId, LocationTable};
pub use mask::{
	check_masks, AddrFamily, AuthMask, InterfaceProvider, NetInterface, StaticInterfaceProvider,
};
pub use passwd::Md5PasswdFile;
pub use types::{
	AuthLevel, AuthType, Decision, Encryption, HttpState, IpWords, LimitMask, Order,
	RequestContext, Satisfy,
};

#[cfg(unix)]
pub use identity::SystemUserDatabase;
