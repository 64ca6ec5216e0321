// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for authorization configuration operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors raised while building the authorization configuration.
///
/// Request-time failures never surface as errors: credential and host-mask
/// evaluation fail closed into a [`Decision`](crate::Decision) instead.
#[derive(Error, Debug)]
pub enum AuthError {
	#[error("Invalid access mask \"{mask}\": {reason}")]
	InvalidMask { mask: String, reason: String },

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

/// Errors from a credential verification backend.
///
/// The orchestrator maps every variant to `Decision::Unauthorized`; the
/// distinctions exist for logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
	#[error("Unknown user \"{0}\"")]
	UnknownUser(String),

	#[error("Account has no usable password")]
	NoPassword,

	#[error("Password verification failed")]
	BadPassword,

	#[error("Account check failed: {0}")]
	AccountInvalid(String),

	#[error("Authentication service unavailable: {0}")]
	Service(String),
}
