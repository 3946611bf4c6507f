// ABOUTME: PKCE (RFC 7636) code-verifier checking, S256 only
// ABOUTME: Constant-time comparison of the derived challenge against the committed one
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::crypto::constant_time_eq;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PkceError {
    #[error("invalid code_verifier")]
    VerifierMismatch,
}

/// Verify an S256 PKCE pair: `b64url_nopad(sha256(code_verifier))` must equal
/// the challenge committed at the authorization endpoint.
///
/// Either side empty is a mismatch.
///
/// # Errors
/// Returns [`PkceError::VerifierMismatch`] when the pair does not match.
pub fn verify_s256(code_verifier: &str, challenge: &str) -> Result<(), PkceError> {
    if code_verifier.is_empty() || challenge.is_empty() {
        return Err(PkceError::VerifierMismatch);
    }
    let derived = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));
    if constant_time_eq(&derived, challenge) {
        Ok(())
    } else {
        Err(PkceError::VerifierMismatch)
    }
}
