// ABOUTME: Cryptographic utilities shared across the provider core
// ABOUTME: SHA-256 hex digests, URL-safe randomness, constant-time equality, scope normalization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 the oidc-provider authors

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// System RNG failure. Surfaced instead of panicking so callers can map it
/// to their own error domain.
#[derive(Debug, Error)]
#[error("system rng failure")]
pub struct RngError;

/// Hex-encoded SHA-256 digest of `value`.
///
/// Raw authorization codes, refresh tokens, and client secrets are persisted
/// only in this form.
#[must_use]
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Generate `size` cryptographically random bytes, base64url-encoded without
/// padding.
///
/// # Errors
/// Returns [`RngError`] if the system RNG fails.
pub fn random_url_safe(size: usize) -> Result<String, RngError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; size];
    rng.fill(&mut bytes).map_err(|_| RngError)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// Constant-time string equality.
///
/// The length check short-circuits; secrets compared here are fixed-length
/// digests, so length is not itself secret.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Trim whitespace, drop empties, dedupe preserving first occurrence.
///
/// Used for scope lists, redirect-URI lists, and grant-type lists alike.
#[must_use]
pub fn normalize_scopes(input: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(input.len());
    let mut result = Vec::with_capacity(input.len());
    for value in input {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_owned()) {
            result.push(trimmed.to_owned());
        }
    }
    result
}

/// Split a space-delimited scope parameter into a normalized list.
#[must_use]
pub fn split_scope(raw: &str) -> Vec<String> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_owned).collect();
    normalize_scopes(&parts)
}

/// Join a scope list back into the space-delimited wire form.
#[must_use]
pub fn join_scope(scopes: &[String]) -> String {
    normalize_scopes(scopes).join(" ")
}

/// True if every required scope is present in the granted list.
#[must_use]
pub fn scope_is_subset(required: &[String], granted: &[String]) -> bool {
    let set: std::collections::HashSet<&str> = granted.iter().map(String::as_str).collect();
    required.iter().all(|scope| set.contains(scope.as_str()))
}

/// Union of two scope lists, normalized, base order preserved.
#[must_use]
pub fn merge_scopes(base: &[String], extra: &[String]) -> Vec<String> {
    let mut combined = base.to_vec();
    combined.extend_from_slice(extra);
    normalize_scopes(&combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_random_url_safe_length_and_alphabet() {
        let value = random_url_safe(32).unwrap();
        // 32 bytes -> 43 base64url chars without padding
        assert_eq!(value.len(), 43);
        assert!(value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_random_url_safe_unique() {
        assert_ne!(random_url_safe(32).unwrap(), random_url_safe(32).unwrap());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret-value", "secret-value"));
        assert!(!constant_time_eq("secret-value", "secret-valuf"));
        assert!(!constant_time_eq("short", "longer-value"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_normalize_scopes() {
        let input = vec![
            " openid ".to_owned(),
            String::new(),
            "profile".to_owned(),
            "openid".to_owned(),
            "  ".to_owned(),
        ];
        assert_eq!(normalize_scopes(&input), vec!["openid", "profile"]);
    }

    #[test]
    fn test_split_and_join_scope() {
        assert_eq!(split_scope("  openid   profile openid "), vec!["openid", "profile"]);
        assert!(split_scope("   ").is_empty());
        assert_eq!(
            join_scope(&["openid".to_owned(), "profile".to_owned()]),
            "openid profile"
        );
    }

    #[test]
    fn test_scope_is_subset() {
        let granted = vec!["openid".to_owned(), "profile".to_owned(), "email".to_owned()];
        assert!(scope_is_subset(&["openid".to_owned()], &granted));
        assert!(scope_is_subset(&[], &granted));
        assert!(!scope_is_subset(&["admin".to_owned()], &granted));
    }

    #[test]
    fn test_merge_scopes_dedupes_preserving_base_order() {
        let base = vec!["openid".to_owned(), "profile".to_owned()];
        let extra = vec!["email".to_owned(), "openid".to_owned()];
        assert_eq!(merge_scopes(&base, &extra), vec!["openid", "profile", "email"]);
    }
}
