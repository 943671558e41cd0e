// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PKCE material, the authorization URL, and the signed OAuth `state`.
//!
//! MAL only implements the `plain` challenge method, so the value sent as
//! `code_challenge` is also the `code_verifier` at exchange time. That value
//! is itself the SHA-256 digest of a random secret, so nothing guessable
//! travels through the browser.
//!
//! The `state` parameter binds the callback to the user who started the
//! flow: `base64url("username|timestamp_hex|hmac_hex")`.

use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Challenge method declared to the provider.
pub const CODE_CHALLENGE_METHOD: &str = "plain";

/// Signed states older than this are rejected at the callback.
pub const STATE_MAX_AGE_MS: i64 = 10 * 60 * 1000;

const VERIFIER_BYTES: usize = 32;

/// URL-safe base64 (no padding) SHA-256 digest of `verifier`.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Fresh random verifier secret from the system CSPRNG.
pub fn generate_verifier() -> Result<String, AppError> {
    let mut bytes = [0u8; VERIFIER_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG unavailable")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Compose the provider authorization redirect URL.
pub fn build_authorize_url(
    auth_base_url: &str,
    client_id: &str,
    state: &str,
    challenge: &str,
    redirect_uri: Option<&str>,
) -> Result<String, AppError> {
    if client_id.trim().is_empty() {
        return Err(AppError::Configuration("MAL client ID is not set".to_string()));
    }

    let mut url = format!(
        "{}?response_type=code&\
         client_id={}&\
         state={}&\
         code_challenge={}&\
         code_challenge_method={}",
        auth_base_url,
        urlencoding::encode(client_id),
        urlencoding::encode(state),
        urlencoding::encode(challenge),
        CODE_CHALLENGE_METHOD
    );
    if let Some(redirect_uri) = redirect_uri {
        url.push_str("&redirect_uri=");
        url.push_str(&urlencoding::encode(redirect_uri));
    }
    Ok(url)
}

/// Sign `username` into an opaque `state` value issued at `now_ms`.
pub fn sign_state(username: &str, now_ms: i64, key: &[u8]) -> Result<String, AppError> {
    let payload = format!("{}|{:x}", username, now_ms);
    let signature = hex::encode(state_mac(&payload, key)?);
    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Recover the username from a signed state, or `None` if it was tampered
/// with, signed with another key, or is older than [`STATE_MAX_AGE_MS`].
pub fn verify_state(state: &str, key: &[u8], now_ms: i64) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    // Usernames never contain '|', so split from the right.
    let mut parts = decoded.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let username = parts.next()?;

    let payload = format!("{}|{}", username, timestamp_hex);
    let expected = state_mac(&payload, key).ok()?;
    let provided = hex::decode(signature_hex).ok()?;
    if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_at = i64::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_at) > STATE_MAX_AGE_MS || issued_at > now_ms {
        tracing::warn!("Expired OAuth state");
        return None;
    }

    Some(username.to_string())
}

fn state_mac(payload: &str, key: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}
