//! PKCE Material
//!
//! Verifier/challenge pairs (RFC 7636, S256 method) and state nonces for the
//! OAuth redirect flow. The verifier is persisted across the full-page
//! navigation and consumed exactly once by the callback handler.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Entropy for verifiers and state nonces (RFC 7636 recommends 32 octets)
const NONCE_BYTES: usize = 32;

/// PKCE verifier/challenge pair
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// Kept client-side and sent only on the token exchange
    pub verifier: String,
    /// S256 digest of the verifier, sent on the authorize request
    pub challenge: String,
}

/// Generate a fresh PKCE pair
pub fn generate_pkce() -> PkcePair {
    let verifier = random_token();
    let digest = Sha256::digest(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(digest);

    PkcePair {
        verifier,
        challenge,
    }
}

/// Generate an opaque state nonce for the authorize request
pub fn state_nonce() -> String {
    random_token()
}

fn random_token() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
