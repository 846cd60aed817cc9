//! PKCE correlator generation (RFC 7636, S256 method).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Produce a fresh hex-encoded nonce: 256 bits from the OS CSPRNG, hashed
/// with SHA-256. Used independently for both the `state` and the
/// `code_verifier` values.
pub fn generate_nonce() -> String {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let digest = Sha256::digest(seed);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Derive the S256 code challenge for a verifier: base64url-encoded
/// SHA-256 of the verifier's bytes, unpadded. Pure function of its input.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_shape_and_uniqueness() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_code_challenge_rfc7636_vector() {
        // RFC 7636 appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_code_challenge_deterministic_and_base64url() {
        let verifier = generate_nonce();
        let first = code_challenge(&verifier);
        let second = code_challenge(&verifier);
        assert_eq!(first, second);
        assert!(!first.contains('+'));
        assert!(!first.contains('/'));
        assert!(!first.ends_with('='));
    }
}
