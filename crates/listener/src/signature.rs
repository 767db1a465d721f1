//! `X-Hub-Signature-256` verification.

use hmac::{Hmac, Mac};
use pipeline::SecretString;
use sha2::Sha256;
use thiserror::Error;

/// Header GitHub puts the body's HMAC-SHA256 in.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Why a delivery's signature was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("X-Hub-Signature-256 header missing")]
    Missing,
    #[error("X-Hub-Signature-256 sha256= prefix missing")]
    UnsupportedScheme,
    #[error("X-Hub-Signature-256 malformed")]
    Malformed,
    #[error("signature mismatch")]
    Mismatch,
}

/// Checks `header` (`sha256=<hex>`) against the HMAC-SHA256 of `body` keyed
/// with `secret`. The comparison is constant-time.
///
/// # Errors
///
/// See [`SignatureError`].
pub fn verify_signature(
    secret: &SecretString,
    header: Option<&str>,
    body: &[u8],
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let hex_digest = header
        .strip_prefix("sha256=")
        .ok_or(SignatureError::UnsupportedScheme)?;
    let signature = hex::decode(hex_digest).map_err(|_| SignatureError::Malformed)?;

    // HMAC accepts keys of any length, so this cannot fail.
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.expose().as_bytes()) else {
        return Err(SignatureError::Mismatch);
    };
    mac.update(body);
    mac.verify_slice(&signature).map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn secret() -> SecretString {
        SecretString::new("It's a Secret to Everybody").unwrap()
    }

    // Test vector from GitHub's "Validating webhook deliveries" guide.
    const GITHUB_SAMPLE: &str =
        "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";

    #[test]
    fn accepts_the_documented_sample() {
        assert_eq!(
            verify_signature(&secret(), Some(GITHUB_SAMPLE), b"Hello, World!"),
            Ok(())
        );
    }

    #[rstest]
    #[case(None, SignatureError::Missing)]
    #[case(Some("sha1=757107ea0eb2509fc211221cce984b8a"), SignatureError::UnsupportedScheme)]
    #[case(Some("sha256=not-hex"), SignatureError::Malformed)]
    #[case(Some("sha256=00ff"), SignatureError::Mismatch)]
    fn rejects_bad_headers(#[case] header: Option<&str>, #[case] expected: SignatureError) {
        assert_eq!(
            verify_signature(&secret(), header, b"Hello, World!"),
            Err(expected)
        );
    }

    #[test]
    fn rejects_a_tampered_body() {
        assert_eq!(
            verify_signature(&secret(), Some(GITHUB_SAMPLE), b"Hello, World?"),
            Err(SignatureError::Mismatch)
        );
    }
}
