//! Signature Verifier
//!
//! Checks that a webhook was signed by the source host. The host sends
//! `X-Hub-Signature: <algorithm>=<hex digest>` where the digest is the HMAC of
//! the raw request body keyed with the shared webhook secret.
//!
//! Digest comparison is constant time. Connection keys presented by workers
//! and routers are compared in constant time as well.

use std::fmt;
use std::str::FromStr;

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Reasons a signature is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header")]
    MalformedHeader,

    #[error("unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("signature digest is not valid hex")]
    InvalidHex,

    #[error("signature mismatch")]
    Mismatch,
}

/// Hash functions the source host may sign with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl FromStr for Algorithm {
    type Err = SignatureError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            "sha512" => Ok(Algorithm::Sha512),
            other => Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Sha1 => write!(f, "sha1"),
            Algorithm::Sha256 => write!(f, "sha256"),
            Algorithm::Sha512 => write!(f, "sha512"),
        }
    }
}

/// Splits a signature header into its algorithm tag and hex digest
pub fn parse_header(header: Option<&str>) -> Result<(&str, &str), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    if header.is_empty() {
        return Err(SignatureError::MissingHeader);
    }

    header
        .split_once('=')
        .ok_or(SignatureError::MalformedHeader)
}

/// Verifies that `digest_hex` is the HMAC of `body` under `secret`
pub fn verify(
    secret: &[u8],
    algorithm_tag: &str,
    body: &[u8],
    digest_hex: &str,
) -> Result<(), SignatureError> {
    let algorithm = Algorithm::from_str(algorithm_tag)?;
    let presented = hex::decode(digest_hex).map_err(|_| SignatureError::InvalidHex)?;

    match algorithm {
        Algorithm::Sha1 => verify_mac::<Hmac<Sha1>>(secret, body, &presented),
        Algorithm::Sha256 => verify_mac::<Hmac<Sha256>>(secret, body, &presented),
        Algorithm::Sha512 => verify_mac::<Hmac<Sha512>>(secret, body, &presented),
    }
}

/// Verifies a raw signature header against `body`
pub fn verify_header(
    secret: &[u8],
    header: Option<&str>,
    body: &[u8],
) -> Result<(), SignatureError> {
    let (algorithm, digest) = parse_header(header)?;
    verify(secret, algorithm, body, digest)
}

/// Boolean form of [`verify`]
pub fn is_valid(secret: &[u8], algorithm_tag: &str, body: &[u8], digest_hex: &str) -> bool {
    verify(secret, algorithm_tag, body, digest_hex).is_ok()
}

/// Compares a presented connection key with the expected one in constant time
pub fn keys_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

fn verify_mac<M: Mac + KeyInit>(
    secret: &[u8],
    body: &[u8],
    presented: &[u8],
) -> Result<(), SignatureError> {
    // HMAC accepts keys of any length
    let mut mac = <M as Mac>::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(body);
    mac.verify_slice(presented)
        .map_err(|_| SignatureError::Mismatch)
}

/// Hex HMAC of `body`, as the source host would send it
#[cfg(test)]
pub(crate) fn sign(secret: &[u8], algorithm: Algorithm, body: &[u8]) -> String {
    fn digest<M: Mac + KeyInit>(secret: &[u8], body: &[u8]) -> String {
        let mut mac = <M as Mac>::new_from_slice(secret).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    match algorithm {
        Algorithm::Sha1 => digest::<Hmac<Sha1>>(secret, body),
        Algorithm::Sha256 => digest::<Hmac<Sha256>>(secret, body),
        Algorithm::Sha512 => digest::<Hmac<Sha512>>(secret, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"It's a Secret to Everybody";
    const BODY: &[u8] = b"Hello, World!";
    const ALGORITHMS: [Algorithm; 3] = [Algorithm::Sha1, Algorithm::Sha256, Algorithm::Sha512];

    #[test]
    fn test_known_sha256_vector() {
        // Published example from the source host's webhook documentation
        let digest = "757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";
        assert!(is_valid(SECRET, "sha256", BODY, digest));
        assert_eq!(sign(SECRET, Algorithm::Sha256, BODY), digest);
    }

    #[test]
    fn test_valid_signatures() {
        for algorithm in ALGORITHMS {
            let digest = sign(SECRET, algorithm, BODY);
            let header = format!("{}={}", algorithm, digest);
            assert_eq!(verify_header(SECRET, Some(&header), BODY), Ok(()));
        }
    }

    #[test]
    fn test_uppercase_hex_is_accepted() {
        let digest = sign(SECRET, Algorithm::Sha1, BODY).to_uppercase();
        assert!(is_valid(SECRET, "sha1", BODY, &digest));
    }

    #[test]
    fn test_single_bit_mutations_are_rejected() {
        for algorithm in ALGORITHMS {
            let tag = algorithm.to_string();
            let digest = sign(SECRET, algorithm, BODY);

            let mut body = BODY.to_vec();
            body[0] ^= 0x01;
            assert_eq!(
                verify(SECRET, &tag, &body, &digest),
                Err(SignatureError::Mismatch)
            );

            let mut secret = SECRET.to_vec();
            secret[3] ^= 0x80;
            assert_eq!(
                verify(&secret, &tag, BODY, &digest),
                Err(SignatureError::Mismatch)
            );

            let mut raw = hex::decode(&digest).unwrap();
            let last = raw.len() - 1;
            raw[last] ^= 0x01;
            assert_eq!(
                verify(SECRET, &tag, BODY, &hex::encode(raw)),
                Err(SignatureError::Mismatch)
            );
        }
    }

    #[test]
    fn test_digest_from_other_algorithm_is_rejected() {
        let digest = sign(SECRET, Algorithm::Sha1, BODY);
        assert_eq!(
            verify(SECRET, "sha256", BODY, &digest),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_truncated_digest_is_rejected() {
        let digest = sign(SECRET, Algorithm::Sha256, BODY);
        assert_eq!(
            verify(SECRET, "sha256", BODY, &digest[..32]),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(verify(SECRET, "sha256", BODY, ""), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_distinct_failure_reasons() {
        assert_eq!(
            verify_header(SECRET, None, BODY),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify_header(SECRET, Some(""), BODY),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify_header(SECRET, Some("sha256"), BODY),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_header(SECRET, Some("md5=abcdef"), BODY),
            Err(SignatureError::UnsupportedAlgorithm("md5".to_string()))
        );
        assert_eq!(
            verify_header(SECRET, Some("sha256=zz"), BODY),
            Err(SignatureError::InvalidHex)
        );
        assert_eq!(
            verify_header(SECRET, Some("sha256=abc"), BODY),
            Err(SignatureError::InvalidHex)
        );
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("worker-key", "worker-key"));
        assert!(!keys_match("worker-key", "worker-kex"));
        assert!(!keys_match("worker-key", "worker"));
        assert!(!keys_match("worker-key", ""));
    }
}
