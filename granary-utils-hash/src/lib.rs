use std::fmt;
use std::str::FromStr;

use data_encoding::HEXLOWER_PERMISSIVE;
use thiserror::Error;

mod reader;

pub use reader::{digest_file, digest_reader};

const MD5_SIZE: usize = 128 / 8;

/// An MD5 digest of a source archive.
///
/// Stored as raw bytes; rendered and parsed as 32 lowercase hex characters,
/// the form the sources manifest and the build farm's upload call use.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Md5Digest([u8; MD5_SIZE]);

impl Md5Digest {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = MD5_SIZE * 2;

    pub const fn from_bytes(bytes: [u8; MD5_SIZE]) -> Self {
        Md5Digest(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; MD5_SIZE] {
        &self.0
    }

    /// Digest an in-memory byte slice.
    pub fn of<B: AsRef<[u8]>>(data: B) -> Self {
        Md5Digest(md5::compute(data).0)
    }
}

impl fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&HEXLOWER_PERMISSIVE.encode(&self.0))
    }
}

impl fmt::Debug for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Md5Digest({self})")
    }
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[error("invalid md5 digest '{input}': {reason}")]
pub struct InvalidDigestError {
    input: String,
    reason: String,
}

impl FromStr for Md5Digest {
    type Err = InvalidDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN {
            return Err(InvalidDigestError {
                input: s.to_owned(),
                reason: format!("expected {} hex characters, got {}", Self::HEX_LEN, s.len()),
            });
        }
        let raw = HEXLOWER_PERMISSIVE
            .decode(s.as_bytes())
            .map_err(|e| InvalidDigestError {
                input: s.to_owned(),
                reason: e.to_string(),
            })?;
        let mut bytes = [0u8; MD5_SIZE];
        bytes.copy_from_slice(&raw);
        Ok(Md5Digest(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_display_roundtrip() {
        let digest = Md5Digest::of(b"hello, world");
        let hex = digest.to_string();
        assert_eq!(hex.len(), Md5Digest::HEX_LEN);
        assert_eq!(hex.parse::<Md5Digest>().unwrap(), digest);
    }

    #[test]
    fn test_known_digest() {
        // md5("abc") per RFC 1321
        let digest = Md5Digest::of(b"abc");
        assert_eq!(digest.to_string(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = "abc123".parse::<Md5Digest>().unwrap_err();
        assert!(err.to_string().contains("expected 32 hex characters"));
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!(
            "zz0150983cd24fb0d6963f7d28e17f72"
                .parse::<Md5Digest>()
                .is_err()
        );
    }

    #[test]
    fn test_parse_accepts_uppercase() {
        let digest = "900150983CD24FB0D6963F7D28E17F72"
            .parse::<Md5Digest>()
            .unwrap();
        assert_eq!(digest, Md5Digest::of(b"abc"));
    }
}
