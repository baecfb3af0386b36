//! Photo fingerprints used for duplicate detection

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::device::PhotoEvidence;

/// How a photo's identity is derived
///
/// `NameAndSize` is `"{file_name}-{size}"`: two different photos with the
/// same name and size collide, and a renamed copy of the same photo does not.
/// `ContentHash` hashes the bytes instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FingerprintStrategy {
    #[default]
    NameAndSize,
    ContentHash,
}

impl FingerprintStrategy {
    pub fn fingerprint(&self, photo: &PhotoEvidence) -> String {
        match self {
            FingerprintStrategy::NameAndSize => format!("{}-{}", photo.file_name, photo.size()),
            FingerprintStrategy::ContentHash => {
                format!("sha256:{}", hex::encode(Sha256::digest(&photo.bytes)))
            }
        }
    }
}

impl FromStr for FingerprintStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name-size" => Ok(FingerprintStrategy::NameAndSize),
            "content-hash" => Ok(FingerprintStrategy::ContentHash),
            other => Err(format!(
                "unknown fingerprint strategy '{}' (expected name-size or content-hash)",
                other
            )),
        }
    }
}

impl fmt::Display for FingerprintStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FingerprintStrategy::NameAndSize => write!(f, "name-size"),
            FingerprintStrategy::ContentHash => write!(f, "content-hash"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_size() {
        let photo = PhotoEvidence::new("IMG_0001.jpg", vec![0u8; 348]);
        assert_eq!(
            FingerprintStrategy::NameAndSize.fingerprint(&photo),
            "IMG_0001.jpg-348"
        );
    }

    #[test]
    fn test_content_hash_ignores_name() {
        let a = PhotoEvidence::new("a.jpg", b"same bytes".to_vec());
        let b = PhotoEvidence::new("b.jpg", b"same bytes".to_vec());
        let c = PhotoEvidence::new("a.jpg", b"other bytes".to_vec());

        let strategy = FingerprintStrategy::ContentHash;
        assert_eq!(strategy.fingerprint(&a), strategy.fingerprint(&b));
        assert_ne!(strategy.fingerprint(&a), strategy.fingerprint(&c));
        assert!(strategy.fingerprint(&a).starts_with("sha256:"));
    }

    #[test]
    fn test_parse() {
        assert_eq!("name-size".parse(), Ok(FingerprintStrategy::NameAndSize));
        assert_eq!("Content-Hash".parse(), Ok(FingerprintStrategy::ContentHash));
        assert!("md5".parse::<FingerprintStrategy>().is_err());
    }
}
