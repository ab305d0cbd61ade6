//! Incremental content digests.
//!
//! MD5 is what the object store echoes back as the `ETag` of a plain
//! upload, so it is the default. SHA-256 is available for stores that are
//! configured to return it instead.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    pub fn digester(self) -> Digester {
        Digester::new(self)
    }

    /// Hex digest of `data` computed in one call.
    pub fn hex_digest(self, data: &[u8]) -> String {
        let mut digester = self.digester();
        digester.update(data);
        digester.finalize_hex()
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            other => Err(format!("unsupported digest algorithm `{}`", other)),
        }
    }
}

/// Running checksum over a byte sequence fed block by block.
pub enum Digester {
    Md5(md5::Context),
    Sha256(Sha256),
}

impl Digester {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Digester::Md5(md5::Context::new()),
            DigestAlgorithm::Sha256 => Digester::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Md5(ctx) => ctx.consume(data),
            Digester::Sha256(hasher) => hasher.update(data),
        }
    }

    /// Consume the digester and return the lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            Digester::Md5(ctx) => format!("{:x}", ctx.compute()),
            Digester::Sha256(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

impl fmt::Debug for Digester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Digester::Md5(_) => f.write_str("Digester::Md5"),
            Digester::Sha256(_) => f.write_str("Digester::Sha256"),
        }
    }
}
