//! Perceptual hash values and the distance contract they share.

use serde::{Deserialize, Serialize};

/// A packed perceptual hash compared by Hamming distance
pub trait PerceptualHash: Clone + Send + Sync {
    /// Number of differing bits; 0 means the same gradient layout
    fn distance(&self, other: &Self) -> u32;

    /// Packed hash bytes
    fn as_bytes(&self) -> &[u8];

    /// Get the hash as a zero-padded hexadecimal string
    fn to_hex(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Hash width in bits
    fn bit_count(&self) -> u32 {
        (self.as_bytes().len() * 8) as u32
    }
}

/// Difference hash of one page image.
///
/// Bits are packed row-major, most significant bit first, so for the default
/// 8x8 grid the bytes read as one big-endian `u64`. Serialized as hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DHash {
    bytes: Vec<u8>,
}

impl DHash {
    /// Wrap packed hash bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Parse a hex string produced by [`PerceptualHash::to_hex`]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.is_empty() || hex.len() % 2 != 0 {
            return None;
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
            .collect::<Option<Vec<u8>>>()?;
        Some(Self { bytes })
    }

    /// The hash as an integer, when it fits in 64 bits
    pub fn as_u64(&self) -> Option<u64> {
        if self.bytes.len() > 8 {
            return None;
        }
        Some(self.bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }
}

impl PerceptualHash for DHash {
    fn distance(&self, other: &Self) -> u32 {
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<DHash> for String {
    fn from(hash: DHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for DHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DHash::from_hex(&value).ok_or_else(|| format!("invalid hash hex: {}", value))
    }
}

impl std::fmt::Display for DHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
