use crate::error::{Result, SiloError};
use serde::{Deserialize, Serialize};

/// Fixed name of the container entry holding the serialized meta record.
pub const META_ENTRY_NAME: &str = "meta";

/// How the payload bytes were produced upstream. The pipeline never
/// compresses anything itself; the tag only drives the payload entry
/// name and is echoed into the meta record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl CompressionMode {
    /// Deterministic payload entry name for this mode.
    pub fn entry_name(self) -> &'static str {
        match self {
            CompressionMode::None => "payload.tar",
            CompressionMode::Gzip => "payload.tar.gz",
            CompressionMode::Zstd => "payload.tar.zst",
        }
    }
}

/// Digest algorithm used by the hashing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Blake3 => "blake3",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

/// Cipher parameters carried in the meta record. The key itself never
/// lands in the container; only the nonce salt and frame length do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherTag {
    pub salt_hex: String,
    pub frame_len: u32,
}

/// Small record appended as the container's second entry once the true
/// payload size and digest are known. Written once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaRecord {
    pub inside_entry_name: String,
    pub hash_algorithm: HashAlgorithm,
    pub hash_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<CipherTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionMode>,
    pub created: i64,
    pub tool: String,
}

impl MetaRecord {
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| SiloError::Meta(e.to_string()))?;
        Ok(buf)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| SiloError::Meta(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetaRecord {
        MetaRecord {
            inside_entry_name: "payload.tar.gz".into(),
            hash_algorithm: HashAlgorithm::Blake3,
            hash_value: "ab".repeat(32),
            cipher: None,
            compression: Some(CompressionMode::Gzip),
            created: 1_700_000_000,
            tool: "silo-core/test".into(),
        }
    }

    #[test]
    fn cbor_round_trip() {
        let rec = sample();
        let bytes = rec.to_cbor().unwrap();
        let back = MetaRecord::from_cbor(&bytes).unwrap();
        assert_eq!(back.inside_entry_name, rec.inside_entry_name);
        assert_eq!(back.hash_algorithm, rec.hash_algorithm);
        assert_eq!(back.hash_value, rec.hash_value);
        assert_eq!(back.compression, rec.compression);
        assert!(back.cipher.is_none());
    }

    #[test]
    fn cipher_tag_survives() {
        let mut rec = sample();
        rec.cipher = Some(CipherTag {
            salt_hex: "00".repeat(32),
            frame_len: 65536,
        });
        let back = MetaRecord::from_cbor(&rec.to_cbor().unwrap()).unwrap();
        assert_eq!(back.cipher, rec.cipher);
    }

    #[test]
    fn entry_name_is_deterministic() {
        assert_eq!(CompressionMode::None.entry_name(), "payload.tar");
        assert_eq!(CompressionMode::Gzip.entry_name(), "payload.tar.gz");
        assert_eq!(CompressionMode::Zstd.entry_name(), "payload.tar.zst");
    }

    #[test]
    fn garbage_cbor_is_a_meta_error() {
        assert!(matches!(
            MetaRecord::from_cbor(b"not cbor at all"),
            Err(SiloError::Meta(_))
        ));
    }
}
