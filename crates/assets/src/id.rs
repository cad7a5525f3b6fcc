use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content-addressed asset id: the first eight bytes of the SHA-256 of the
/// source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Self(u64::from_le_bytes(head))
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_id() {
        assert_eq!(AssetId::from_bytes(b"sphere"), AssetId::from_bytes(b"sphere"));
        assert_ne!(AssetId::from_bytes(b"sphere"), AssetId::from_bytes(b"cube"));
    }

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(AssetId(0xab).to_string(), "00000000000000ab");
    }
}
