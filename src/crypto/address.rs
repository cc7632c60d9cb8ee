//! TRON address representation.

use std::fmt;

/// A TRON address: the low 20 bytes of a Keccak-256 digest over an
/// uncompressed public key, addressed with the TRON mainnet version byte
/// (`0x41`) under base58check.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

/// TRON mainnet address version byte, prepended before base58check encoding.
pub const TRON_VERSION_BYTE: u8 = 0x41;

impl Address {
    #[inline]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derives the address's low 20 bytes from an uncompressed secp256k1
    /// public key (65 bytes, leading `0x04` tag included).
    ///
    /// Mirrors the GPU kernel's own derivation: Keccak-256 over the 64
    /// coordinate bytes (tag stripped), keep the last 20 bytes.
    pub fn from_uncompressed_public_key(public_key_bytes: &[u8; 65]) -> Self {
        use tiny_keccak::{Hasher, Keccak};

        let mut hasher = Keccak::v256();
        hasher.update(&public_key_bytes[1..]);
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Lowercase hex, no prefix.
    #[inline]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// TRON's canonical display form: version byte `0x41` + payload,
    /// base58check-encoded (the "check" feature appends/verifies the
    /// double-SHA256 checksum).
    pub fn to_base58check(&self) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(TRON_VERSION_BYTE);
        payload.extend_from_slice(&self.0);
        bs58::encode(payload).with_check().into_string()
    }

    /// Decodes a TRON base58check address back into its 20 raw bytes.
    pub fn from_base58check(s: &str) -> Result<Self, bs58::decode::Error> {
        let decoded = bs58::decode(s).with_check(Some(TRON_VERSION_BYTE)).into_vec()?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&decoded[1..21]);
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58check())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58check())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base58check_roundtrips() {
        let addr = Address::from_bytes([0x42; 20]);
        let encoded = addr.to_base58check();
        let decoded = Address::from_base58check(&encoded).unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn base58check_starts_with_capital_t() {
        // every mainnet TRON address (version 0x41) base58check-encodes to a
        // string starting with 'T'
        let addr = Address::from_bytes([0u8; 20]);
        assert!(addr.to_base58check().starts_with('T'));
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let addr = Address::from_bytes([0xAB; 20]);
        let mut encoded = addr.to_base58check();
        // flip the last character; checksum should no longer validate
        encoded.pop();
        encoded.push(if encoded.ends_with('1') { '2' } else { '1' });
        assert!(Address::from_base58check(&encoded).is_err());
    }

    #[test]
    fn hex_output_is_lowercase_no_prefix() {
        let addr = Address::from_bytes([0u8; 20]);
        assert_eq!(addr.to_hex(), "0000000000000000000000000000000000000000");
    }

    #[test]
    fn derivation_matches_known_vector() {
        // private key = 1; a well-known Ethereum address test vector
        // applies here too since TRON's hash step is identical (only the
        // final encoding differs).
        use secp256k1::{PublicKey, Secp256k1, SecretKey};

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01,
        ])
        .unwrap();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let addr = Address::from_uncompressed_public_key(&public_key.serialize_uncompressed());
        assert_eq!(addr.to_hex(), "7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }
}
