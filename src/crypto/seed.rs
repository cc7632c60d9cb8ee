//! Seed public key handling.

use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};

use crate::error::ConfigError;

/// The public key the search offsets from, and (when this run generated the
/// key pair itself rather than being handed a bare public key) the private
/// scalar needed to turn a winning offset back into a usable private key.
#[derive(Clone)]
pub struct SeedKey {
    public_key: PublicKey,
    secret_key: Option<SecretKey>,
}

impl SeedKey {
    /// Generates a fresh random key pair to search from.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        Self {
            public_key,
            secret_key: Some(secret_key),
        }
    }

    /// Parses a 128-hex-character uncompressed public key (`X||Y`, no
    /// `04` tag, as TRON/Ethereum vanity tools conventionally take it on
    /// the command line).
    pub fn from_public_hex(s: &str) -> Result<Self, ConfigError> {
        if s.len() != 128 {
            return Err(ConfigError::BadKeyLength(s.len()));
        }
        let coords = hex::decode(s).map_err(|e| ConfigError::BadKeyHex(e.to_string()))?;

        let mut uncompressed = [0u8; 65];
        uncompressed[0] = 0x04;
        uncompressed[1..].copy_from_slice(&coords);

        let public_key =
            PublicKey::from_slice(&uncompressed).map_err(|_| ConfigError::NotOnCurve)?;

        Ok(Self {
            public_key,
            secret_key: None,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The uncompressed public key bytes (`04 || X || Y`, 65 bytes).
    pub fn uncompressed_bytes(&self) -> [u8; 65] {
        self.public_key.serialize_uncompressed()
    }

    /// The seed point's affine `(x, y)` coordinates, as uploaded to the
    /// device's point-addition kernel.
    pub fn affine_coordinates(&self) -> ([u8; 32], [u8; 32]) {
        let bytes = self.uncompressed_bytes();
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&bytes[1..33]);
        y.copy_from_slice(&bytes[33..65]);
        (x, y)
    }

    /// `true` if this seed's private key is known (it was generated
    /// locally rather than supplied as a bare public key).
    pub fn has_private_key(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Reconstructs the private key for a winning offset: `secret + offset
    /// (mod n)`. Returns `None` when the seed key has no known private
    /// scalar (a bare public key was supplied on the command line).
    pub fn private_key_for_offset(&self, offset: &[u8; 32]) -> Option<[u8; 32]> {
        let secret_key = self.secret_key?;
        let tweak = Scalar::from_be_bytes(*offset).ok()?;
        let combined = secret_key.add_tweak(&tweak).ok()?;
        Some(combined.secret_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            SeedKey::from_public_hex("abcd"),
            Err(ConfigError::BadKeyLength(4))
        ));
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "g".repeat(128);
        assert!(matches!(
            SeedKey::from_public_hex(&bad),
            Err(ConfigError::BadKeyHex(_))
        ));
    }

    #[test]
    fn accepts_generator_point() {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[1u8; 32]).unwrap();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let hex_coords = hex::encode(&public_key.serialize_uncompressed()[1..]);

        let seed = SeedKey::from_public_hex(&hex_coords).unwrap();
        assert!(!seed.has_private_key());
        assert_eq!(seed.public_key(), &public_key);
    }

    #[test]
    fn generated_seed_reconstructs_private_key_for_zero_offset() {
        let seed = SeedKey::generate();
        let zero = [0u8; 32];
        let reconstructed = seed.private_key_for_offset(&zero).unwrap();
        assert_eq!(&reconstructed, seed.secret_key.unwrap().as_ref());
    }

    #[test]
    fn bare_public_key_has_no_reconstructable_private_key() {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let hex_coords = hex::encode(&public_key.serialize_uncompressed()[1..]);

        let seed = SeedKey::from_public_hex(&hex_coords).unwrap();
        assert!(seed.private_key_for_offset(&[0u8; 32]).is_none());
    }
}
