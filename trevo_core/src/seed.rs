use std::fmt;

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, EngineResult};

// Provably-fair seeding:
// server_seed (secret, committed by hash) + client_seed + spin_index
//   -> SHA256("server|client|index") -> per-spin seed

/// Raw server seeds are 32 random bytes rendered as lowercase hex.
pub const SERVER_SEED_HEX_LEN: usize = 64;

pub const MAX_CLIENT_SEED_LEN: usize = 128;

const SEED_SEPARATOR: char = '|';

pub fn derive_hash_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// SHA256 of `server|client|index`, raw digest bytes.
pub fn derive_seed_bytes(server_seed: &str, client_seed: &str, spin_index: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(server_seed.as_bytes());
    hasher.update(b"|");
    hasher.update(client_seed.as_bytes());
    hasher.update(b"|");
    hasher.update(spin_index.to_string().as_bytes());
    hasher.finalize().into()
}

/// Per-spin seed as a 64 character hex string.
pub fn derive_seed(server_seed: &str, client_seed: &str, spin_index: u64) -> String {
    hex::encode(derive_seed_bytes(server_seed, client_seed, spin_index))
}

pub fn validate_server_seed(seed: &str) -> EngineResult<()> {
    if seed.len() != SERVER_SEED_HEX_LEN {
        return Err(EngineError::InvalidSeedMaterial(format!(
            "server seed must be {SERVER_SEED_HEX_LEN} hex chars, got {}",
            seed.len()
        )));
    }
    if !seed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EngineError::InvalidSeedMaterial(
            "server seed must be hex".into(),
        ));
    }
    Ok(())
}

pub fn validate_client_seed(seed: &str) -> EngineResult<()> {
    if seed.trim().is_empty() {
        return Err(EngineError::InvalidSeedMaterial(
            "client seed must not be empty".into(),
        ));
    }
    if seed.len() > MAX_CLIENT_SEED_LEN {
        return Err(EngineError::InvalidSeedMaterial(format!(
            "client seed longer than {MAX_CLIENT_SEED_LEN} bytes"
        )));
    }
    // the separator would make two different seed pairs hash identically
    if seed.contains(SEED_SEPARATOR) {
        return Err(EngineError::InvalidSeedMaterial(
            "client seed must not contain '|'".into(),
        ));
    }
    Ok(())
}

pub fn generate_server_seed() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn generate_client_seed() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Checks a revealed server seed against the hash published before play.
pub fn verify_commitment(server_seed: &str, commitment_hash: &str) -> bool {
    derive_hash_hex(server_seed.as_bytes()).eq_ignore_ascii_case(commitment_hash)
}

/// What a player gets when the server seed is disclosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReveal {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub last_spin_index: u64,
}

/// Seeds and spin counter of one session.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedMaterial {
    server_seed: String, // secret until revealed
    client_seed: String,
    spin_index: u64,
}

impl SeedMaterial {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>) -> EngineResult<Self> {
        let server_seed = server_seed.into();
        let client_seed = client_seed.into();
        validate_server_seed(&server_seed)?;
        validate_client_seed(&client_seed)?;
        Ok(Self {
            server_seed,
            client_seed,
            spin_index: 0,
        })
    }

    /// Fresh server seed; the client seed is the hint when given, random otherwise.
    pub fn generate(client_seed_hint: Option<&str>) -> EngineResult<Self> {
        let client_seed = match client_seed_hint {
            Some(hint) => hint.to_string(),
            None => generate_client_seed(),
        };
        Self::new(generate_server_seed(), client_seed)
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    pub fn client_seed(&self) -> &str {
        &self.client_seed
    }

    pub fn spin_index(&self) -> u64 {
        self.spin_index
    }

    pub fn set_client_seed(&mut self, seed: impl Into<String>) -> EngineResult<()> {
        let seed = seed.into();
        validate_client_seed(&seed)?;
        self.client_seed = seed;
        Ok(())
    }

    /// Moves the counter forward and returns the index the next spin must use.
    pub fn advance(&mut self) -> u64 {
        self.spin_index += 1;
        self.spin_index
    }

    pub fn seed_bytes_for(&self, spin_index: u64) -> [u8; 32] {
        derive_seed_bytes(&self.server_seed, &self.client_seed, spin_index)
    }

    pub fn seed_for(&self, spin_index: u64) -> String {
        derive_seed(&self.server_seed, &self.client_seed, spin_index)
    }

    pub fn reveal(&self) -> SeedReveal {
        SeedReveal {
            server_seed: self.server_seed.clone(),
            server_seed_hash: self.server_seed_hash_hex(),
            client_seed: self.client_seed.clone(),
            last_spin_index: self.spin_index,
        }
    }

    /// Discloses the current server seed and commits to a new one.
    pub fn rotate(&mut self) -> SeedReveal {
        let revealed = self.reveal();
        self.server_seed = generate_server_seed();
        self.spin_index = 0;
        revealed
    }

    pub(crate) fn server_seed(&self) -> &str {
        &self.server_seed
    }
}

impl fmt::Debug for SeedMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedMaterial")
            .field("server_seed_hash", &self.server_seed_hash_hex())
            .field("client_seed", &self.client_seed)
            .field("spin_index", &self.spin_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_seed() -> String {
        "00".repeat(32)
    }

    #[test]
    fn test_determinism() {
        let a = derive_seed(&zero_seed(), "test", 0);
        let b = derive_seed(&zero_seed(), "test", 0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, derive_seed(&zero_seed(), "test", 1));
        assert_ne!(a, derive_seed(&zero_seed(), "other", 0));
    }

    #[test]
    fn seed_is_hash_of_joined_parts() {
        let joined = format!("{}|test|7", zero_seed());
        assert_eq!(
            derive_seed(&zero_seed(), "test", 7),
            derive_hash_hex(joined.as_bytes())
        );
    }

    #[test]
    fn rejects_bad_seeds() {
        assert!(SeedMaterial::new("abc", "client").is_err());
        assert!(SeedMaterial::new("zz".repeat(32), "client").is_err());
        assert!(SeedMaterial::new(zero_seed(), "").is_err());
        assert!(SeedMaterial::new(zero_seed(), "   ").is_err());
        assert!(SeedMaterial::new(zero_seed(), "a|b").is_err());
        assert!(SeedMaterial::new(zero_seed(), "x".repeat(MAX_CLIENT_SEED_LEN + 1)).is_err());
        assert!(SeedMaterial::new(zero_seed(), "client").is_ok());
    }

    #[test]
    fn generated_material_is_valid() {
        let material = SeedMaterial::generate(None).unwrap();
        assert!(validate_server_seed(material.server_seed()).is_ok());
        assert_eq!(material.spin_index(), 0);

        let hinted = SeedMaterial::generate(Some("lucky")).unwrap();
        assert_eq!(hinted.client_seed(), "lucky");
        assert!(SeedMaterial::generate(Some("")).is_err());
    }

    #[test]
    fn debug_hides_server_seed() {
        let material = SeedMaterial::new("ab".repeat(32), "client").unwrap();
        let shown = format!("{material:?}");
        assert!(!shown.contains(&"ab".repeat(32)));
        assert!(shown.contains(&material.server_seed_hash_hex()));
    }

    #[test]
    fn commitment_matches_reveal() {
        let mut material = SeedMaterial::new(zero_seed(), "client").unwrap();
        let commitment = material.server_seed_hash_hex();
        material.advance();
        material.advance();
        let revealed = material.rotate();
        assert_eq!(revealed.last_spin_index, 2);
        assert_eq!(revealed.server_seed, zero_seed());
        assert!(verify_commitment(&revealed.server_seed, &commitment));
        assert_eq!(material.spin_index(), 0);
        assert_ne!(material.server_seed_hash_hex(), commitment);
    }
}
