//! Custody of per-draw server seeds: generate, commit, seal at rest,
//! reveal at resolution. The raw seed is never observable between
//! those two moments, and never appears in logs.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::constants::{
    SEED_AAD_DOMAIN, SEED_NONCE_LEN, SERVER_SEED_LEN, VAULT_KEY_ENV, VAULT_KEY_LEN,
};
use crate::error::{VaultError, VaultResult};

/// Operator key the vault seals seeds under. Loaded from process
/// configuration, never persisted next to the ciphertexts.
#[derive(Clone)]
pub struct VaultKey([u8; VAULT_KEY_LEN]);

impl VaultKey {
    pub fn from_bytes(bytes: [u8; VAULT_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex_key: &str) -> VaultResult<Self> {
        let raw = hex::decode(hex_key).map_err(|e| VaultError::KeyNotHex(e.to_string()))?;
        let bytes: [u8; VAULT_KEY_LEN] = raw.try_into().map_err(|raw: Vec<u8>| {
            VaultError::InvalidKey {
                expected: VAULT_KEY_LEN,
                got: raw.len(),
            }
        })?;
        Ok(Self(bytes))
    }

    /// Reads the hex key from `FAIRDRAW_VAULT_KEY`.
    pub fn from_env() -> VaultResult<Self> {
        let hex_key = std::env::var(VAULT_KEY_ENV)
            .map_err(|_| VaultError::KeyEnvMissing(VAULT_KEY_ENV.to_owned()))?;
        Self::from_hex(hex_key.trim())
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

/// A seed at rest: the public commitment plus the sealed secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSeed {
    /// Hex SHA-256 of the raw seed. Published immediately, immutable.
    pub commit_hash: String,
    /// Hex of `nonce || aead ciphertext`, bound to the draw id.
    pub ciphertext: String,
}

/// A decrypted server seed. Lives only inside one resolution or
/// verification scope; holds no identity of its own in logs.
pub struct RevealedSeed([u8; SERVER_SEED_LEN]);

impl RevealedSeed {
    pub fn from_bytes(bytes: [u8; SERVER_SEED_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses the hex form a proof carries. `None` when the string is
    /// not exactly 32 bytes of hex.
    pub fn from_hex(hex_seed: &str) -> Option<Self> {
        let raw = hex::decode(hex_seed).ok()?;
        let bytes: [u8; SERVER_SEED_LEN] = raw.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn bytes(&self) -> &[u8; SERVER_SEED_LEN] {
        &self.0
    }

    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex SHA-256 of the seed; equals the published commitment for
    /// every honestly sealed seed.
    pub fn commit_hash(&self) -> String {
        hex::encode(Sha256::digest(self.0))
    }
}

impl fmt::Debug for RevealedSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RevealedSeed(..)")
    }
}

fn seed_aad(draw_id: u64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(SEED_AAD_DOMAIN.len() + 8);
    aad.extend_from_slice(SEED_AAD_DOMAIN);
    aad.extend_from_slice(&draw_id.to_be_bytes());
    aad
}

/// Generates a fresh 32-byte seed for a draw, publishes its SHA-256
/// commitment, and seals the secret under the operator key with the
/// draw id as associated data.
pub fn create_seed(key: &VaultKey, draw_id: u64) -> VaultResult<SealedSeed> {
    let mut secret = [0u8; SERVER_SEED_LEN];
    OsRng.fill_bytes(&mut secret);
    let commit_hash = hex::encode(Sha256::digest(secret));

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let mut nonce_bytes = [0u8; SEED_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let aad = seed_aad(draw_id);
    let sealed = cipher
        .encrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload {
                msg: &secret,
                aad: &aad,
            },
        )
        .map_err(|_| VaultError::SealFailure { draw_id })?;

    let mut blob = nonce_bytes.to_vec();
    blob.extend_from_slice(&sealed);

    info!(draw_id, commit = %commit_hash, "server seed committed");
    Ok(SealedSeed {
        commit_hash,
        ciphertext: hex::encode(blob),
    })
}

/// Opens a sealed seed for resolution. Tampered ciphertext, a wrong
/// key, or a ciphertext moved to another draw all fail decryption;
/// a decrypted seed that no longer matches its commitment is treated
/// as vault corruption.
pub fn reveal_seed(sealed: &SealedSeed, key: &VaultKey, draw_id: u64) -> VaultResult<RevealedSeed> {
    let blob = hex::decode(&sealed.ciphertext)
        .map_err(|e| VaultError::MalformedCiphertext(e.to_string()))?;
    if blob.len() <= SEED_NONCE_LEN {
        return Err(VaultError::MalformedCiphertext(
            "ciphertext shorter than its nonce".to_owned(),
        ));
    }
    let (nonce_bytes, ciphertext) = blob.split_at(SEED_NONCE_LEN);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let aad = seed_aad(draw_id);
    let plain = cipher
        .decrypt(
            XNonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| {
            error!(draw_id, "seed decryption failed");
            VaultError::SeedDecryption { draw_id }
        })?;

    let secret: [u8; SERVER_SEED_LEN] = plain
        .try_into()
        .map_err(|_| VaultError::MalformedCiphertext("unexpected seed length".to_owned()))?;
    let revealed = RevealedSeed(secret);
    if revealed.commit_hash() != sealed.commit_hash {
        error!(draw_id, "revealed seed does not match its commitment");
        return Err(VaultError::CommitMismatch { draw_id });
    }
    Ok(revealed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(fill: u8) -> VaultKey {
        VaultKey::from_bytes([fill; VAULT_KEY_LEN])
    }

    #[test]
    fn seal_and_reveal_round_trip() {
        let key = test_key(1);
        let sealed = create_seed(&key, 42).unwrap();
        let revealed = reveal_seed(&sealed, &key, 42).unwrap();
        assert_eq!(revealed.commit_hash(), sealed.commit_hash);
        assert_eq!(revealed.hex().len(), SERVER_SEED_LEN * 2);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let sealed = create_seed(&test_key(1), 42).unwrap();
        assert!(matches!(
            reveal_seed(&sealed, &test_key(2), 42),
            Err(VaultError::SeedDecryption { draw_id: 42 })
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let key = test_key(1);
        let mut sealed = create_seed(&key, 42).unwrap();
        let mut blob = hex::decode(&sealed.ciphertext).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        sealed.ciphertext = hex::encode(blob);
        assert!(matches!(
            reveal_seed(&sealed, &key, 42),
            Err(VaultError::SeedDecryption { .. })
        ));
    }

    #[test]
    fn ciphertext_is_bound_to_its_draw() {
        let key = test_key(1);
        let sealed = create_seed(&key, 42).unwrap();
        assert!(matches!(
            reveal_seed(&sealed, &key, 43),
            Err(VaultError::SeedDecryption { draw_id: 43 })
        ));
    }

    #[test]
    fn corrupted_commitment_is_detected() {
        let key = test_key(1);
        let mut sealed = create_seed(&key, 42).unwrap();
        sealed.commit_hash = "00".repeat(32);
        assert!(matches!(
            reveal_seed(&sealed, &key, 42),
            Err(VaultError::CommitMismatch { .. })
        ));
    }

    #[test]
    fn malformed_ciphertext_is_rejected() {
        let key = test_key(1);
        let not_hex = SealedSeed {
            commit_hash: "00".repeat(32),
            ciphertext: "zz".to_owned(),
        };
        assert!(matches!(
            reveal_seed(&not_hex, &key, 1),
            Err(VaultError::MalformedCiphertext(_))
        ));

        let truncated = SealedSeed {
            commit_hash: "00".repeat(32),
            ciphertext: "ab".repeat(SEED_NONCE_LEN),
        };
        assert!(matches!(
            reveal_seed(&truncated, &key, 1),
            Err(VaultError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn key_parsing_validates_shape() {
        assert!(VaultKey::from_hex(&"ab".repeat(VAULT_KEY_LEN)).is_ok());
        assert!(matches!(
            VaultKey::from_hex("abcd"),
            Err(VaultError::InvalidKey { got: 2, .. })
        ));
        assert!(matches!(
            VaultKey::from_hex("not hex at all"),
            Err(VaultError::KeyNotHex(_))
        ));
    }

    #[test]
    fn key_material_never_reaches_debug_output() {
        let key = VaultKey::from_hex(&"ab".repeat(VAULT_KEY_LEN)).unwrap();
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("ab"));

        let seed = RevealedSeed::from_bytes([0xcd; SERVER_SEED_LEN]);
        assert!(!format!("{seed:?}").contains("cd"));
    }

    #[test]
    fn revealed_seed_parses_its_own_hex() {
        let seed = RevealedSeed::from_bytes([7; SERVER_SEED_LEN]);
        let parsed = RevealedSeed::from_hex(&seed.hex()).unwrap();
        assert_eq!(parsed.bytes(), seed.bytes());
        assert!(RevealedSeed::from_hex("abcd").is_none());
        assert!(RevealedSeed::from_hex("xy").is_none());
    }
}
