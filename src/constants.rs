//! Protocol constants. Values that feed published proofs are frozen;
//! changing any of them requires a new algorithm identifier.

/// Identifier stamped on raffle proofs.
pub const RAFFLE_ALGORITHM: &str = "raffle-v1";

/// Identifier stamped on slide-draw proofs.
pub const SLIDE_ALGORITHM: &str = "slide-v1";

/// Server seed length in bytes.
pub const SERVER_SEED_LEN: usize = 32;

/// XChaCha20-Poly1305 nonce length prepended to sealed seeds.
pub const SEED_NONCE_LEN: usize = 24;

/// Operator vault key length in bytes.
pub const VAULT_KEY_LEN: usize = 32;

/// Environment variable holding the hex-encoded vault key.
pub const VAULT_KEY_ENV: &str = "FAIRDRAW_VAULT_KEY";

/// Associated-data domain tag binding sealed seeds to their draw.
pub const SEED_AAD_DOMAIN: &[u8] = b"fairdraw.seed.v1";

/// Minimum length, in characters, of the admin-supplied entropy.
pub const MIN_EXTERNAL_ENTROPY_LEN: usize = 16;

/// Pity multiplier floor for a user with no miss streak.
pub const PITY_BASE_MULTIPLIER: f64 = 1.0;

/// Pity multiplier gained per consecutive miss.
pub const PITY_STEP: f64 = 0.01;

/// Pity multiplier ceiling.
pub const PITY_MAX_MULTIPLIER: f64 = 1.5;
