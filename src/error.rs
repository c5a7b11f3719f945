use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;
pub type ResolveResult<T> = Result<T, ResolveError>;
pub type ProofResult<T> = Result<T, ProofError>;

/// Failures around seed custody. Decryption failures are fatal for
/// the resolution attempt and must reach the operator unmodified.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault key must be {expected} bytes, got {got}")]
    InvalidKey { expected: usize, got: usize },

    #[error("vault key is not valid hex: {0}")]
    KeyNotHex(String),

    #[error("vault key environment variable {0} is not set")]
    KeyEnvMissing(String),

    #[error("sealed seed ciphertext is malformed: {0}")]
    MalformedCiphertext(String),

    #[error("seed encryption failed for draw {draw_id}")]
    SealFailure { draw_id: u64 },

    #[error("seed decryption failed for draw {draw_id}")]
    SeedDecryption { draw_id: u64 },

    #[error("revealed seed does not match the published commitment for draw {draw_id}")]
    CommitMismatch { draw_id: u64 },
}

/// Draw lifecycle and resolution failures. All of these are raised
/// before any randomness is consumed and leave the draw untouched.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("draw {0} is not registered")]
    UnknownDraw(u64),

    #[error("draw {0} is already registered")]
    DuplicateDraw(u64),

    #[error("raffle has already been opened")]
    NotDraft,

    #[error("raffle is not open")]
    NotOpen,

    #[error("raffle is not closed")]
    NotClosed,

    #[error("raffle close time is missing")]
    MissingCloseTime,

    #[error("draw has already been resolved")]
    AlreadyDrawn,

    #[error("slide draw was cancelled")]
    Cancelled,

    #[error("winner count must be at least 1")]
    InvalidWinnerCount,

    #[error("requested {requested} winners but only {available} tickets were sold")]
    InsufficientTickets { requested: usize, available: usize },

    #[error("slide draw has no entries")]
    InsufficientEntries,

    #[error("external entropy must be at least {min} characters, got {got}")]
    EntropyTooShort { min: usize, got: usize },

    #[error("prize table is invalid: {0}")]
    InvalidPrizeTable(String),

    #[error("tickets must be strictly ordered by index")]
    InvalidTicketOrder,

    #[error("entry number range is invalid")]
    InvalidNumberRange,

    #[error("entry number range is exhausted")]
    NumberPoolExhausted,

    #[error("entry number {0} is already taken")]
    DuplicateEntryNumber(u32),

    #[error("entry number {0} is outside the draw range")]
    EntryOutOfRange(u32),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Malformed-proof conditions. A proof that is well formed but does
/// not check out verifies to `false` instead of raising these.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("unknown proof algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("revealed server seed is not a {expected}-byte hex string")]
    MalformedSeed { expected: usize },

    #[error("{field} is not a valid hex digest")]
    MalformedHash { field: &'static str },

    #[error("proof payload does not match algorithm {algorithm}")]
    PayloadMismatch { algorithm: String },

    #[error("supplied population does not match algorithm {algorithm}")]
    PopulationMismatch { algorithm: String },

    #[error("supplied population is invalid: {0}")]
    InvalidPopulation(&'static str),
}
