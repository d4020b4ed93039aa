//! Crypto error types.

/// Unified error type for the `wallet-crypto` primitives.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Encryption failed (e.g. invalid key length, `ring` internal error).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Decryption failed. Per spec §4.1 the caller must not be able to
    /// distinguish wrong key, tampered ciphertext, or bad nonce from this
    /// message alone.
    #[error("authentication failed — wrong passphrase or corrupted data")]
    AuthenticationFailed,

    /// Key derivation failed (e.g. invalid Argon2id parameters, HKDF expand
    /// length out of range).
    #[error("key derivation failed: {reason}")]
    KeyDerivationFailed { reason: String },

    /// The system CSPRNG failed to produce random bytes.
    #[error("random number generation failed")]
    RandomFailed,
}

/// Convenience alias used throughout the crypto crate.
pub type Result<T> = std::result::Result<T, CryptoError>;
