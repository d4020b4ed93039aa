//! Passphrase-derived AES-256-GCM primitives for the checkout wallet.
//!
//! This crate provides the cryptographic floor the rest of the wallet is
//! built on:
//!
//! - **Key derivation**: Argon2id over `(passphrase, salt)` followed by
//!   HKDF-SHA256 domain separation, producing a 256-bit AES key. The
//!   Argon2id → HKDF chain must stay bit-exact across versions — it is what
//!   lets an on-disk vault created by one build stay readable by the next.
//! - **Encryption/decryption**: AES-256-GCM authenticated encryption via
//!   `ring`, with a fresh random 96-bit nonce per call.
//!
//! # Security notes
//!
//! - Nonces are generated randomly for each encryption operation. With a
//!   96-bit nonce and random generation, collision probability is negligible
//!   for up to ~2^32 encryptions under the same key.
//! - Argon2id parameters are fixed at memory=64 MiB, iterations=3,
//!   parallelism=1, matching the spec's domain-separation requirement; they
//!   are not caller-configurable so that all vaults derive keys identically.
//! - The derived key is held in a [`zeroize::Zeroizing`] buffer and is
//!   zeroed on drop. Callers must not copy it out of that buffer.

mod error;

pub use error::{CryptoError, Result};

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, SealingKey, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Length of the passphrase-derivation salt in bytes.
pub const SALT_LEN: usize = 32;

/// Argon2id memory cost, in KiB (64 MiB).
const ARGON2_MEM_KIB: u32 = 64 * 1024;

/// Argon2id time cost (iterations).
const ARGON2_ITERATIONS: u32 = 3;

/// Argon2id parallelism (lanes).
const ARGON2_PARALLELISM: u32 = 1;

/// HKDF domain-separation info string. Changing this invalidates every key
/// derived by a previous build — must be preserved bit-exact.
const HKDF_INFO: &[u8] = b"checkout-wallet-v1";

/// AES-256-GCM algorithm from `ring`.
static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A single-use nonce sequence that yields exactly one nonce and then errors.
///
/// `ring` requires a [`NonceSequence`] for sealing/opening operations. Since
/// we generate (or are handed) a fresh nonce per call, this wrapper ensures
/// each bound key is used exactly once.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl SingleNonce {
    fn new(bytes: [u8; NONCE_LEN_BYTES]) -> Self {
        Self(Some(bytes))
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derive a 256-bit AES key from `passphrase` and `salt` via Argon2id then
/// HKDF-SHA256.
///
/// The Argon2id step is deliberately followed by an HKDF expansion: this is
/// domain separation, not redundancy, and both steps must run unconditionally
/// for the derived key to match a vault created by any other build of this
/// crate.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivationFailed`] if the Argon2id parameters
/// are rejected or the HKDF expansion length is invalid (neither happens for
/// the fixed parameters this crate uses, but the check is kept explicit
/// rather than `unwrap`ped).
pub fn derive_key(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let params = Params::new(ARGON2_MEM_KIB, ARGON2_ITERATIONS, ARGON2_PARALLELISM, Some(KEY_LEN))
        .map_err(|e| CryptoError::KeyDerivationFailed {
            reason: format!("invalid argon2 parameters: {e}"),
        })?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut argon2_out = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase, salt, argon2_out.as_mut())
        .map_err(|e| CryptoError::KeyDerivationFailed {
            reason: format!("argon2id derivation failed: {e}"),
        })?;

    let hk = Hkdf::<Sha256>::new(Some(salt), argon2_out.as_ref());
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(HKDF_INFO, key.as_mut())
        .map_err(|_| CryptoError::KeyDerivationFailed {
            reason: "hkdf expand failed".into(),
        })?;

    tracing::debug!("derived vault key via argon2id + hkdf-sha256");
    Ok(key)
}

/// Generate a fresh random salt suitable for [`derive_key`].
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if the system CSPRNG fails.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).map_err(|_| CryptoError::RandomFailed)?;
    Ok(salt)
}

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf).map_err(|_| CryptoError::RandomFailed)?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// An encrypted record: nonce, ciphertext (GCM tag appended), kept separate
/// from the tag only at the storage layer — `ring` appends the 16-byte tag
/// to the ciphertext it returns.
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN_BYTES],
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` with AES-256-GCM using `key`.
///
/// # Errors
///
/// Returns [`CryptoError::EncryptionFailed`] if the key is malformed or
/// `ring` reports an internal failure.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<Sealed> {
    let rng = SystemRandom::new();

    let mut nonce_bytes = [0u8; NONCE_LEN_BYTES];
    rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::RandomFailed)?;

    let unbound_key = UnboundKey::new(AEAD_ALG, key).map_err(|_| CryptoError::EncryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;
    let mut sealing_key = SealingKey::new(unbound_key, SingleNonce::new(nonce_bytes));

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = in_out.len(),
        "encrypted data"
    );

    Ok(Sealed {
        nonce: nonce_bytes,
        ciphertext: in_out,
    })
}

/// Decrypt `ciphertext` (which includes the GCM tag) using `nonce` and `key`.
///
/// # Errors
///
/// Returns [`CryptoError::AuthenticationFailed`] on any tampering, wrong key,
/// or wrong nonce — per spec §4.1 the caller must not be able to tell these
/// apart from the error alone.
pub fn decrypt(nonce: &[u8; NONCE_LEN_BYTES], ciphertext: &[u8], key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    let unbound_key = UnboundKey::new(AEAD_ALG, key).map_err(|_| CryptoError::AuthenticationFailed)?;
    let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(*nonce));

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let result = plaintext.to_vec();
    tracing::trace!(
        ciphertext_len = ciphertext.len(),
        plaintext_len = result.len(),
        "decrypted data"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
