// dmh-core/src/core/envelope.rs
// ============================================================================
// Module: Crypto Envelope
// Description: Per-action public-key envelope over X25519 HPKE.
// Purpose: Seal action payloads so only the matching private key opens them.
// Dependencies: base64, hpke, rand, zeroize
// ============================================================================

//! ## Overview
//! Every action gets a fresh keypair. The public half seals the action
//! payload into a ciphertext that is safe to persist and publish; the private
//! half travels to the keeper once and comes back only after the release
//! gate opens. Encryption uses HPKE base mode with the X25519-HKDF-SHA256
//! KEM, HKDF-SHA256, and ChaCha20-Poly1305, so every call produces a fresh
//! encapsulation and identical plaintexts yield different ciphertexts.
//! Decryption fails closed on any modification of the ciphertext.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hpke::Deserializable;
use hpke::Kem;
use hpke::OpModeR;
use hpke::OpModeS;
use hpke::Serializable;
use hpke::aead::ChaCha20Poly1305;
use hpke::kdf::HkdfSha256;
use hpke::kem::X25519HkdfSha256;
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

// ============================================================================
// SECTION: Scheme Constants
// ============================================================================

/// Scheme tag recorded in encryption metadata.
pub const ENCRYPTION_KIND: &str = "X25519";

/// HPKE info string binding ciphertexts to this envelope version.
const ENVELOPE_INFO: &[u8] = b"dmh.envelope.v1";

type KemAlg = X25519HkdfSha256;
type KdfAlg = HkdfSha256;
type AeadAlg = ChaCha20Poly1305;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Envelope operation errors.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Empty plaintext or ciphertext input.
    #[error("empty data")]
    EmptyData,
    /// Private key material failed to parse.
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    /// Sealing failed.
    #[error("encrypt failure: {0}")]
    Encrypt(String),
    /// Opening failed: tampered ciphertext, wrong key, or bad framing.
    #[error("decrypt failure: {0}")]
    Decrypt(String),
}

// ============================================================================
// SECTION: Identity and Recipient
// ============================================================================

/// Private half of an envelope keypair.
pub struct EnvelopeIdentity {
    /// X25519 KEM private key.
    secret: <KemAlg as Kem>::PrivateKey,
}

impl fmt::Debug for EnvelopeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeIdentity").field("secret", &"<redacted>").finish()
    }
}

/// Public half of an envelope keypair.
#[derive(Clone)]
pub struct EnvelopeRecipient {
    /// X25519 KEM public key.
    public: <KemAlg as Kem>::PublicKey,
}

impl fmt::Debug for EnvelopeRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeRecipient").finish_non_exhaustive()
    }
}

impl EnvelopeIdentity {
    /// Generates a fresh keypair from the system CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let (secret, _public) = KemAlg::gen_keypair(&mut OsRng);
        Self {
            secret,
        }
    }

    /// Parses the serialized private-key form produced by
    /// [`EnvelopeIdentity::encoded_private_key`].
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidKey`] when the encoding or the key
    /// bytes are malformed.
    pub fn parse(encoded: &str) -> Result<Self, EnvelopeError> {
        if encoded.is_empty() {
            return Err(EnvelopeError::InvalidKey("empty key".to_string()));
        }
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded)
                .map_err(|err| EnvelopeError::InvalidKey(err.to_string()))?,
        );
        let secret = <KemAlg as Kem>::PrivateKey::from_bytes(&bytes)
            .map_err(|err| EnvelopeError::InvalidKey(err.to_string()))?;
        Ok(Self {
            secret,
        })
    }

    /// Derives the public recipient for this identity.
    #[must_use]
    pub fn recipient(&self) -> EnvelopeRecipient {
        EnvelopeRecipient {
            public: KemAlg::sk_to_pk(&self.secret),
        }
    }

    /// Returns the serialized private-key form handed to the keeper.
    ///
    /// The buffer zeroizes on drop; callers must not copy it into
    /// longer-lived storage.
    #[must_use]
    pub fn encoded_private_key(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.secret.to_bytes().to_vec());
        Zeroizing::new(STANDARD.encode(bytes.as_slice()))
    }
}

// ============================================================================
// SECTION: Seal and Open
// ============================================================================

/// Seals a non-empty plaintext for the recipient.
///
/// The result is `base64(len(encapped) ‖ encapped ‖ ciphertext)` with a
/// little-endian u32 length prefix.
///
/// # Errors
///
/// Returns [`EnvelopeError::EmptyData`] for empty plaintext and
/// [`EnvelopeError::Encrypt`] when HPKE setup or sealing fails.
pub fn encrypt(recipient: &EnvelopeRecipient, plaintext: &str) -> Result<String, EnvelopeError> {
    if plaintext.is_empty() {
        return Err(EnvelopeError::EmptyData);
    }
    let (encapped, mut ctx) = hpke::setup_sender::<AeadAlg, KdfAlg, KemAlg, _>(
        &OpModeS::Base,
        &recipient.public,
        ENVELOPE_INFO,
        &mut OsRng,
    )
    .map_err(|err| EnvelopeError::Encrypt(err.to_string()))?;
    let sealed = ctx
        .seal(plaintext.as_bytes(), b"")
        .map_err(|err| EnvelopeError::Encrypt(err.to_string()))?;

    let encapped_bytes = encapped.to_bytes();
    let encapped_len = u32::try_from(encapped_bytes.len())
        .map_err(|_| EnvelopeError::Encrypt("encapsulated key too large".to_string()))?;
    let mut framed = Vec::with_capacity(4 + encapped_bytes.len() + sealed.len());
    framed.extend_from_slice(&encapped_len.to_le_bytes());
    framed.extend_from_slice(&encapped_bytes);
    framed.extend_from_slice(&sealed);
    Ok(STANDARD.encode(framed))
}

/// Opens a sealed payload with the matching identity.
///
/// # Errors
///
/// Returns [`EnvelopeError::EmptyData`] for empty input and
/// [`EnvelopeError::Decrypt`] for malformed base64, truncated framing,
/// tampered ciphertext, or a non-matching key.
pub fn decrypt(identity: &EnvelopeIdentity, encoded: &str) -> Result<String, EnvelopeError> {
    if encoded.is_empty() {
        return Err(EnvelopeError::EmptyData);
    }
    let framed =
        STANDARD.decode(encoded).map_err(|err| EnvelopeError::Decrypt(err.to_string()))?;
    if framed.len() < 4 {
        return Err(EnvelopeError::Decrypt("truncated framing".to_string()));
    }
    let encapped_len = u32::from_le_bytes([framed[0], framed[1], framed[2], framed[3]]) as usize;
    if framed.len() - 4 < encapped_len {
        return Err(EnvelopeError::Decrypt("truncated encapsulated key".to_string()));
    }
    let encapped = <KemAlg as Kem>::EncappedKey::from_bytes(&framed[4..4 + encapped_len])
        .map_err(|err| EnvelopeError::Decrypt(err.to_string()))?;
    let mut ctx = hpke::setup_receiver::<AeadAlg, KdfAlg, KemAlg>(
        &OpModeR::Base,
        &identity.secret,
        &encapped,
        ENVELOPE_INFO,
    )
    .map_err(|err| EnvelopeError::Decrypt(err.to_string()))?;
    let opened = ctx
        .open(&framed[4 + encapped_len..], b"")
        .map_err(|err| EnvelopeError::Decrypt(err.to_string()))?;
    String::from_utf8(opened)
        .map_err(|_| EnvelopeError::Decrypt("plaintext is not valid utf-8".to_string()))
}
