// dmh-core/tests/envelope.rs
// ============================================================================
// Module: Envelope Tests
// Description: Round-trip, semantic-security, and fail-closed checks.
// ============================================================================
//! ## Overview
//! Validates the per-action crypto envelope contract.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dmh_core::core::envelope;
use dmh_core::core::envelope::EnvelopeError;
use dmh_core::core::envelope::EnvelopeIdentity;

#[test]
fn round_trip_recovers_plaintext() {
    let identity = EnvelopeIdentity::generate();
    let plaintext = r#"{"url":"http://h/x","data":{"k":"v"},"success_code":[200]}"#;
    let sealed = envelope::encrypt(&identity.recipient(), plaintext).unwrap();
    let opened = envelope::decrypt(&identity, &sealed).unwrap();
    assert_eq!(opened, plaintext);
}

#[test]
fn identical_plaintexts_produce_distinct_ciphertexts() {
    let identity = EnvelopeIdentity::generate();
    let first = envelope::encrypt(&identity.recipient(), "payload").unwrap();
    let second = envelope::encrypt(&identity.recipient(), "payload").unwrap();
    assert_ne!(first, second);
}

#[test]
fn empty_plaintext_is_rejected() {
    let identity = EnvelopeIdentity::generate();
    let result = envelope::encrypt(&identity.recipient(), "");
    assert!(matches!(result, Err(EnvelopeError::EmptyData)));
}

#[test]
fn empty_ciphertext_is_rejected() {
    let identity = EnvelopeIdentity::generate();
    let result = envelope::decrypt(&identity, "");
    assert!(matches!(result, Err(EnvelopeError::EmptyData)));
}

#[test]
fn single_bit_flip_fails_closed() {
    let identity = EnvelopeIdentity::generate();
    let sealed = envelope::encrypt(&identity.recipient(), "tamper me").unwrap();
    let mut raw = STANDARD.decode(&sealed).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    let tampered = STANDARD.encode(raw);
    assert!(envelope::decrypt(&identity, &tampered).is_err());
}

#[test]
fn wrong_identity_fails_closed() {
    let sender_target = EnvelopeIdentity::generate();
    let other = EnvelopeIdentity::generate();
    let sealed = envelope::encrypt(&sender_target.recipient(), "for one key only").unwrap();
    assert!(envelope::decrypt(&other, &sealed).is_err());
}

#[test]
fn malformed_base64_fails_closed() {
    let identity = EnvelopeIdentity::generate();
    assert!(envelope::decrypt(&identity, "%%% not base64 %%%").is_err());
}

#[test]
fn truncated_framing_fails_closed() {
    let identity = EnvelopeIdentity::generate();
    let truncated = STANDARD.encode([0x20, 0x00]);
    assert!(envelope::decrypt(&identity, &truncated).is_err());
}

#[test]
fn serialized_private_key_parses_back() {
    let identity = EnvelopeIdentity::generate();
    let sealed = envelope::encrypt(&identity.recipient(), "portable key").unwrap();

    let encoded = identity.encoded_private_key();
    let restored = EnvelopeIdentity::parse(&encoded).unwrap();
    assert_eq!(envelope::decrypt(&restored, &sealed).unwrap(), "portable key");
}

#[test]
fn invalid_private_key_is_rejected() {
    assert!(EnvelopeIdentity::parse("").is_err());
    assert!(EnvelopeIdentity::parse("not base64 !!!").is_err());
    let short = STANDARD.encode([1u8, 2, 3]);
    assert!(EnvelopeIdentity::parse(&short).is_err());
}
