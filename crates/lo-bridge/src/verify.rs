//! Ed25519 verification of inbound interaction payloads.
//!
//! The chat platform signs `timestamp || raw_body` with its Ed25519 key
//! and sends the signature and timestamp as headers. Verification runs on
//! the raw bytes before any parsing; a failure rejects the request before
//! handler logic can touch it.

use ring::signature::{UnparsedPublicKey, ED25519};

/// Header carrying the hex-encoded Ed25519 signature.
pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
/// Header carrying the timestamp that prefixes the signed message.
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),

    #[error("malformed signature encoding")]
    MalformedSignature,

    #[error("malformed public key")]
    MalformedKey,

    #[error("signature verification failed")]
    InvalidSignature,
}

// ---------------------------------------------------------------------------
// InteractionVerifier
// ---------------------------------------------------------------------------

/// Verifies inbound payload signatures against the platform's public key.
#[derive(Debug, Clone)]
pub struct InteractionVerifier {
    public_key: Vec<u8>,
}

impl InteractionVerifier {
    /// Build a verifier from a 32-byte hex-encoded Ed25519 public key.
    pub fn from_hex(key_hex: &str) -> Result<Self, VerifyError> {
        let public_key = hex::decode(key_hex).ok_or(VerifyError::MalformedKey)?;
        if public_key.len() != 32 {
            return Err(VerifyError::MalformedKey);
        }
        Ok(Self { public_key })
    }

    /// Verify `signature_hex` over `timestamp || body`.
    pub fn verify(
        &self,
        timestamp: &str,
        body: &[u8],
        signature_hex: &str,
    ) -> Result<(), VerifyError> {
        let signature = hex::decode(signature_hex).ok_or(VerifyError::MalformedSignature)?;

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        UnparsedPublicKey::new(&ED25519, &self.public_key)
            .verify(&message, &signature)
            .map_err(|_| VerifyError::InvalidSignature)
    }
}

// ---------------------------------------------------------------------------
// hex decoding (minimal, avoids adding the `hex` crate for one header)
// ---------------------------------------------------------------------------

mod hex {
    pub fn decode(input: &str) -> Option<Vec<u8>> {
        if input.len() % 2 != 0 {
            return None;
        }
        let mut out = Vec::with_capacity(input.len() / 2);
        let bytes = input.as_bytes();
        for pair in bytes.chunks_exact(2) {
            let high = nibble(pair[0])?;
            let low = nibble(pair[1])?;
            out.push((high << 4) | low);
        }
        Some(out)
    }

    fn nibble(c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    fn hex_encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn keypair() -> Ed25519KeyPair {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).expect("keygen");
        Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).expect("parse key")
    }

    #[test]
    fn valid_signature_verifies() {
        let kp = keypair();
        let verifier = InteractionVerifier::from_hex(&hex_encode(kp.public_key().as_ref())).unwrap();

        let timestamp = "1754500000";
        let body = br#"{"type":"ping"}"#;
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        let signature = hex_encode(kp.sign(&message).as_ref());

        assert!(verifier.verify(timestamp, body, &signature).is_ok());
    }

    #[test]
    fn tampered_body_fails() {
        let kp = keypair();
        let verifier = InteractionVerifier::from_hex(&hex_encode(kp.public_key().as_ref())).unwrap();

        let timestamp = "1754500000";
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(br#"{"type":"ping"}"#);
        let signature = hex_encode(kp.sign(&message).as_ref());

        let err = verifier
            .verify(timestamp, br#"{"type":"command"}"#, &signature)
            .unwrap_err();
        assert_eq!(err, VerifyError::InvalidSignature);
    }

    #[test]
    fn wrong_timestamp_fails() {
        let kp = keypair();
        let verifier = InteractionVerifier::from_hex(&hex_encode(kp.public_key().as_ref())).unwrap();

        let body = br#"{"type":"ping"}"#;
        let mut message = b"1754500000".to_vec();
        message.extend_from_slice(body);
        let signature = hex_encode(kp.sign(&message).as_ref());

        assert!(verifier.verify("1754500001", body, &signature).is_err());
    }

    #[test]
    fn malformed_inputs_rejected() {
        assert_eq!(
            InteractionVerifier::from_hex("zz").unwrap_err(),
            VerifyError::MalformedKey
        );
        assert_eq!(
            InteractionVerifier::from_hex("abcd").unwrap_err(),
            VerifyError::MalformedKey
        );

        let kp = keypair();
        let verifier = InteractionVerifier::from_hex(&hex_encode(kp.public_key().as_ref())).unwrap();
        assert_eq!(
            verifier.verify("t", b"body", "not-hex!").unwrap_err(),
            VerifyError::MalformedSignature
        );
    }

    #[test]
    fn hex_decode_roundtrip() {
        assert_eq!(hex::decode("ff00ab"), Some(vec![0xff, 0x00, 0xab]));
        assert_eq!(hex::decode("FF00AB"), Some(vec![0xff, 0x00, 0xab]));
        assert_eq!(hex::decode("abc"), None);
        assert_eq!(hex::decode("zz"), None);
    }
}
