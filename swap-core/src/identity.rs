//! Nonce/IdentityService (§2, 4%): signs outward `/info` envelopes with a
//! chain-native private key so clients can authenticate the LP.

use rand::RngCore;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::Serialize;
use sha2::{Digest, Sha256};

fn digest_json<T: Serialize>(value: &T) -> Result<[u8; 32], serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    Ok(Sha256::digest(&bytes).into())
}

/// A fresh 32-byte value a client attaches to an `/info` request so the
/// signed response can't be replayed across requests.
pub fn generate_nonce() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Signs arbitrary JSON-serializable envelopes with the LP's identity
/// key, so `IntermediaryDiscovery` (§4.7) can verify responses came from
/// the claimed address.
pub struct IdentityService {
    secret_key: SecretKey,
    public_key: PublicKey,
    secp: Secp256k1<secp256k1::All>,
}

impl IdentityService {
    pub fn new(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
            secp,
        }
    }

    pub fn address(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Signs the canonical JSON encoding of `envelope`, returning a
    /// hex-encoded DER signature.
    pub fn sign_envelope<T: Serialize>(&self, envelope: &T) -> Result<String, serde_json::Error> {
        let digest = digest_json(envelope)?;
        let message = Message::from_digest(digest);
        let sig = self.secp.sign_ecdsa(&message, &self.secret_key);
        Ok(hex::encode(sig.serialize_der()))
    }

    /// Verifies a signature produced by [`Self::sign_envelope`] against a
    /// known public key, for client-side mirrors (§4.7).
    pub fn verify_envelope<T: Serialize>(
        public_key: &PublicKey,
        envelope: &T,
        signature_hex: &str,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        let secp = Secp256k1::verification_only();
        let digest = digest_json(envelope)?;
        let message = Message::from_digest(digest);
        let sig_bytes = hex::decode(signature_hex)?;
        let sig = secp256k1::ecdsa::Signature::from_der(&sig_bytes)?;
        Ok(secp.verify_ecdsa(&message, &sig, public_key).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Envelope {
        nonce: String,
    }

    #[test]
    fn sign_then_verify_roundtrips() {
        let secp = Secp256k1::new();
        let (sk, _) = secp.generate_keypair(&mut rand::thread_rng());
        let svc = IdentityService::new(sk);
        let envelope = Envelope {
            nonce: hex::encode(generate_nonce()),
        };
        let sig = svc.sign_envelope(&envelope).unwrap();
        assert!(IdentityService::verify_envelope(&svc.public_key, &envelope, &sig).unwrap());
    }

    #[test]
    fn tampered_envelope_fails_verification() {
        let secp = Secp256k1::new();
        let (sk, _) = secp.generate_keypair(&mut rand::thread_rng());
        let svc = IdentityService::new(sk);
        let envelope = Envelope {
            nonce: "aa".repeat(32),
        };
        let sig = svc.sign_envelope(&envelope).unwrap();
        let tampered = Envelope {
            nonce: "bb".repeat(32),
        };
        assert!(!IdentityService::verify_envelope(&svc.public_key, &tampered, &sig).unwrap());
    }

    #[test]
    fn nonce_is_32_bytes_and_varies() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
