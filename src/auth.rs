//! Relay identity: the Ed25519 key pair the bridge proves ownership of during
//! the handshake.

use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};

use crate::config::{ConfigError, IdentityConfig};

/// Signing capability bound to one fixed key pair.
pub trait Signer: Send + Sync {
    /// Raw public key bytes sent to the relay.
    fn public_key(&self) -> Vec<u8>;

    /// Signature of `message` under the private key matching [`Signer::public_key`].
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Ed25519 identity loaded from hex-encoded key material.
pub struct Ed25519Identity {
    signing_key: SigningKey,
}

impl Ed25519Identity {
    /// Build an identity from the configured hex keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Key`] when either key is not 32 bytes of hex, or
    /// when the public key does not belong to the private key.
    pub fn from_config(identity: &IdentityConfig) -> Result<Self, ConfigError> {
        let private_key = decode_key("identity.private_key", &identity.private_key)?;
        let public_key = decode_key("identity.public_key", &identity.public_key)?;

        let signing_key = SigningKey::from_bytes(&private_key);
        let expected = VerifyingKey::from_bytes(&public_key)
            .map_err(|e| ConfigError::Key(format!("identity.public_key is not a valid point: {e}")))?;
        if signing_key.verifying_key() != expected {
            return Err(ConfigError::Key(
                "Private key does not match public key".to_string(),
            ));
        }

        Ok(Self { signing_key })
    }

    /// Generate a fresh identity from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    #[must_use]
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Signer for Ed25519Identity {
    fn public_key(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

fn decode_key(field: &str, value: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(value.trim())
        .map_err(|e| ConfigError::Key(format!("{field} is not valid hex: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        ConfigError::Key(format!(
            "{field} must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    #[test]
    fn test_generated_identity_round_trips_through_config() {
        let generated = Ed25519Identity::generate();
        let config = IdentityConfig {
            public_key: generated.public_key_hex(),
            private_key: generated.private_key_hex(),
        };
        let loaded = Ed25519Identity::from_config(&config).unwrap();
        assert_eq!(loaded.public_key(), generated.public_key());
    }

    #[test]
    fn test_signature_verifies_under_public_key() {
        let identity = Ed25519Identity::generate();
        let signature = identity.sign(b"nonce-1");

        let public: [u8; 32] = identity.public_key().try_into().unwrap();
        let verifying = VerifyingKey::from_bytes(&public).unwrap();
        let signature = Signature::from_slice(&signature).unwrap();
        assert!(verifying.verify(b"nonce-1", &signature).is_ok());
        assert!(verifying.verify(b"nonce-2", &signature).is_err());
    }

    #[test]
    fn test_mismatched_keys_are_rejected() {
        let a = Ed25519Identity::generate();
        let b = Ed25519Identity::generate();
        let config = IdentityConfig {
            public_key: b.public_key_hex(),
            private_key: a.private_key_hex(),
        };
        let err = Ed25519Identity::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_short_key_is_rejected() {
        let config = IdentityConfig {
            public_key: "abcd".to_string(),
            private_key: "00".repeat(32),
        };
        let err = Ed25519Identity::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("32 bytes"));
    }
}
