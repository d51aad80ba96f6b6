//! The Key Vault: the single per-enclave asymmetric keypair.
//!
//! Exactly one [`VaultKeypair`] exists per running process. It is generated
//! once at startup from the system RNG, never persisted, and its private
//! half never crosses this struct's API (I1). `Decrypt` is `&self`, not
//! `&mut self`, so a single vault can serve concurrent requests (C3) without
//! an external mutex; `ring`'s `LessSafeKey` is safe to use from multiple
//! threads.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::armor;

/// The elliptic curve backing a [`VaultKeypair`]. Curve25519 is preferred;
/// P-256 is the required fallback where the platform's crypto library lacks
/// Curve25519 (spec §4.1).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyAlgorithm {
    X25519,
    P256,
}

impl KeyAlgorithm {
    pub const ALL: [KeyAlgorithm; 2] = [KeyAlgorithm::X25519, KeyAlgorithm::P256];

    pub(crate) fn tag(self) -> &'static str {
        match self {
            Self::X25519 => "x25519",
            Self::P256 => "p256",
        }
    }

    pub(crate) fn public_key_len(self) -> usize {
        match self {
            Self::X25519 => 32,
            // SEC1 compressed point
            Self::P256 => 33,
        }
    }
}

enum SecretKey {
    X25519(x25519_dalek::StaticSecret),
    P256(p256::SecretKey),
}

/// The vault's public half, in its interoperable armored text form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKey {
    pub alg: KeyAlgorithm,
    pub raw: Vec<u8>,
}

impl PublicKey {
    pub fn armored(&self) -> String {
        armor::encode(self.alg, &self.raw)
    }

    pub fn from_armored(armored: &str) -> Result<Self, armor::ArmorError> {
        let (alg, raw) = armor::decode(armored)?;
        Ok(Self { alg, raw })
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum VaultError {
    #[error("envelope is malformed")]
    MalformedEnvelope,
    #[error("envelope authentication failed")]
    AuthenticationFailed,
}

/// The enclave's single long-lived asymmetric keypair.
pub struct VaultKeypair {
    alg: KeyAlgorithm,
    secret: SecretKey,
    public: PublicKey,
}

impl VaultKeypair {
    /// Generate a fresh keypair from the system hardware RNG. Called once,
    /// in-process, before the Attestation Provider is queried.
    pub fn generate(alg: KeyAlgorithm) -> Self {
        match alg {
            KeyAlgorithm::X25519 => {
                let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
                let public_raw = x25519_dalek::PublicKey::from(&secret);
                Self {
                    alg,
                    secret: SecretKey::X25519(secret),
                    public: PublicKey {
                        alg,
                        raw: public_raw.as_bytes().to_vec(),
                    },
                }
            }
            KeyAlgorithm::P256 => {
                let secret = p256::SecretKey::random(&mut OsRng);
                let public_raw = secret
                    .public_key()
                    .to_encoded_point(true)
                    .as_bytes()
                    .to_vec();
                Self {
                    alg,
                    secret: SecretKey::P256(secret),
                    public: PublicKey {
                        alg,
                        raw: public_raw,
                    },
                }
            }
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.alg
    }

    /// The armored public half. Safe to share freely; never reveals the
    /// private half (I1).
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Perform the asymmetric half of hybrid decryption: given the sender's
    /// ephemeral public key, derive the shared secret this vault's private
    /// key agrees on.
    pub(crate) fn agree(
        &self,
        their_public_raw: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        match &self.secret {
            SecretKey::X25519(secret) => {
                let arr: [u8; 32] = their_public_raw
                    .try_into()
                    .map_err(|_| VaultError::MalformedEnvelope)?;
                let their_public = x25519_dalek::PublicKey::from(arr);
                let shared = secret.diffie_hellman(&their_public);
                Ok(Zeroizing::new(shared.as_bytes().to_vec()))
            }
            SecretKey::P256(secret) => {
                let their_public =
                    p256::PublicKey::from_sec1_bytes(their_public_raw)
                        .map_err(|_| VaultError::MalformedEnvelope)?;
                let shared = p256::ecdh::diffie_hellman(
                    secret.to_nonzero_scalar(),
                    their_public.as_affine(),
                );
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn public_key_roundtrips_through_armor() {
        for alg in KeyAlgorithm::ALL {
            let vault = VaultKeypair::generate(alg);
            let armored = vault.public_key().armored();
            let decoded = PublicKey::from_armored(&armored).unwrap();
            assert_eq!(decoded, *vault.public_key());
        }
    }

    #[test]
    fn agree_is_symmetric_for_x25519() {
        let alice = VaultKeypair::generate(KeyAlgorithm::X25519);
        let bob = VaultKeypair::generate(KeyAlgorithm::X25519);
        let a_shared = alice.agree(&bob.public_key().raw).unwrap();
        let b_shared = bob.agree(&alice.public_key().raw).unwrap();
        assert_eq!(*a_shared, *b_shared);
    }
}
