//! The Envelope Codec: hybrid encryption binding a payload to the vault key.
//!
//! A fresh ephemeral keypair agrees with the recipient's public key over
//! ECDH; the shared secret is stretched with HKDF-SHA256 into an AES-256-GCM
//! key that encrypts the payload. The wire format is a small self-describing
//! binary blob (not text-armored — the HTTP layer already base64-wraps the
//! whole thing, see spec §6):
//!
//! ```text
//! "TRX1" (4 bytes magic)
//! alg tag (1 byte: 0 = x25519, 1 = p256)
//! ephemeral public key (32 or 33 bytes, per alg)
//! nonce (12 bytes)
//! ciphertext || 16-byte AEAD tag
//! ```
//!
//! The header (magic, alg tag, ephemeral public key, nonce) is passed to the
//! AEAD as associated data rather than matched against expected values
//! up front. That means tampering with a header byte doesn't short-circuit
//! into a format error — it flows into the same authentication check as
//! ciphertext tampering, so every single-bit perturbation of an envelope
//! produced by [`encrypt`] surfaces as `AuthenticationFailed`, never a
//! silently-accepted different algorithm or key.

use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

use crate::vault::{KeyAlgorithm, PublicKey, VaultError, VaultKeypair};

const MAGIC: &[u8; 4] = b"TRX1";
const HKDF_INFO: &[u8] = b"TEEREX-ENVELOPE-V1";

fn alg_tag_byte(alg: KeyAlgorithm) -> u8 {
    match alg {
        KeyAlgorithm::X25519 => 0,
        KeyAlgorithm::P256 => 1,
    }
}

fn derive_aead_key(shared_secret: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// Encrypt `plaintext` so that only the holder of `recipient`'s private key
/// can decrypt it.
pub fn encrypt(plaintext: &[u8], recipient: &PublicKey) -> Vec<u8> {
    let ephemeral = VaultKeypair::generate(recipient.alg);
    let shared = ephemeral
        .agree(&recipient.raw)
        .expect("freshly generated ephemeral key always agrees");
    let aead_key = derive_aead_key(&shared);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .expect("system RNG is available");

    let mut header = Vec::with_capacity(MAGIC.len() + 1 + ephemeral.public_key().raw.len() + NONCE_LEN);
    header.extend_from_slice(MAGIC);
    header.push(alg_tag_byte(recipient.alg));
    header.extend_from_slice(&ephemeral.public_key().raw);
    header.extend_from_slice(&nonce_bytes);

    let key = LessSafeKey::new(
        UnboundKey::new(&AES_256_GCM, &aead_key)
            .expect("AES_256_GCM key is always 32 bytes"),
    );
    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::from(&header),
        &mut in_out,
    )
    .expect("sealing never fails");

    let mut out = header;
    out.extend_from_slice(&in_out);
    out
}

/// Decrypt an envelope produced by [`encrypt`] using `vault`'s private key.
/// Any tampered byte (including a bit-flip anywhere in the envelope) causes
/// `AuthenticationFailed`, never a panic.
pub fn decrypt(envelope: &[u8], vault: &VaultKeypair) -> Result<Vec<u8>, VaultError> {
    // The header length is fixed by the vault's own algorithm, not by the
    // (untrusted, AAD-only) tag byte embedded in the envelope.
    let pubkey_len = vault.algorithm().public_key_len();
    let header_len = MAGIC.len() + 1 + pubkey_len + NONCE_LEN;
    if envelope.len() < header_len {
        return Err(VaultError::MalformedEnvelope);
    }
    let (header, ciphertext) = envelope.split_at(header_len);
    let ephemeral_pub = &header[MAGIC.len() + 1..MAGIC.len() + 1 + pubkey_len];
    let nonce_bytes = &header[header_len - NONCE_LEN..header_len];

    let shared = vault.agree(ephemeral_pub)?;
    let aead_key = derive_aead_key(&shared);
    let key = LessSafeKey::new(
        UnboundKey::new(&AES_256_GCM, &aead_key)
            .expect("AES_256_GCM key is always 32 bytes"),
    );

    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| VaultError::MalformedEnvelope)?;
    let mut in_out = ciphertext.to_vec();
    let plaintext_len = key
        .open_in_place(nonce, Aad::from(header), &mut in_out)
        .map_err(|_| VaultError::AuthenticationFailed)?
        .len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn roundtrips_for_both_algorithms() {
        for alg in KeyAlgorithm::ALL {
            let vault = VaultKeypair::generate(alg);
            let envelope = encrypt(b"hello prover", vault.public_key());
            let plaintext = decrypt(&envelope, &vault).unwrap();
            assert_eq!(plaintext, b"hello prover");
        }
    }

    #[test]
    fn tampered_byte_fails_authentication() {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let mut envelope = encrypt(b"abc", vault.public_key());
        let last = envelope.len() - 1;
        envelope[last] ^= 0x01;
        assert_eq!(
            decrypt(&envelope, &vault).unwrap_err(),
            VaultError::AuthenticationFailed
        );
    }

    #[test]
    fn wrong_vault_fails_authentication_or_is_malformed() {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let other = VaultKeypair::generate(KeyAlgorithm::X25519);
        let envelope = encrypt(b"abc", vault.public_key());
        assert!(decrypt(&envelope, &other).is_err());
    }

    proptest! {
        // (P1) Decrypt(Encrypt(P)) == P for arbitrary plaintexts.
        #[test]
        fn p1_decrypt_of_encrypt_is_identity(plaintext in proptest::collection::vec(any::<u8>(), 0..512)) {
            let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
            let envelope = encrypt(&plaintext, vault.public_key());
            let decrypted = decrypt(&envelope, &vault).unwrap();
            prop_assert_eq!(decrypted, plaintext);
        }

        // (P2) Every single-bit perturbation of an envelope fails auth.
        #[test]
        fn p2_bit_flip_fails_authentication(
            plaintext in proptest::collection::vec(any::<u8>(), 1..64),
            byte_idx in 0usize..64,
            bit_idx in 0u8..8,
        ) {
            let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
            let mut envelope = encrypt(&plaintext, vault.public_key());
            let idx = byte_idx % envelope.len();
            envelope[idx] ^= 1 << bit_idx;
            prop_assert_eq!(
                decrypt(&envelope, &vault).unwrap_err(),
                VaultError::AuthenticationFailed
            );
        }
    }
}
