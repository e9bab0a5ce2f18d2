//! Session cryptography.
//!
//! The wallet speaks NaCl `box`: an X25519 key agreement whose output is run
//! through HSalsa20 (`box.before`), and XSalsa20-Poly1305 authenticated
//! encryption under that precomputed key (`box.after` / `box.open.after`).
//! This module reproduces those primitives so that the derived shared secret is
//! byte-compatible with the wallet's.
//!
//! # Security Properties
//!
//! - **Key agreement**: symmetric; either side computes the same secret
//! - **Integrity**: Poly1305 tag, decryption fails closed on any tampering
//! - **Nonces**: 24 random bytes per message, generated at send time
//! - **Hygiene**: private keys and shared secrets are zeroized on drop and
//!   redacted from `Debug` output

use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use rand::RngCore;
use salsa20::cipher::{consts::U10, generic_array::GenericArray};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::codec;

/// Size of public keys, private keys, and shared secrets.
pub const KEY_SIZE: usize = 32;

/// Size of an XSalsa20 nonce.
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag.
pub const TAG_SIZE: usize = 16;

/// Crypto error types.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptFailed,
    #[error("decryption failed: authentication failed")]
    DecryptFailed,
    #[error("peer public key is a low-order point")]
    NonContributory,
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Hex form used for `dappEncryptionPublicKey`.
    pub fn to_hex(&self) -> String {
        codec::to_hex(&self.0)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// X25519 private key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Compute the public key belonging to this private key.
    pub fn public_key(&self) -> PublicKey {
        let secret = x25519_dalek::StaticSecret::from(self.0);
        PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Symmetric key derived from the key agreement.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; KEY_SIZE]);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Single-use message nonce.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Draw a fresh random nonce.
    ///
    /// Call this at send time for every message; a nonce must never be reused
    /// under the same shared secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        codec::to_hex(&self.0)
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({})", self.to_hex())
    }
}

/// An ephemeral session keypair.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

/// Generate a fresh X25519 keypair from the OS random source.
pub fn generate_keypair() -> KeyPair {
    let secret = x25519_dalek::StaticSecret::random_from_rng(rand::rngs::OsRng);
    let public = x25519_dalek::PublicKey::from(&secret);
    KeyPair {
        public: PublicKey(public.to_bytes()),
        secret: SecretKey(secret.to_bytes()),
    }
}

/// Derive the shared secret from the peer's public key and our private key.
///
/// Equivalent to NaCl `crypto_box_beforenm`: the raw X25519 output is never
/// used directly as a key, it is first passed through HSalsa20 with a zero
/// input block.
pub fn derive_shared_secret(
    peer_public: &PublicKey,
    local_secret: &SecretKey,
) -> CryptoResult<SharedSecret> {
    let secret = x25519_dalek::StaticSecret::from(local_secret.0);
    let dh = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer_public.0));
    if !dh.was_contributory() {
        return Err(CryptoError::NonContributory);
    }

    let mut key = salsa20::hsalsa::<U10>(
        GenericArray::from_slice(dh.as_bytes().as_slice()),
        &GenericArray::default(),
    );
    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&key);
    key.as_mut_slice().zeroize();
    Ok(SharedSecret(out))
}

/// Encrypt `plaintext` under the shared secret (`box.after`).
///
/// The output is `ciphertext || tag`, i.e. `plaintext.len() + TAG_SIZE` bytes.
pub fn encrypt(plaintext: &[u8], nonce: &Nonce, shared: &SharedSecret) -> CryptoResult<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(crypto_secretbox::Key::from_slice(&shared.0[..]));
    cipher
        .encrypt(crypto_secretbox::Nonce::from_slice(&nonce.0[..]), plaintext)
        .map_err(|_| CryptoError::EncryptFailed)
}

/// Decrypt and authenticate `ciphertext` (`box.open.after`).
///
/// Fails if the ciphertext, nonce, or key has been altered.
pub fn decrypt(ciphertext: &[u8], nonce: &Nonce, shared: &SharedSecret) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::DecryptFailed);
    }
    let cipher = XSalsa20Poly1305::new(crypto_secretbox::Key::from_slice(&shared.0[..]));
    cipher
        .decrypt(crypto_secretbox::Nonce::from_slice(&nonce.0[..]), ciphertext)
        .map_err(|_| CryptoError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key_from_hex(text: &str) -> [u8; 32] {
        codec::decode_key_hex(text).unwrap()
    }

    #[test]
    fn test_shared_secret_is_symmetric() {
        let alice = generate_keypair();
        let bob = generate_keypair();

        let ab = derive_shared_secret(&bob.public, &alice.secret).unwrap();
        let ba = derive_shared_secret(&alice.public, &bob.secret).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_matches_nacl_beforenm_vector() {
        // RFC 7748 keys; expected value is NaCl's crypto_box_beforenm output.
        let alice_sk = SecretKey::from_bytes(key_from_hex(
            "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a",
        ));
        let bob_pk = PublicKey::from_bytes(key_from_hex(
            "de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f",
        ));

        let shared = derive_shared_secret(&bob_pk, &alice_sk).unwrap();
        assert_eq!(
            codec::to_hex(shared.as_bytes()),
            "1b27556473e985d462cd51197a9a46c76009549eac6474f206c4ee0844f68389"
        );
    }

    #[test]
    fn test_public_key_from_secret() {
        let pair = generate_keypair();
        assert_eq!(pair.secret.public_key(), pair.public);
    }

    #[test]
    fn test_low_order_peer_key_rejected() {
        let pair = generate_keypair();
        let zero = PublicKey::from_bytes([0u8; 32]);
        assert!(matches!(
            derive_shared_secret(&zero, &pair.secret),
            Err(CryptoError::NonContributory)
        ));
    }

    #[test]
    fn test_ciphertext_length() {
        let shared = SharedSecret::from_bytes([3u8; 32]);
        let ct = encrypt(b"test", &Nonce::generate(), &shared).unwrap();
        assert_eq!(ct.len(), 4 + TAG_SIZE);
    }

    #[test]
    fn test_tampering_detected() {
        let shared = SharedSecret::from_bytes([9u8; 32]);
        let nonce = Nonce::generate();
        let ct = encrypt(b"transfer 1 APT", &nonce, &shared).unwrap();

        let mut bad_ct = ct.clone();
        bad_ct[0] ^= 1;
        assert!(decrypt(&bad_ct, &nonce, &shared).is_err());

        let mut nonce_bytes = *nonce.as_bytes();
        nonce_bytes[5] ^= 0x80;
        assert!(decrypt(&ct, &Nonce::from_bytes(nonce_bytes), &shared).is_err());

        let other = SharedSecret::from_bytes([10u8; 32]);
        assert!(decrypt(&ct, &nonce, &other).is_err());

        assert!(decrypt(&ct[..TAG_SIZE - 1], &nonce, &shared).is_err());
    }

    #[test]
    fn test_nonces_are_fresh() {
        assert_ne!(Nonce::generate(), Nonce::generate());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let pair = generate_keypair();
        let rendered = format!("{:?}", pair);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&codec::to_hex(pair.secret.as_bytes())));
    }

    proptest! {
        #[test]
        fn prop_roundtrip_and_tamper(
            message in proptest::collection::vec(any::<u8>(), 0..512),
            key in any::<[u8; 32]>(),
            flip in any::<prop::sample::Index>(),
        ) {
            let shared = SharedSecret::from_bytes(key);
            let nonce = Nonce::generate();
            let ct = encrypt(&message, &nonce, &shared).unwrap();
            prop_assert_eq!(decrypt(&ct, &nonce, &shared).unwrap(), message);

            let mut tampered = ct.clone();
            let i = flip.index(tampered.len());
            tampered[i] ^= 0x01;
            prop_assert!(decrypt(&tampered, &nonce, &shared).is_err());
        }
    }
}
