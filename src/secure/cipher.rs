//! Symmetric session cipher: AES-256 in ECB mode with PKCS#7 padding.
//!
//! Ciphertext travels hex-encoded so it stays compatible with the textual
//! framing; raw binary never touches the wire.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use aes::Aes256;
use sha2::{Digest, Sha256};

use crate::common::error::CipherError;

type Encryptor = ecb::Encryptor<Aes256>;
type Decryptor = ecb::Decryptor<Aes256>;

const BLOCK_SIZE: usize = 16;

/// A 32-byte symmetric key derived from a Diffie-Hellman shared secret.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Derive the key as SHA-256 over the decimal form of the shared
    /// secret. Deterministic for a fixed secret.
    pub fn derive(shared_secret: u64) -> SessionKey {
        let digest = Sha256::digest(shared_secret.to_string().as_bytes());
        SessionKey(digest.into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys stay out of logs
        write!(f, "SessionKey(..)")
    }
}

/// Encrypt a plaintext message, returning hex-encoded ciphertext.
pub fn encrypt(plaintext: &str, key: &SessionKey) -> String {
    let ciphertext =
        Encryptor::new(key.as_bytes().into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    hex::encode(ciphertext)
}

/// Decrypt hex-encoded ciphertext back to the plaintext message.
///
/// An empty ciphertext decrypts to the empty JSON object. Hex, block
/// length or padding failures are fatal for the request.
pub fn decrypt(ciphertext_hex: &str, key: &SessionKey) -> Result<String, CipherError> {
    if ciphertext_hex.is_empty() {
        return Ok("{}".to_string());
    }

    let raw = hex::decode(ciphertext_hex).map_err(|_| CipherError::Encoding)?;
    if raw.is_empty() || raw.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::Encoding);
    }

    let plaintext = Decryptor::new(key.as_bytes().into())
        .decrypt_padded_vec_mut::<Pkcs7>(&raw)
        .map_err(|_| CipherError::Padding)?;

    String::from_utf8(plaintext).map_err(|_| CipherError::Utf8)
}
