//! API key protection.
//!
//! [`Secret`] keeps plaintext keys out of logs while they live in memory for
//! the duration of a request. [`SecretCodec`] is the at-rest format: AES-256-CBC
//! with a fresh random IV per encryption, stored as `ivHex:cipherHex`.
//!
//! The key derivation (right-pad with `'0'`, truncate to 32 bytes) and the
//! missing authentication tag are kept for compatibility with tokens written
//! by the web app. Neither is a security property: a tampered token that still
//! unpads cleanly would decrypt to garbage.

use std::fmt;

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::RngCore;
use tracing::{debug, warn};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const KEY_FILLER: u8 = b'0';

/// A wrapper type for sensitive information like API keys
///
/// `Secret<T>` hides the inner value in debug output and display implementations
/// to prevent accidental leakage of sensitive information in logs or error messages.
/// It deliberately has no `Serialize` implementation.
///
/// # Examples
///
/// ```
/// use hr_assistant_core::Secret;
///
/// let api_key = Secret("my-secret-api-key");
/// println!("API Key: {}", api_key); // Prints "API Key: ••••••"
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Secret<T>(pub T);

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("••••••")
    }
}

impl<T> Secret<T> {
    /// Creates a new Secret wrapper around a value
    pub fn new(value: T) -> Self {
        Secret(value)
    }

    /// Gets a reference to the inner value
    ///
    /// Only the provider adapters should need this, when the key goes into
    /// a request header.
    ///
    /// # Examples
    ///
    /// ```
    /// use hr_assistant_core::Secret;
    ///
    /// let api_key = Secret::new("my-secret-api-key");
    /// assert_eq!(api_key.inner(), &"my-secret-api-key");
    /// ```
    pub fn inner(&self) -> &T {
        &self.0
    }
}

/// Symmetric codec for API keys stored in provider configuration.
#[derive(Clone)]
pub struct SecretCodec {
    key: Secret<[u8; KEY_LEN]>,
}

impl fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCodec").field("key", &self.key).finish()
    }
}

impl SecretCodec {
    /// Builds a codec from the configured encryption key.
    pub fn new(key: &str) -> Self {
        Self {
            key: Secret(normalize_key(key)),
        }
    }

    /// Encrypts `plaintext` into an `ivHex:cipherHex` token.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let key = *self.key.inner();
        let cipher = Aes256CbcEnc::new(&key.into(), &iv.into());
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        debug!(cipher_len = ciphertext.len(), "Encrypted secret");

        format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
    }

    /// Decrypts a token produced by [`SecretCodec::encrypt`].
    ///
    /// Fails soft: a malformed token or the wrong key yields an empty string.
    /// An empty result therefore means "no usable secret", even if the
    /// original plaintext happened to be empty.
    pub fn decrypt(&self, token: &str) -> String {
        match self.try_decrypt(token) {
            Ok(plaintext) => plaintext,
            Err(reason) => {
                warn!(reason, "Failed to decrypt stored secret");
                String::new()
            }
        }
    }

    /// Decrypts a token and wraps it, mapping the soft failure to `None`.
    pub fn reveal(&self, token: &str) -> Option<Secret<String>> {
        let plaintext = self.decrypt(token);
        if plaintext.is_empty() {
            None
        } else {
            Some(Secret(plaintext))
        }
    }

    fn try_decrypt(&self, token: &str) -> std::result::Result<String, &'static str> {
        let (iv_hex, cipher_hex) = token.split_once(':').ok_or("missing separator")?;
        let iv = hex::decode(iv_hex).map_err(|_| "iv is not hex")?;
        let ciphertext = hex::decode(cipher_hex).map_err(|_| "ciphertext is not hex")?;
        if iv.len() != IV_LEN {
            return Err("iv has wrong length");
        }

        let cipher = Aes256CbcDec::new_from_slices(self.key.inner(), &iv)
            .map_err(|_| "invalid key or iv length")?;
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| "bad padding")?;

        String::from_utf8(plaintext).map_err(|_| "plaintext is not utf-8")
    }
}

/// Encrypts `plaintext` under `key`. See [`SecretCodec::encrypt`].
pub fn encrypt(plaintext: &str, key: &str) -> String {
    SecretCodec::new(key).encrypt(plaintext)
}

/// Decrypts `token` under `key`. See [`SecretCodec::decrypt`].
pub fn decrypt(token: &str, key: &str) -> String {
    SecretCodec::new(key).decrypt(token)
}

fn normalize_key(key: &str) -> [u8; KEY_LEN] {
    let mut normalized = [KEY_FILLER; KEY_LEN];
    let bytes = key.as_bytes();
    let len = bytes.len().min(KEY_LEN);
    normalized[..len].copy_from_slice(&bytes[..len]);
    normalized
}
