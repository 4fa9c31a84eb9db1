//! Encryption of data at rest
//!
//! An [`Encrypter`] turns text into an opaque, printable ciphertext and
//! back, using a caller supplied password. The cache uses it to keep stored
//! values unreadable without the key.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::{Error, Result};

/// Symmetric, authenticated encryption keyed by a password
pub trait Encrypter: fmt::Debug + Send + Sync {
    /// Name the encrypter is registered under
    fn driver(&self) -> &str;

    fn encrypt(&self, data: &str, key: &str) -> Result<String>;

    /// Fails with [`Error::Crypt`] when `data` was not produced by
    /// `encrypt` with the same key
    fn decrypt(&self, data: &str, key: &str) -> Result<String>;
}

pub const BLAKE3_DRIVER: &str = "blake3";

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = blake3::OUT_LEN;
const STREAM_CONTEXT: &str = "strata 2026-01-01 encrypter keystream";
const MAC_CONTEXT: &str = "strata 2026-01-01 encrypter mac";

/// Encrypter built on BLAKE3.
///
/// Each message gets a random nonce. The keystream is the keyed BLAKE3 XOF
/// of the nonce and the tag is a keyed BLAKE3 hash over nonce and
/// ciphertext, with both keys derived from the password. The output is
/// lowercase hex of `nonce || ciphertext || tag`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Encrypter;

impl Blake3Encrypter {
    pub fn new() -> Self {
        Self
    }

    pub fn shared() -> Arc<dyn Encrypter> {
        Arc::new(Self)
    }

    fn apply_keystream(key: &str, nonce: &[u8], data: &mut [u8]) {
        let stream_key = blake3::derive_key(STREAM_CONTEXT, key.as_bytes());
        let mut keystream = vec![0u8; data.len()];
        blake3::Hasher::new_keyed(&stream_key)
            .update(nonce)
            .finalize_xof()
            .fill(&mut keystream);
        for (byte, mask) in data.iter_mut().zip(keystream) {
            *byte ^= mask;
        }
    }

    fn tag(key: &str, sealed: &[u8]) -> blake3::Hash {
        let mac_key = blake3::derive_key(MAC_CONTEXT, key.as_bytes());
        blake3::keyed_hash(&mac_key, sealed)
    }
}

fn require_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::crypt("A password is required"));
    }
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

fn from_hex(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return Err(Error::crypt("Ciphertext is not hex encoded"));
    }
    (0..text.len())
        .step_by(2)
        .map(|at| {
            u8::from_str_radix(&text[at..at + 2], 16)
                .map_err(|_| Error::crypt("Ciphertext is not hex encoded"))
        })
        .collect()
}

impl Encrypter for Blake3Encrypter {
    fn driver(&self) -> &str {
        BLAKE3_DRIVER
    }

    fn encrypt(&self, data: &str, key: &str) -> Result<String> {
        require_key(key)?;

        let nonce: [u8; NONCE_LEN] = rand::random();
        let mut sealed = Vec::with_capacity(NONCE_LEN + data.len() + TAG_LEN);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(data.as_bytes());
        Self::apply_keystream(key, &nonce, &mut sealed[NONCE_LEN..]);

        let tag = Self::tag(key, &sealed);
        sealed.extend_from_slice(tag.as_bytes());
        Ok(to_hex(&sealed))
    }

    fn decrypt(&self, data: &str, key: &str) -> Result<String> {
        require_key(key)?;

        let sealed = from_hex(data)?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::crypt("Ciphertext is truncated"));
        }
        let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        let mut expected = [0u8; TAG_LEN];
        expected.copy_from_slice(tag);
        if Self::tag(key, body) != blake3::Hash::from(expected) {
            warn!("ciphertext failed verification");
            return Err(Error::crypt("Verification failed"));
        }

        let (nonce, ciphertext) = body.split_at(NONCE_LEN);
        let mut plain = ciphertext.to_vec();
        Self::apply_keystream(key, nonce, &mut plain);
        String::from_utf8(plain).map_err(|_| Error::crypt("Decrypted data is not UTF-8"))
    }
}

/// Creates an encrypter
pub type EncrypterFactory = fn() -> Arc<dyn Encrypter>;

/// Maps encrypter names to factories
#[derive(Debug, Clone, Default)]
pub struct EncrypterRegistry {
    drivers: HashMap<String, EncrypterFactory>,
}

impl EncrypterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every encrypter in this crate
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BLAKE3_DRIVER, Blake3Encrypter::shared);
        registry
    }

    pub fn register(&mut self, name: &str, factory: EncrypterFactory) -> Option<EncrypterFactory> {
        self.drivers.insert(name.to_string(), factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn Encrypter>> {
        let factory = self
            .drivers
            .get(name)
            .ok_or_else(|| Error::unknown_driver(name))?;
        Ok(factory())
    }
}
