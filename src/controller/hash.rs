//! # Content Digests
//!
//! Deterministic SHA-256 digests over output payloads.
//!
//! Keys are sorted before hashing, so two payloads with the same entries always produce
//! the same digest whatever the map type or iteration order. Every key and value is
//! length-prefixed, so entry boundaries cannot be shifted to forge an equal digest.
//!
//! Secret payloads (binary) and ConfigMap payloads (text) are hashed under different
//! domain tags and typed as different [`ContentDigest`] kinds, so a secret digest can
//! never be compared against a config map digest.

use sha2::{Digest, Sha256};
use std::fmt;
use std::marker::PhantomData;

/// Marker for digests over Secret data (`key -> bytes`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretPayload {}

/// Marker for digests over ConfigMap data (`key -> string`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMapPayload {}

/// Hex encoded digest of an output payload
pub struct ContentDigest<K> {
    hex: String,
    kind: PhantomData<K>,
}

/// Digest of Secret data
pub type SecretDigest = ContentDigest<SecretPayload>;

/// Digest of ConfigMap data
pub type ConfigMapDigest = ContentDigest<ConfigMapPayload>;

impl<K> ContentDigest<K> {
    fn from_hasher(hasher: Sha256) -> Self {
        Self {
            hex: format!("{:x}", hasher.finalize()),
            kind: PhantomData,
        }
    }

    /// Hex representation, as stored in status
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Whether a previously recorded status value matches this digest
    #[must_use]
    pub fn matches(&self, recorded: Option<&str>) -> bool {
        recorded == Some(self.hex.as_str())
    }
}

impl<K> Clone for ContentDigest<K> {
    fn clone(&self) -> Self {
        Self {
            hex: self.hex.clone(),
            kind: PhantomData,
        }
    }
}

impl<K> PartialEq for ContentDigest<K> {
    fn eq(&self, other: &Self) -> bool {
        self.hex == other.hex
    }
}

impl<K> Eq for ContentDigest<K> {}

impl<K> fmt::Debug for ContentDigest<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentDigest").field(&self.hex).finish()
    }
}

impl<K> fmt::Display for ContentDigest<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

fn hash_entries<'a, I>(domain: &[u8], entries: I) -> Sha256
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut sorted: Vec<(&str, &[u8])> = entries.into_iter().collect();
    sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    hasher.update(domain);
    for (key, value) in sorted {
        hasher.update((key.len() as u64).to_be_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value);
    }
    hasher
}

/// Digest of Secret data
pub fn secret_digest<'a, I, V>(data: I) -> SecretDigest
where
    I: IntoIterator<Item = (&'a String, &'a V)>,
    V: AsRef<[u8]> + 'a + ?Sized,
{
    ContentDigest::from_hasher(hash_entries(
        b"secret\0",
        data.into_iter().map(|(k, v)| (k.as_str(), v.as_ref())),
    ))
}

/// Digest of ConfigMap data
pub fn config_map_digest<'a, I>(data: I) -> ConfigMapDigest
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    ContentDigest::from_hasher(hash_entries(
        b"configmap\0",
        data.into_iter().map(|(k, v)| (k.as_str(), v.as_bytes())),
    ))
}
