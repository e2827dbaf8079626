//! In-memory signing-key store.
//!
//! Keys are indexed by key id (`kid`). The store is the one piece of
//! shared mutable state on the hot path: token verification reads while
//! rotation adds and removes, so access goes through a read/write lock.
//! Removing a record invalidates future verification of every token still
//! referencing that kid.
//!
//! In production the initial key material would come from a secrets
//! manager; this store only cares that it ends up indexed by kid.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use ed25519_dalek::{SigningKey, VerifyingKey};

/// A signing key together with its derived verifying key.
struct KeyRecord {
    signing: SigningKey,
    verifying: VerifyingKey,
}

impl KeyRecord {
    fn new(signing: SigningKey) -> Self {
        let verifying = signing.verifying_key();
        Self { signing, verifying }
    }
}

/// Key lookup failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyStoreError {
    #[error("kid lookup failed: `{0}`")]
    UnknownKid(String),
}

/// In-memory `kid -> key material` store.
pub struct KeyStore {
    store: RwLock<HashMap<String, KeyRecord>>,
}

impl KeyStore {
    /// An empty store.
    pub fn new() -> Self {
        Self { store: RwLock::new(HashMap::new()) }
    }

    /// A store seeded with an initial set of keys.
    pub fn with_keys(keys: impl IntoIterator<Item = (String, SigningKey)>) -> Self {
        let store = keys
            .into_iter()
            .map(|(kid, key)| (kid, KeyRecord::new(key)))
            .collect();
        Self { store: RwLock::new(store) }
    }

    /// Generates a fresh random key under `kid` and returns a copy of it.
    pub fn generate(&self, kid: impl Into<String>) -> SigningKey {
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        self.add(kid, key.clone());
        key
    }

    /// Adds a key under `kid`, replacing any existing record.
    pub fn add(&self, kid: impl Into<String>, key: SigningKey) {
        let mut store = self.store.write().expect("keystore lock poisoned");
        store.insert(kid.into(), KeyRecord::new(key));
    }

    /// Removes the record for `kid`. Tokens signed under it will no longer
    /// verify.
    pub fn remove(&self, kid: &str) {
        let mut store = self.store.write().expect("keystore lock poisoned");
        store.remove(kid);
    }

    /// The private key for `kid`, used to sign new tokens.
    pub fn private_key(&self, kid: &str) -> Result<SigningKey, KeyStoreError> {
        let store = self.store.read().expect("keystore lock poisoned");
        store
            .get(kid)
            .map(|record| record.signing.clone())
            .ok_or_else(|| KeyStoreError::UnknownKid(kid.to_owned()))
    }

    /// The public key for `kid`, used to verify presented tokens.
    pub fn public_key(&self, kid: &str) -> Result<VerifyingKey, KeyStoreError> {
        let store = self.store.read().expect("keystore lock poisoned");
        store
            .get(kid)
            .map(|record| record.verifying)
            .ok_or_else(|| KeyStoreError::UnknownKid(kid.to_owned()))
    }

    /// Whether a record exists for `kid`.
    pub fn contains(&self, kid: &str) -> bool {
        let store = self.store.read().expect("keystore lock poisoned");
        store.contains_key(kid)
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

// Private keys must never end up in logs.
impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.read().expect("keystore lock poisoned");
        f.debug_struct("KeyStore").field("keys", &store.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_lookup_remove_round_trip() {
        let ks = KeyStore::new();
        let key = ks.generate("kid-1");

        assert_eq!(
            ks.public_key("kid-1").unwrap(),
            key.verifying_key(),
        );
        assert!(ks.private_key("kid-1").is_ok());

        ks.remove("kid-1");
        assert_eq!(
            ks.public_key("kid-1"),
            Err(KeyStoreError::UnknownKid("kid-1".to_owned())),
        );
    }

    #[test]
    fn seeded_store_serves_all_keys() {
        let k1 = SigningKey::generate(&mut rand::rngs::OsRng);
        let k2 = SigningKey::generate(&mut rand::rngs::OsRng);
        let ks = KeyStore::with_keys([
            ("a".to_owned(), k1.clone()),
            ("b".to_owned(), k2.clone()),
        ]);

        assert_eq!(ks.public_key("a").unwrap(), k1.verifying_key());
        assert_eq!(ks.public_key("b").unwrap(), k2.verifying_key());
        assert!(!ks.contains("c"));
    }

    #[test]
    fn debug_output_never_contains_key_material() {
        let ks = KeyStore::new();
        ks.generate("kid-1");
        let debug = format!("{ks:?}");
        assert!(debug.contains("keys: 1"));
        assert!(!debug.contains("SigningKey"));
    }
}
