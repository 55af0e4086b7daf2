//! Deterministic entity key derivation.
//!
//! An entity key is `<prefix>-<16 hex chars>`, where the hex part is the head of
//! a SHA-256 digest over the entity type and the source reference. Re-deriving
//! the same source record always yields the same key, in any process.

use sha2::{Digest, Sha256};

use crate::entities::SourceRef;
use crate::enums::EntityType;

/// Number of hex characters kept from the digest.
pub const KEY_HASH_LEN: usize = 16;

/// Derive the entity key for `(entity_type, source)`.
#[must_use]
pub fn entity_key(entity_type: EntityType, source: &SourceRef) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity_type.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(source.doctype.as_bytes());
    hasher.update([0u8]);
    hasher.update(source.name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", entity_type.key_prefix(), &digest[..KEY_HASH_LEN])
}

/// Entity type encoded in a key's prefix, if recognizable.
#[must_use]
pub fn entity_type_of_key(key: &str) -> Option<EntityType> {
    let (prefix, hash) = key.split_once('-')?;
    if hash.len() != KEY_HASH_LEN {
        return None;
    }
    EntityType::ALL.into_iter().find(|t| t.key_prefix() == prefix)
}
